//! Live quote ticks pushed by the relay.

use rust_decimal::Decimal;
use serde::Deserialize;

/// One market update for one instrument.
///
/// Only `symbol` and `last_traded_price` are guaranteed; every other price
/// field is best-effort and may be missing from any given message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tick {
    pub symbol: String,
    #[serde(rename = "ltp")]
    pub last_traded_price: Decimal,
    /// Event time in seconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub open: Option<Decimal>,
    #[serde(default)]
    pub high: Option<Decimal>,
    #[serde(default)]
    pub low: Option<Decimal>,
    #[serde(default)]
    pub close: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub change: Option<Decimal>,
    #[serde(default, rename = "per_change")]
    pub percent_change: Option<Decimal>,
}

impl Tick {
    /// Creates a tick carrying only the mandatory fields.
    pub fn new(symbol: impl Into<String>, last_traded_price: Decimal, timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            last_traded_price,
            timestamp,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            change: None,
            percent_change: None,
        }
    }
}
