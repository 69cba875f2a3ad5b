//! OHLC candle models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLC bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Start of this candle's time window, aligned to the bucket width.
    #[serde(rename = "time")]
    pub bucket_start: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    /// Opens a flat candle where every price equals `price`.
    pub fn flat(bucket_start: i64, price: Decimal) -> Self {
        Self {
            bucket_start,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    /// Folds `price` into this candle: widens high/low and moves close.
    pub fn absorb(&mut self, price: Decimal) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }
}

/// Response body of the historical candle endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalCandlesResponse {
    #[serde(default)]
    pub candles: Vec<Candle>,
    /// Where the relay got the candles from (`"yahoo"`, `"sample"`, ...).
    #[serde(default)]
    pub source: Option<String>,
}
