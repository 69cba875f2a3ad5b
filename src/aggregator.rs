//! Live OHLC candle aggregation.
//!
//! A [`CandleSeries`] folds one symbol's ticks into fixed-width buckets.
//! It may be seeded with a historical series first, in which case the last
//! historical candle becomes the current one and live ticks continue it
//! without a gap or a duplicate bar.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::{Candle, Tick};

/// Bucket width used when the caller does not choose one.
pub const DEFAULT_BUCKET_SECS: i64 = 60;

/// Start of the bucket containing `timestamp`.
///
/// Floors toward negative infinity, so pre-epoch timestamps land in the
/// bucket that contains them.
pub fn bucket_start(timestamp: i64, width: i64) -> i64 {
    timestamp.div_euclid(width) * width
}

/// Lifecycle phase of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesPhase {
    /// No candle yet.
    Empty,
    /// Current candle came from history; no live tick applied yet.
    Seeded,
    /// At least one live tick has been applied.
    Live,
}

/// One emission for the chart surface.
///
/// Either variant carries the complete candle; consumers overwrite whatever
/// they hold for the same `bucket_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleUpdate {
    /// A new bucket started; append a bar.
    Opened(Candle),
    /// The current bucket changed; replace the last bar.
    Updated(Candle),
}

impl CandleUpdate {
    pub fn candle(&self) -> &Candle {
        match self {
            CandleUpdate::Opened(candle) | CandleUpdate::Updated(candle) => candle,
        }
    }
}

/// Live candle state for one (symbol, bucket width) pair.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    symbol: String,
    width: i64,
    current: Option<Candle>,
    phase: SeriesPhase,
}

impl CandleSeries {
    /// Creates an empty series.
    ///
    /// A non-positive `width` falls back to [`DEFAULT_BUCKET_SECS`].
    pub fn new(symbol: impl Into<String>, width: i64) -> Self {
        let symbol = symbol.into();
        let width = if width > 0 {
            width
        } else {
            warn!(symbol = %symbol, width, "Invalid bucket width, using default");
            DEFAULT_BUCKET_SECS
        };

        Self {
            symbol,
            width,
            current: None,
            phase: SeriesPhase::Empty,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn phase(&self) -> SeriesPhase {
        self.phase
    }

    /// The candle live ticks currently fold into.
    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Seeds the series with a historical sequence ordered by time.
    ///
    /// The last candle becomes current. An empty history changes nothing.
    pub fn seed(&mut self, history: &[Candle]) {
        let Some(last) = history.last() else {
            debug!(symbol = %self.symbol, "No history to seed from");
            return;
        };
        self.current = Some(*last);
        self.phase = SeriesPhase::Seeded;
        debug!(
            symbol = %self.symbol,
            candles = history.len(),
            bucket_start = last.bucket_start,
            "Series seeded from history"
        );
    }

    /// Folds `tick` into the series.
    ///
    /// Returns `None` for a tick without a positive price or whose bucket
    /// is older than the current candle; such ticks never touch emitted
    /// state.
    pub fn apply(&mut self, tick: &Tick) -> Option<CandleUpdate> {
        self.apply_price(tick.last_traded_price, tick.timestamp)
    }

    /// Folds a price observed at `timestamp` into the series.
    pub fn apply_price(&mut self, price: Decimal, timestamp: i64) -> Option<CandleUpdate> {
        // The relay reports 0 when it has no price for the instrument.
        if price <= Decimal::ZERO {
            debug!(symbol = %self.symbol, %price, timestamp, "Ignoring tick without a price");
            return None;
        }
        let bucket = bucket_start(timestamp, self.width);

        let update = match self.current.as_mut() {
            Some(current) if bucket == current.bucket_start => {
                current.absorb(price);
                CandleUpdate::Updated(*current)
            }
            Some(current) if bucket < current.bucket_start => {
                warn!(
                    symbol = %self.symbol,
                    timestamp,
                    bucket,
                    current_bucket = current.bucket_start,
                    "Ignoring out-of-order tick"
                );
                return None;
            }
            _ => {
                let candle = Candle::flat(bucket, price);
                self.current = Some(candle);
                CandleUpdate::Opened(candle)
            }
        };

        self.phase = SeriesPhase::Live;
        Some(update)
    }
}
