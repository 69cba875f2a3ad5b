//! Historical candle retrieval.
//!
//! Charts start from a finite historical series fetched once over plain
//! request/response before live ticks take over. [`HttpHistoryProvider`]
//! talks to the relay's REST companion:
//!
//! ```text
//! GET {base_url}/historical/{symbol}
//! {"candles": [{"time": 1700000000, "open": .., "high": .., "low": .., "close": ..}], "source": "yahoo"}
//! ```

use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::models::{Candle, HistoricalCandlesResponse};
use crate::{FeedError, Result};

/// Upper bound on one history request, from connect to the last body byte.
pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of historical candles for a symbol.
pub trait HistoryProvider {
    /// Fetches the historical series for `symbol`, ordered by time.
    fn fetch_candles(&self, symbol: &str) -> impl Future<Output = Result<Vec<Candle>>>;
}

/// Fetches candles from the relay's `/historical/{symbol}` endpoint.
#[derive(Debug, Clone)]
pub struct HttpHistoryProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpHistoryProvider {
    /// Creates a provider rooted at `base_url` with the default request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidUrl`] if `base_url` does not parse or
    /// cannot carry a path, or [`FeedError::Http`] if the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_HISTORY_TIMEOUT)
    }

    /// Creates a provider whose requests fail with a timeout error after
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    /// Creates a provider for the relay's API URL and history timeout.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Self::with_timeout(&config.api_url, config.history_timeout)
    }

    /// Creates a provider that sends requests through `client`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidUrl`] if `base_url` does not parse or
    /// cannot carry a path.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| FeedError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FeedError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    /// The URL the series for `symbol` is fetched from.
    pub fn endpoint(&self, symbol: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FeedError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("historical")
            .push(symbol);
        Ok(url)
    }
}

impl HistoryProvider for HttpHistoryProvider {
    async fn fetch_candles(&self, symbol: &str) -> Result<Vec<Candle>> {
        let url = self.endpoint(symbol)?;
        debug!(%url, "Fetching historical candles");

        let response = self.client.get(url).send().await?.error_for_status()?;
        let body: HistoricalCandlesResponse = response.json().await?;

        let candles = normalize(body.candles);
        info!(
            symbol,
            candles = candles.len(),
            source = body.source.as_deref().unwrap_or("unknown"),
            "Loaded historical candles"
        );
        Ok(candles)
    }
}

/// Orders candles by time; when several share a time the last one wins.
pub fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.reverse();
    candles.sort_by_key(|c| c.bucket_start);
    candles.dedup_by_key(|c| c.bucket_start);
    candles
}
