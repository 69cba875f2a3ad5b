//! The market-data client consumers talk to.
//!
//! [`StreamClient`] owns the connection manager and the subscription
//! registry and keeps them in step: the first observer of a symbol adds it
//! to the wire subscription set, the last one leaving removes it. All state
//! is mutated through `&mut self` from the task that drives
//! [`pump`](StreamClient::pump), so observers cannot re-enter the client.

use tracing::{info, warn};

use crate::Result;
use crate::aggregator::{CandleSeries, CandleUpdate};
use crate::config::RelayConfig;
use crate::history::HistoryProvider;
use crate::models::{Candle, StatusMessage, Tick};
use crate::registry::{Registry, Subscription};
use crate::websocket::{ConnectionManager, ConnectionState, Connector, LinkEvent, ReconnectPolicy};

/// Outcome of one [`StreamClient::pump`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A tick was dispatched; `delivered` observers handled it without panicking.
    Tick { symbol: String, delivered: usize },
    /// The relay sent a status message.
    Status(StatusMessage),
    /// An automatic reconnect succeeded.
    Connected,
    /// The connection dropped or a reconnect attempt failed.
    Disconnected,
    /// Nothing can happen until the next explicit [`StreamClient::connect`].
    Idle,
}

/// A chart's historical series plus its live candle subscription.
#[derive(Debug)]
pub struct ChartAttachment {
    /// Candles to render before live updates arrive.
    pub history: Vec<Candle>,
    pub subscription: Subscription,
}

/// Multiplexed market-data client.
///
/// Observers are plain `FnMut` closures without a `Send` bound, so the
/// client is `!Send`. Drive it from the task that created it (`#[tokio::main]`,
/// `block_on`, or a `tokio::task::LocalSet`); it cannot be moved into
/// `tokio::spawn`.
pub struct StreamClient<C: Connector> {
    connection: ConnectionManager<C>,
    registry: Registry,
}

impl<C: Connector> StreamClient<C> {
    /// Creates a disconnected client for the relay at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy, connector: C) -> Self {
        Self {
            connection: ConnectionManager::new(url, policy, connector),
            registry: Registry::new(),
        }
    }

    #[must_use]
    pub fn from_config(config: &RelayConfig, connector: C) -> Self {
        Self::new(config.websocket_url.clone(), config.reconnect, connector)
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Symbols currently wanted on the wire, in sorted order.
    pub fn desired_symbols(&self) -> impl Iterator<Item = &str> {
        self.connection.desired_symbols()
    }

    /// Connects to the relay and replays every wanted symbol.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the relay cannot be reached. A retry
    /// is already scheduled in that case while budget remains; keep
    /// pumping rather than retrying by hand.
    pub async fn connect(&mut self) -> Result<()> {
        self.connection.connect().await
    }

    /// Closes the connection for good. Subscriptions stay registered and
    /// are replayed on the next explicit [`connect`](Self::connect).
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.registry.reset_tick_counts();
    }

    /// Registers `observer` for every tick of `symbol`.
    pub fn subscribe<F>(&mut self, symbol: &str, observer: F) -> Subscription
    where
        F: FnMut(&Tick) + 'static,
    {
        let (subscription, first) = self.registry.subscribe(symbol, Box::new(observer));
        if first {
            info!(symbol, "Subscribed to live quotes");
            self.connection.set_desired_symbols(&[symbol.to_owned()], &[]);
        }
        subscription
    }

    /// Removes exactly the observer behind `subscription`. The observer is
    /// never called again once this returns.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        let symbol = subscription.symbol().to_owned();
        if self.registry.unsubscribe(subscription) {
            info!(symbol = %symbol, "Unsubscribed from quotes");
            self.connection.set_desired_symbols(&[], &[symbol]);
        }
    }

    /// Feeds `symbol`'s ticks into a candle series of `width` seconds seeded
    /// with `history`, passing each emission to `sink`.
    ///
    /// The series lives inside the observer and is dropped on unsubscribe.
    pub fn subscribe_candles<F>(
        &mut self,
        symbol: &str,
        width: i64,
        history: &[Candle],
        mut sink: F,
    ) -> Subscription
    where
        F: FnMut(CandleUpdate) + 'static,
    {
        let mut series = CandleSeries::new(symbol, width);
        series.seed(history);

        self.subscribe(symbol, move |tick| {
            if let Some(update) = series.apply(tick) {
                sink(update);
            }
        })
    }

    /// Loads `symbol`'s history from `provider` and attaches a live candle
    /// series on top of it.
    ///
    /// A failed history fetch is logged and the chart starts from live
    /// ticks alone.
    pub async fn attach_chart<H, F>(
        &mut self,
        provider: &H,
        symbol: &str,
        width: i64,
        sink: F,
    ) -> ChartAttachment
    where
        H: HistoryProvider,
        F: FnMut(CandleUpdate) + 'static,
    {
        let history = match provider.fetch_candles(symbol).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!(symbol, "Failed to load historical candles, showing live ticks only: {e}");
                Vec::new()
            }
        };

        let subscription = self.subscribe_candles(symbol, width, &history, sink);
        ChartAttachment {
            history,
            subscription,
        }
    }

    /// Delivers a tick to its symbol's observers as if it came off the wire.
    pub fn dispatch(&mut self, tick: &Tick) -> usize {
        self.registry.dispatch(tick)
    }

    /// Waits for and handles one link event.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` next to the
    /// application's own event sources.
    pub async fn pump(&mut self) -> StreamEvent {
        match self.connection.next_event().await {
            Some(LinkEvent::Tick(tick)) => {
                let delivered = self.registry.dispatch(&tick);
                StreamEvent::Tick {
                    symbol: tick.symbol,
                    delivered,
                }
            }
            Some(LinkEvent::Status(status)) => StreamEvent::Status(status),
            Some(LinkEvent::Connected) => StreamEvent::Connected,
            Some(LinkEvent::Closed) => StreamEvent::Disconnected,
            None => StreamEvent::Idle,
        }
    }

    /// Pumps until the client goes idle.
    pub async fn run(&mut self) {
        while self.pump().await != StreamEvent::Idle {}
    }
}
