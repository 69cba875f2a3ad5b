//! Wire models for the market-data relay protocol.
//!
//! Contains the control requests the client sends, the status
//! acknowledgements the relay answers with, and the classified form of
//! every inbound frame.

pub mod candle;
pub mod tick;

use serde::{Deserialize, Serialize};

pub use candle::{Candle, HistoricalCandlesResponse};
pub use tick::Tick;

/// Control actions understood by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Subscribe,
    Unsubscribe,
}

impl ControlAction {
    /// Returns the wire-format action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Subscribe => "subscribe",
            ControlAction::Unsubscribe => "unsubscribe",
        }
    }
}

/// A subscribe or unsubscribe request sent to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRequest {
    pub action: ControlAction,
    pub symbols: Vec<String>,
}

impl ControlRequest {
    /// Builds a `subscribe` request for the given symbols.
    pub fn subscribe<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: ControlAction::Subscribe,
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds an `unsubscribe` request for the given symbols.
    pub fn unsubscribe<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: ControlAction::Unsubscribe,
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }
}

/// Informational acknowledgement from the relay, e.g. after a subscribe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Classification of one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A market update to be dispatched by symbol.
    Tick(Tick),
    /// A relay status message, handled by the connection layer only.
    Status(StatusMessage),
    /// Valid JSON that is neither a tick nor a status message.
    Ignored,
}
