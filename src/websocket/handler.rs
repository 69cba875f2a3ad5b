//! Incoming message classification.

use serde_json::Value;
use tracing::debug;

use crate::Result;
use crate::error::FeedError;
use crate::models::{Inbound, StatusMessage, Tick};

/// Classifies one inbound text frame.
///
/// Routing follows the relay's conventions: a `status` key marks an
/// acknowledgement, a `symbol` key marks a tick, anything else is ignored.
/// A tick without `timestamp` is stamped with the local receive time.
///
/// # Errors
///
/// Returns [`FeedError::MalformedMessage`] if the frame is not JSON, or if
/// it names a symbol but lacks a usable `ltp`.
pub fn parse_inbound(text: &str) -> Result<Inbound> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|e| FeedError::MalformedMessage(e.to_string()))?;

    if value.get("status").is_some() {
        let status: StatusMessage = serde_json::from_value(value)
            .map_err(|e| FeedError::MalformedMessage(format!("status message: {e}")))?;
        return Ok(Inbound::Status(status));
    }

    let Some(symbol) = value
        .get("symbol")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    else {
        debug!("Ignoring message without symbol");
        return Ok(Inbound::Ignored);
    };
    let symbol = symbol.to_owned();

    if let Some(fields) = value.as_object_mut() {
        if fields.get("timestamp").is_none_or(Value::is_null) {
            fields.insert(
                "timestamp".to_string(),
                Value::from(chrono::Utc::now().timestamp()),
            );
        }
    }

    let tick: Tick = serde_json::from_value(value)
        .map_err(|e| FeedError::MalformedMessage(format!("tick for {symbol}: {e}")))?;

    Ok(Inbound::Tick(tick))
}
