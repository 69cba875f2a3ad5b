//! Subscribe and unsubscribe control messages.

use tracing::{debug, info};

use super::Transport;
use crate::Result;
use crate::models::ControlRequest;

/// Serializes a control request and queues it on the transport.
///
/// # Errors
///
/// Returns a [`FeedError`](crate::FeedError) if serialization fails or the
/// transport is gone.
pub fn send_control<T: Transport>(transport: &mut T, request: &ControlRequest) -> Result<()> {
    let json = serde_json::to_string(request)?;
    debug!("Sending control request: {}", json);
    transport.send(json)?;
    info!(
        action = request.action.as_str(),
        symbols = ?request.symbols,
        "Sent control request"
    );

    Ok(())
}

/// Asks the relay to start streaming the given symbols.
///
/// # Errors
///
/// Returns a [`FeedError`](crate::FeedError) if sending the request fails.
pub fn subscribe<T: Transport>(transport: &mut T, symbols: &[String]) -> Result<()> {
    send_control(transport, &ControlRequest::subscribe(symbols.iter().cloned()))
}

/// Asks the relay to stop streaming the given symbols.
///
/// # Errors
///
/// Returns a [`FeedError`](crate::FeedError) if sending the request fails.
pub fn unsubscribe<T: Transport>(transport: &mut T, symbols: &[String]) -> Result<()> {
    send_control(transport, &ControlRequest::unsubscribe(symbols.iter().cloned()))
}
