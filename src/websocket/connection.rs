//! WebSocket connection lifecycle management.
//!
//! [`ConnectionManager`] owns the single relay connection, reconnects with
//! a linear, bounded backoff after every close or error, and replays the
//! whole desired symbol set as one subscribe request after each successful
//! connect. Individual control messages are never queued or retried; the
//! replay is what makes the relay's subscription set converge.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{Connector, Transport, parse_inbound, send_control};
use crate::Result;
use crate::models::{ControlRequest, Inbound, StatusMessage, Tick};

/// Delay unit between reconnection attempts.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(3);

/// Consecutive failed attempts after which reconnection stops.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Linear, bounded reconnection backoff: attempt `n` waits `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay before the given (1-based) attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Something that happened on the link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A market tick arrived.
    Tick(Tick),
    /// The relay acknowledged something.
    Status(StatusMessage),
    /// A scheduled reconnect succeeded and the desired set was replayed.
    Connected,
    /// The connection closed or a reconnect attempt failed.
    Closed,
}

/// Manages the relay connection including reconnection with linear
/// backoff and resubscription after every connect.
pub struct ConnectionManager<C: Connector> {
    url: String,
    policy: ReconnectPolicy,
    connector: C,
    transport: Option<C::Transport>,
    state: ConnectionState,
    attempts: u32,
    desired: BTreeSet<String>,
    reconnect_at: Option<Instant>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a disconnected manager. Nothing is opened until
    /// [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy, connector: C) -> Self {
        Self {
            url: url.into(),
            policy,
            connector,
            transport: None,
            state: ConnectionState::Disconnected,
            attempts: 0,
            desired: BTreeSet::new(),
            reconnect_at: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of reconnect attempts scheduled since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// When the next automatic reconnect fires, if one is scheduled.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Returns `true` once the retry budget is spent and no reconnect is pending.
    pub fn is_exhausted(&self) -> bool {
        self.state == ConnectionState::Disconnected
            && self.reconnect_at.is_none()
            && self.attempts >= self.policy.max_attempts
    }

    /// Symbols the client wants streamed, in sorted order.
    pub fn desired_symbols(&self) -> impl Iterator<Item = &str> {
        self.desired.iter().map(String::as_str)
    }

    pub fn is_desired(&self, symbol: &str) -> bool {
        self.desired.contains(symbol)
    }

    /// Opens the connection on explicit request.
    ///
    /// Cancels any pending automatic reconnect. On success the retry counter
    /// is reset and the desired set is replayed. A no-op when already
    /// connected.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if the transport cannot be opened. The
    /// failure is also treated as a close, so a retry is scheduled while
    /// budget remains.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            debug!("Already connected");
            return Ok(());
        }
        self.reconnect_at = None;
        self.open().await
    }

    async fn open(&mut self) -> Result<()> {
        self.state = ConnectionState::Connecting;
        info!(url = %self.url, attempt = self.attempts, "Connecting to relay");

        match self.connector.open(&self.url).await {
            Ok(transport) => {
                self.transport = Some(transport);
                self.state = ConnectionState::Connected;
                self.attempts = 0;
                self.reconnect_at = None;
                info!("Relay connected");
                self.replay();
                Ok(())
            }
            Err(e) => {
                error!("Connection failed: {e}");
                self.handle_disconnect();
                Err(e)
            }
        }
    }

    /// Sends the full desired set as a single subscribe request.
    fn replay(&mut self) {
        if self.desired.is_empty() {
            return;
        }
        let request = ControlRequest::subscribe(self.desired.iter().cloned());
        self.send(&request);
        info!(count = self.desired.len(), "Resubscribed to desired symbols");
    }

    /// Reacts to a close or transport error: drops the transport and
    /// schedules a reconnect while the retry budget lasts.
    pub fn handle_disconnect(&mut self) {
        self.transport = None;
        self.state = ConnectionState::Disconnected;

        if self.attempts >= self.policy.max_attempts {
            self.reconnect_at = None;
            error!(
                attempts = self.attempts,
                "Max reconnection attempts reached, stream disconnected"
            );
            return;
        }

        self.attempts += 1;
        let delay = self.policy.delay_for(self.attempts);
        self.reconnect_at = Some(Instant::now() + delay);
        info!(
            attempt = self.attempts,
            max_attempts = self.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
    }

    /// Applies changes to the desired set.
    ///
    /// While connected, symbols that were actually added or removed are
    /// sent immediately as incremental requests. Otherwise the change only
    /// shows up in the replay after the next connect.
    pub fn set_desired_symbols(&mut self, adds: &[String], removes: &[String]) {
        let added: Vec<String> = adds
            .iter()
            .filter(|symbol| self.desired.insert((*symbol).clone()))
            .cloned()
            .collect();
        let removed: Vec<String> = removes
            .iter()
            .filter(|symbol| self.desired.remove(symbol.as_str()))
            .cloned()
            .collect();

        if self.state != ConnectionState::Connected {
            debug!(?added, ?removed, "Desired set changed while offline");
            return;
        }
        if !added.is_empty() {
            self.send(&ControlRequest::subscribe(added));
        }
        if !removed.is_empty() {
            self.send(&ControlRequest::unsubscribe(removed));
        }
    }

    /// Sends a control request if connected; otherwise logs and drops it.
    pub fn send(&mut self, request: &ControlRequest) {
        let transport = match (&self.state, self.transport.as_mut()) {
            (ConnectionState::Connected, Some(transport)) => transport,
            _ => {
                warn!(
                    action = request.action.as_str(),
                    symbols = ?request.symbols,
                    "Not connected, dropping control request"
                );
                return;
            }
        };

        if let Err(e) = send_control(transport, request) {
            warn!("Failed to send control request: {e}");
        }
    }

    /// Closes the connection and cancels any pending reconnect. Nothing is
    /// retried until the next explicit [`connect`](Self::connect).
    pub fn disconnect(&mut self) {
        self.reconnect_at = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.state = ConnectionState::Disconnected;
        info!("Relay disconnected");
    }

    /// Waits for the next link event.
    ///
    /// Reads frames while connected, logging and skipping malformed ones,
    /// and performs the scheduled reconnect when its deadline passes.
    /// Returns `None` when disconnected with no reconnect pending.
    ///
    /// Cancel-safe: a reconnect interrupted mid-open keeps its deadline and
    /// is attempted again on the next call.
    pub async fn next_event(&mut self) -> Option<LinkEvent> {
        while let Some(transport) = self.transport.as_mut() {
            match transport.recv().await {
                Some(Ok(text)) => match parse_inbound(&text) {
                    Ok(Inbound::Tick(tick)) => return Some(LinkEvent::Tick(tick)),
                    Ok(Inbound::Status(status)) => {
                        info!(status = %status.status, symbols = ?status.symbols, "Relay status");
                        return Some(LinkEvent::Status(status));
                    }
                    Ok(Inbound::Ignored) => {}
                    Err(e) => warn!("Dropping inbound message: {e}"),
                },
                Some(Err(e)) => {
                    warn!("WebSocket error: {e}");
                    self.handle_disconnect();
                    return Some(LinkEvent::Closed);
                }
                None => {
                    warn!("WebSocket stream ended");
                    self.handle_disconnect();
                    return Some(LinkEvent::Closed);
                }
            }
        }

        let deadline = self.reconnect_at?;
        tokio::time::sleep_until(deadline).await;

        match self.open().await {
            Ok(()) => Some(LinkEvent::Connected),
            Err(_) => Some(LinkEvent::Closed),
        }
    }
}
