//! Async WebSocket transport to the market-data relay.
//!
//! This module is organized by domain:
//! - [`connection`] - Connection lifecycle, reconnection, and subscription replay
//! - [`subscription`] - Subscribe/unsubscribe control messages
//! - [`handler`] - Incoming message classification
//!
//! The [`Transport`] and [`Connector`] traits are the seam between the
//! connection state machine and the network, so the state machine can be
//! driven by a scripted transport in tests.

pub mod connection;
mod handler;
mod subscription;

use std::future::Future;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use tungstenite::Message;

use crate::{FeedError, Result};

pub use connection::{ConnectionManager, ConnectionState, LinkEvent, ReconnectPolicy};
pub use handler::parse_inbound;
pub use subscription::{send_control, subscribe, unsubscribe};

/// Write half of a relay WebSocket connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a relay WebSocket connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// One open, bidirectional text connection.
pub trait Transport {
    /// Queues a text frame for sending without waiting for the network.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Transport`] if the connection is already gone.
    fn send(&mut self, text: String) -> Result<()>;

    /// Waits for the next inbound text frame.
    ///
    /// Returns `None` once the connection is closed. Must be cancel-safe.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String>>>;

    /// Starts a graceful close. Further sends fail.
    fn close(&mut self);
}

/// Opens transports to a relay URL.
pub trait Connector {
    type Transport: Transport;

    /// Opens a new connection to `url`.
    fn open(&mut self, url: &str) -> impl Future<Output = Result<Self::Transport>>;
}

/// A live WebSocket connection.
///
/// The write half lives in a forwarding task fed by an unbounded channel,
/// so [`Transport::send`] never waits on the socket.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Message>,
    read: WsReader,
}

impl Transport for WsTransport {
    fn send(&mut self, text: String) -> Result<()> {
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| FeedError::Transport("websocket writer has stopped".to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        while let Some(msg) = self.read.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Relay closed the connection");
                    return None;
                }
                Ok(_) => {} // Binary/Ping/Pong frames
                Err(e) => return Some(Err(e.into())),
            }
        }

        None
    }

    fn close(&mut self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

/// Opens real WebSocket connections with [`connect`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn open(&mut self, url: &str) -> Result<WsTransport> {
        connect(url).await
    }
}

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns a [`FeedError`] if the connection or TLS handshake fails.
pub async fn connect(url: &str) -> Result<WsTransport> {
    let (ws_stream, _) = connect_async(url).await?;
    info!("WebSocket handshake completed");

    let (write, read) = ws_stream.split();
    let (outbound, rx) = mpsc::unbounded_channel();
    tokio::spawn(forward_outbound(write, rx));

    Ok(WsTransport { outbound, read })
}

/// Drains queued frames into the socket until the queue closes, a send
/// fails, or a close frame has been written.
async fn forward_outbound(mut write: WsWriter, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = write.send(msg).await {
            warn!("WebSocket write failed: {e}");
            break;
        }
        if closing {
            break;
        }
    }
    debug!("WebSocket writer stopped");
}
