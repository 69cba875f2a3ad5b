//! Crate-level error types.
//!
//! [`FeedError`] unifies every error source (configuration, WebSocket,
//! HTTP, JSON) behind a single enum so callers can match on the variant
//! they care about while still using the `?` operator for easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// An environment variable held a value that could not be used.
    #[error("configuration error: {0}")]
    Config(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request to the historical candle endpoint failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configured base URL cannot carry a path.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// An inbound frame was not valid JSON or a tick lacked mandatory fields.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The transport went away underneath a send or receive.
    #[error("transport error: {0}")]
    Transport(String),
}
