//! Real-time market-data client for a broker dashboard.
//!
//! One multiplexed WebSocket connection to a market-data relay fans ticks
//! out to any number of observers, replays its subscription set after every
//! reconnect, and folds ticks into live OHLC candles for charting.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod registry;
pub mod websocket;

pub use client::{ChartAttachment, StreamClient, StreamEvent};
pub use error::{FeedError, Result};
