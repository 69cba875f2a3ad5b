//! Shared test utilities: a scripted in-memory relay.
//!
//! [`MockRelay`] hands out [`MockConnector`]s whose transports record every
//! frame the client sends and deliver whatever the test pushes.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use quotefeed::websocket::{Connector, Transport};
use quotefeed::{FeedError, Result};
use serde_json::Value;
use tokio::sync::mpsc;

/// Relay URL used by every mock-backed client.
pub const RELAY_URL: &str = "ws://relay.test/ws/market-data";

enum Frame {
    Text(String),
    Error(String),
}

#[derive(Default)]
struct RelayState {
    opens: Vec<String>,
    refusals: VecDeque<String>,
    sent: Vec<String>,
    closes: usize,
    server: Option<mpsc::UnboundedSender<Frame>>,
}

/// Test-side handle on the fake relay.
#[derive(Clone, Default)]
pub struct MockRelay {
    state: Rc<RefCell<RelayState>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            relay: self.clone(),
        }
    }

    /// Makes the next `count` connection attempts fail.
    pub fn refuse_next(&self, count: usize) {
        let mut state = self.state.borrow_mut();
        for _ in 0..count {
            state.refusals.push_back("connection refused".to_string());
        }
    }

    /// Delivers a raw text frame on the current connection.
    pub fn push(&self, text: &str) {
        let state = self.state.borrow();
        let server = state.server.as_ref().expect("no open connection");
        server
            .send(Frame::Text(text.to_string()))
            .expect("client transport dropped");
    }

    pub fn push_json(&self, value: Value) {
        self.push(&value.to_string());
    }

    /// Delivers a tick frame with only the mandatory fields.
    pub fn push_tick(&self, symbol: &str, ltp: f64, timestamp: i64) {
        self.push_json(serde_json::json!({
            "symbol": symbol,
            "ltp": ltp,
            "timestamp": timestamp,
        }));
    }

    /// Makes the current connection report a transport error.
    pub fn push_error(&self, reason: &str) {
        let state = self.state.borrow();
        let server = state.server.as_ref().expect("no open connection");
        server
            .send(Frame::Error(reason.to_string()))
            .expect("client transport dropped");
    }

    /// Closes the current connection from the relay side.
    pub fn drop_connection(&self) {
        self.state.borrow_mut().server = None;
    }

    pub fn open_count(&self) -> usize {
        self.state.borrow().opens.len()
    }

    pub fn close_count(&self) -> usize {
        self.state.borrow().closes
    }

    /// Every frame the client has sent, parsed as JSON.
    pub fn sent(&self) -> Vec<Value> {
        self.state
            .borrow()
            .sent
            .iter()
            .map(|text| serde_json::from_str(text).expect("client sent invalid JSON"))
            .collect()
    }

    /// Like [`sent`](Self::sent) but clears the log.
    pub fn take_sent(&self) -> Vec<Value> {
        let sent = self.sent();
        self.state.borrow_mut().sent.clear();
        sent
    }
}

/// Builds the JSON the client is expected to send for a control request.
pub fn control(action: &str, symbols: &[&str]) -> Value {
    serde_json::json!({ "action": action, "symbols": symbols })
}

pub struct MockConnector {
    relay: MockRelay,
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn open(&mut self, url: &str) -> Result<MockTransport> {
        let mut state = self.relay.state.borrow_mut();
        state.opens.push(url.to_string());
        if let Some(reason) = state.refusals.pop_front() {
            return Err(FeedError::Transport(reason));
        }

        let (server, inbound) = mpsc::unbounded_channel();
        state.server = Some(server);
        Ok(MockTransport {
            relay: self.relay.clone(),
            inbound,
            closed: false,
        })
    }
}

pub struct MockTransport {
    relay: MockRelay,
    inbound: mpsc::UnboundedReceiver<Frame>,
    closed: bool,
}

impl Transport for MockTransport {
    fn send(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(FeedError::Transport("transport closed".to_string()));
        }
        self.relay.state.borrow_mut().sent.push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        match self.inbound.recv().await? {
            Frame::Text(text) => Some(Ok(text)),
            Frame::Error(reason) => Some(Err(FeedError::Transport(reason))),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.relay.state.borrow_mut().closes += 1;
    }
}
