//! Symbol subscription registry and tick dispatcher.
//!
//! Each symbol maps to the observers currently interested in it. The first
//! observer for a symbol and the removal of its last observer are reported
//! back to the caller so the wire-level subscription set can follow.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, warn};

use crate::models::Tick;

/// Source of per-registry tags, so handles from one registry are rejected
/// by every other.
static NEXT_REGISTRY_TAG: AtomicU64 = AtomicU64::new(0);

/// Callback invoked with every tick for the symbol it was registered on.
pub type Observer = Box<dyn FnMut(&Tick)>;

/// Identifies one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Capability returned by [`Registry::subscribe`]; hand it back to remove
/// exactly that observer.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a Subscription leaves the observer registered forever"]
pub struct Subscription {
    registry: u64,
    symbol: String,
    id: ObserverId,
}

impl Subscription {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }
}

struct Entry {
    observers: Vec<(ObserverId, Observer)>,
    ticks: u64,
}

/// Maps symbols to their observers and routes ticks to them.
pub struct Registry {
    tag: u64,
    entries: HashMap<String, Entry>,
    next_id: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            tag: NEXT_REGISTRY_TAG.fetch_add(1, Ordering::Relaxed),
            entries: HashMap::new(),
            next_id: 0,
        }
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `subscription` was handed out by this registry.
    pub fn owns(&self, subscription: &Subscription) -> bool {
        subscription.registry == self.tag
    }

    /// Registers `observer` for `symbol`.
    ///
    /// The returned flag is `true` when this is the symbol's first observer.
    pub fn subscribe(&mut self, symbol: &str, observer: Observer) -> (Subscription, bool) {
        let id = ObserverId(self.next_id);
        self.next_id += 1;

        let first = !self.entries.contains_key(symbol);
        let entry = self.entries.entry(symbol.to_owned()).or_insert_with(|| Entry {
            observers: Vec::new(),
            ticks: 0,
        });
        entry.observers.push((id, observer));
        debug!(symbol, observers = entry.observers.len(), "Observer registered");

        (
            Subscription {
                registry: self.tag,
                symbol: symbol.to_owned(),
                id,
            },
            first,
        )
    }

    /// Removes the observer behind `subscription`.
    ///
    /// Returns `true` when it was the symbol's last observer; the symbol's
    /// entry is gone afterwards. A handle from another registry is logged
    /// and removes nothing.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        if !self.owns(&subscription) {
            warn!(
                symbol = %subscription.symbol,
                observer = subscription.id.0,
                "Ignoring subscription from another registry"
            );
            return false;
        }
        let Some(entry) = self.entries.get_mut(&subscription.symbol) else {
            return false;
        };
        entry.observers.retain(|(id, _)| *id != subscription.id);
        debug!(
            symbol = %subscription.symbol,
            observers = entry.observers.len(),
            "Observer removed"
        );

        if entry.observers.is_empty() {
            self.entries.remove(&subscription.symbol);
            return true;
        }
        false
    }

    /// Delivers `tick` to every observer of its symbol in registration
    /// order and returns how many completed normally.
    ///
    /// An observer that panics is logged and skipped; the others still run.
    pub fn dispatch(&mut self, tick: &Tick) -> usize {
        let Some(entry) = self.entries.get_mut(&tick.symbol) else {
            debug!(symbol = %tick.symbol, "No observers for tick");
            return 0;
        };
        entry.ticks += 1;

        let mut delivered = 0;
        for (id, observer) in &mut entry.observers {
            match panic::catch_unwind(AssertUnwindSafe(|| observer(tick))) {
                Ok(()) => delivered += 1,
                Err(payload) => error!(
                    symbol = %tick.symbol,
                    observer = id.0,
                    reason = panic_message(payload.as_ref()),
                    "Observer panicked while handling tick"
                ),
            }
        }
        delivered
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbols with at least one observer.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn observer_count(&self, symbol: &str) -> usize {
        self.entries.get(symbol).map_or(0, |e| e.observers.len())
    }

    /// Ticks dispatched for `symbol` since its entry was created or the
    /// counters were last reset.
    pub fn tick_count(&self, symbol: &str) -> Option<u64> {
        self.entries.get(symbol).map(|e| e.ticks)
    }

    pub fn reset_tick_counts(&mut self) {
        for entry in self.entries.values_mut() {
            entry.ticks = 0;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
