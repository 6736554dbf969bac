//! Reactive application state store
//!
//! A single JSON tree addressed by dot-delimited paths, with exact-path
//! subscriptions and write-through persistence. The contract mirrors the
//! dashboard's state manager:
//!
//! - `get` walks child objects and returns `None` for any missing segment.
//! - `update` resolves the parent container, assigns the leaf, notifies
//!   handlers registered for exactly that path, then persists the tree.
//!   A missing intermediate segment is an explicit `MissingParent` error.
//! - Subscriptions are exact-path only: a subscriber on `"markets"` does
//!   not observe writes to `"markets.BTC.price"`. Bulk writers re-notify
//!   the coarse path themselves (see the market feed).
//! - A panicking handler is isolated and logged; siblings still run.
//! - A handler may call `update` again; nested notifications are bounded
//!   by a recursion-depth guard instead of growing the stack silently.

mod defaults;

pub use defaults::default_tree;

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::persistence::{KvStore, KEY_STATE, KEY_THEME, KEY_TRADES};

/// Nested notifications deeper than this are dropped with a warning.
const MAX_NOTIFY_DEPTH: usize = 8;

/// Subtrees excluded from the persisted snapshot to bound storage size.
const VOLATILE_PATHS: [&str; 3] = ["markets", "chart.drawings", "chart.indicators"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// An intermediate path segment does not exist (or is not an object).
    #[error("missing parent container for path '{0}'")]
    MissingParent(String),
}

/// Handler invoked with (new_value, old_value, full_state).
pub type Handler = Arc<dyn Fn(&Value, &Value, &Value) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    state: Value,
    /// Exact path -> ordered handlers
    subscribers: HashMap<String, Vec<(SubscriptionId, Handler)>>,
    /// Reverse map for unsubscribe
    paths_by_id: HashMap<SubscriptionId, String>,
    next_id: u64,
}

pub struct Store {
    inner: Mutex<Inner>,
    persistence: Option<KvStore>,
}

thread_local! {
    static NOTIFY_DEPTH: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

impl Store {
    /// In-memory store with the default tree; no persistence.
    pub fn new() -> Self {
        Self::with_tree(default_tree(), None)
    }

    /// Store backed by a durable key-value store; merges the persisted
    /// snapshot over the defaults at construction.
    pub fn with_persistence(kv: KvStore) -> Self {
        let store = Self::with_tree(default_tree(), Some(kv));
        store.load();
        store
    }

    fn with_tree(state: Value, persistence: Option<KvStore>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                subscribers: HashMap::new(),
                paths_by_id: HashMap::new(),
                next_id: 0,
            }),
            persistence,
        }
    }

    /// Read the value at `path`, or `None` if any segment is missing.
    pub fn get(&self, path: &str) -> Option<Value> {
        let inner = self.inner.lock().expect("store lock poisoned");
        walk(&inner.state, path).cloned()
    }

    /// Deep clone of the full tree.
    pub fn snapshot(&self) -> Value {
        self.inner.lock().expect("store lock poisoned").state.clone()
    }

    /// Assign `value` at `path`, notify exact-path subscribers, persist.
    pub fn update(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let old = {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            let old = walk(&inner.state, path).cloned();
            assign(&mut inner.state, path, value.clone())?;
            old
        };
        self.notify(path, &value, &old.unwrap_or(Value::Null));
        self.persist();
        Ok(())
    }

    /// Register an exact-path handler. Handlers for a path run in
    /// subscription order.
    pub fn subscribe<F>(&self, path: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Value, &Value, &Value) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .subscribers
            .entry(path.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        inner.paths_by_id.insert(id, path.to_string());
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if let Some(path) = inner.paths_by_id.remove(&id) {
            if let Some(handlers) = inner.subscribers.get_mut(&path) {
                handlers.retain(|(hid, _)| *hid != id);
            }
        }
    }

    /// Invoke all handlers registered for exactly `path`, synchronously,
    /// in subscription order. A handler panic is logged and does not stop
    /// sibling handlers or the triggering update.
    pub fn notify(&self, path: &str, new_value: &Value, old_value: &Value) {
        let depth = NOTIFY_DEPTH.with(|d| d.get());
        if depth >= MAX_NOTIFY_DEPTH {
            warn!(path, depth, "notification depth limit reached, dropping");
            return;
        }

        let (handlers, state) = {
            let inner = self.inner.lock().expect("store lock poisoned");
            let handlers: Vec<Handler> = inner
                .subscribers
                .get(path)
                .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default();
            if handlers.is_empty() {
                return;
            }
            (handlers, inner.state.clone())
        };

        NOTIFY_DEPTH.with(|d| d.set(depth + 1));
        for handler in &handlers {
            let result = catch_unwind(AssertUnwindSafe(|| {
                handler(new_value, old_value, &state);
            }));
            if result.is_err() {
                error!(path, "subscriber panicked, continuing with remaining handlers");
            }
        }
        NOTIFY_DEPTH.with(|d| d.set(depth));
    }

    /// Re-notify subscribers of `path` with its current value. Used by
    /// bulk writers to surface a coarse-path change after a batch of
    /// per-leaf updates (exact-path semantics have no prefix propagation).
    pub fn notify_path(&self, path: &str) {
        let value = self.get(path).unwrap_or(Value::Null);
        self.notify(path, &value, &Value::Null);
    }

    /// Serialize the tree minus volatile subtrees; trades additionally go
    /// to a dedicated key. Failures are logged, never raised.
    pub fn persist(&self) {
        let Some(kv) = &self.persistence else {
            return;
        };
        let snapshot = self.snapshot();

        let mut pruned = snapshot.clone();
        for path in VOLATILE_PATHS {
            prune(&mut pruned, path);
        }
        kv.save(KEY_STATE, &pruned);

        if let Some(trades) = walk(&snapshot, "journal.trades") {
            kv.save(KEY_TRADES, trades);
        }
        if let Some(theme) = snapshot.get("theme") {
            kv.save(KEY_THEME, theme);
        }
    }

    /// Merge the persisted snapshot over the defaults. Deserialization
    /// failures leave defaults intact.
    pub fn load(&self) {
        let Some(kv) = &self.persistence else {
            return;
        };

        if let Some(Value::Object(saved)) = kv.load(KEY_STATE) {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            if let Value::Object(state) = &mut inner.state {
                for (key, value) in saved {
                    state.insert(key, value);
                }
            }
            debug!("state snapshot loaded");
        }

        // Trades come from their dedicated key, overriding whatever the
        // snapshot carried, so a corrupt main snapshot cannot lose them.
        if let Some(trades @ Value::Array(_)) = kv.load(KEY_TRADES) {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            if let Some(journal) = inner.state.get_mut("journal") {
                if let Some(obj) = journal.as_object_mut() {
                    obj.insert("trades".to_string(), trades);
                }
            }
        }
        info!("state loaded from persistence");
    }

    /// Full-state export blob, volatile subtrees included.
    pub fn export_snapshot(&self) -> Value {
        crate::persistence::export_blob("state", self.snapshot())
    }

    /// Flip between dark and light, notifying `theme` subscribers.
    pub fn toggle_theme(&self) {
        let current = self
            .get("theme")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "dark".to_string());
        let next = if current == "dark" { "light" } else { "dark" };
        let _ = self.update("theme", Value::String(next.to_string()));
    }

    /// Wire the derived-data pipeline: journal changes recompute the
    /// performance panel, risk input changes recompute the risk panel.
    pub fn wire_subscriptions(self: &Arc<Self>) {
        let weak: Weak<Store> = Arc::downgrade(self);

        let w = weak.clone();
        self.subscribe("journal.trades", move |new_value, _, _| {
            if let Some(store) = w.upgrade() {
                crate::journal::refresh_performance(&store, new_value);
            }
        });

        for path in ["risk.capital", "risk.riskPercent", "risk.stopLoss"] {
            let w = weak.clone();
            self.subscribe(path, move |_, _, _| {
                if let Some(store) = w.upgrade() {
                    crate::risk::refresh_risk_panel(&store);
                }
            });
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk `path` through nested objects; `None` on any missing segment.
fn walk<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Assign `value` at `path`. Intermediate segments must already exist as
/// objects; the leaf key is created if absent.
fn assign(root: &mut Value, path: &str, value: Value) -> Result<(), StoreError> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = root;
    for segment in &segments[..segments.len() - 1] {
        current = current
            .get_mut(*segment)
            .ok_or_else(|| StoreError::MissingParent(path.to_string()))?;
    }
    let parent = current
        .as_object_mut()
        .ok_or_else(|| StoreError::MissingParent(path.to_string()))?;
    parent.insert(segments[segments.len() - 1].to_string(), value);
    Ok(())
}

/// Remove the subtree at `path`, if present.
fn prune(root: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = root;
    for segment in &segments[..segments.len() - 1] {
        match current.get_mut(*segment) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(obj) = current.as_object_mut() {
        obj.remove(segments[segments.len() - 1]);
    }
}
