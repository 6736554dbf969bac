//! Short-lived quote cache
//!
//! Polled REST sources share a TTL cache so concurrent refreshes of the
//! same symbol collapse into one upstream request. Entries expire after
//! 30 seconds, matching the polling cadence.

use crate::types::{MarketKey, MarketTick};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

struct Entry {
    tick: MarketTick,
    stored_at: Instant,
}

pub struct TickCache {
    ttl: Duration,
    entries: Mutex<HashMap<MarketKey, Entry>>,
}

impl TickCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh entry for `key`, or `None` when absent or at/past TTL.
    pub fn get(&self, key: MarketKey) -> Option<MarketTick> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let entry = entries.get(&key)?;
        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.tick.clone())
    }

    pub fn put(&self, key: MarketKey, tick: MarketTick) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key,
            Entry {
                tick,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }
}

impl Default for TickCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
