//! Process-local bounded cache tier.
//!
//! A key-value map with TTL awareness and LRU eviction, private to the
//! process. One short-held mutex protects the whole tier; it is taken by
//! both façade operations and the notification listener and is never held
//! across suspension, so neither side can deadlock the other.
//!
//! Recency is a monotonic tick bumped on every `put` and every `peek` hit.
//! When an insert pushes the map past its bound, the entry with the
//! smallest tick is evicted. Expired entries are lazily discarded on
//! `peek`. Capacity 0 disables the tier entirely: every operation becomes
//! a no-op.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

/// A single materialized entry in the local tier.
#[derive(Debug, Clone)]
struct LocalEntry {
    value: Value,
    expires_at: DateTime<Utc>,
    touched: u64,
}

#[derive(Debug, Default)]
struct TierState {
    entries: HashMap<String, LocalEntry>,
    tick: u64,
}

impl TierState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Evicts least-recently-touched entries until the bound holds.
    ///
    /// Returns how many entries were evicted. The scan is O(len), which is
    /// acceptable for the bounded capacities this tier is configured with.
    fn enforce_bound(&mut self, capacity: usize) -> u64 {
        let mut evicted = 0;
        while self.entries.len() > capacity {
            let coldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(key, _)| key.clone());
            match coldest {
                Some(key) => {
                    self.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}

/// Bounded, TTL-aware key-value tier private to the process.
#[derive(Debug)]
pub(crate) struct LocalCache {
    capacity: usize,
    state: Mutex<TierState>,
}

impl LocalCache {
    /// Creates a tier with the given capacity. 0 disables it.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(TierState::default()),
        }
    }

    /// Returns the entry for `key` if present and unexpired at `now`.
    ///
    /// A hit counts as a touch for LRU purposes. An expired entry is
    /// removed and reported as a miss.
    pub fn peek(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        if self.capacity == 0 {
            return None;
        }
        let mut state = self.state.lock();
        let expired = match state.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => return None,
        };
        if expired {
            state.entries.remove(key);
            return None;
        }
        let tick = state.next_tick();
        let entry = state.entries.get_mut(key)?;
        entry.touched = tick;
        Some(entry.value.clone())
    }

    /// Inserts or replaces an entry, evicting as needed.
    ///
    /// Returns how many entries were evicted to restore the bound.
    pub fn put(&self, key: &str, value: Value, expires_at: DateTime<Utc>) -> u64 {
        if self.capacity == 0 {
            return 0;
        }
        let mut state = self.state.lock();
        let tick = state.next_tick();
        state.entries.insert(
            key.to_string(),
            LocalEntry {
                value,
                expires_at,
                touched: tick,
            },
        );
        state.enforce_bound(self.capacity)
    }

    /// Removes an entry. Returns whether one was present.
    pub fn drop_key(&self, key: &str) -> bool {
        if self.capacity == 0 {
            return false;
        }
        self.state.lock().entries.remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        if self.capacity == 0 {
            return;
        }
        self.state.lock().entries.clear();
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        if self.capacity == 0 {
            return 0;
        }
        self.state.lock().entries.len()
    }
}
