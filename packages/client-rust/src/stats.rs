//! Process-local cache statistics.
//!
//! Counters are relaxed atomics: they are diagnostics, not synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of a cache instance's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the local tier.
    pub local_hits: u64,
    /// Reads served from the authoritative store.
    pub store_hits: u64,
    /// Reads that found nothing (absent or expired everywhere).
    pub misses: u64,
    /// Local entries evicted by the capacity bound.
    pub evictions: u64,
    /// Local entries dropped by peer invalidation events.
    pub invalidations: u64,
    /// Full local-tier flushes caused by listener reconnects.
    pub listener_resets: u64,
}

/// Internal recorder behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    local_hits: AtomicU64,
    store_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
    listener_resets: AtomicU64,
}

impl StatsRecorder {
    pub fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_hit(&self) {
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        if count > 0 {
            self.evictions.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_listener_reset(&self) {
        self.listener_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            listener_resets: self.listener_resets.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counts() {
        let recorder = StatsRecorder::default();
        recorder.record_local_hit();
        recorder.record_local_hit();
        recorder.record_store_hit();
        recorder.record_miss();
        recorder.record_evictions(3);
        recorder.record_evictions(0);
        recorder.record_invalidation();
        recorder.record_listener_reset();

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.local_hits, 2);
        assert_eq!(snapshot.store_hits, 1);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.evictions, 3);
        assert_eq!(snapshot.invalidations, 1);
        assert_eq!(snapshot.listener_resets, 1);
    }

    #[test]
    fn fresh_recorder_is_all_zeros() {
        let recorder = StatsRecorder::default();
        assert_eq!(recorder.snapshot(), CacheStats::default());
    }
}
