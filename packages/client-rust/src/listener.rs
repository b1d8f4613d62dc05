//! Background consumer of cross-process invalidation events.
//!
//! A dedicated connection subscribes to the resolved channel and drops
//! affected keys from the local tier as events arrive. The loop treats any
//! connection disruption as "unknown events were lost": once the listener
//! is connected again, the entire local tier is flushed, restoring
//! eventual convergence after the gap. Without that flush a transient
//! disconnect would be a silent-staleness bug.
//!
//! Self-originated events are skipped: the façade already updated the
//! local tier with the new value before the round trip could complete,
//! and dropping here would discard the fresher entry.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pgcache_core::events::InvalidationEvent;

use crate::error::CacheError;
use crate::local_cache::LocalCache;
use crate::stats::StatsRecorder;

/// First reconnect delay ceiling.
const BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Reconnect delay ceiling after repeated failures.
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Exponential backoff with full jitter.
///
/// Each failure doubles the ceiling up to the cap; the actual delay is
/// drawn uniformly from `[0, ceiling]`, so a fleet of disconnected
/// listeners does not reconnect in lockstep.
#[derive(Debug)]
pub(crate) struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Returns the next delay and advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self
            .base
            .saturating_mul(2_u32.saturating_pow(self.attempt))
            .min(self.cap);
        self.attempt = self.attempt.saturating_add(1);
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=ceiling_ms))
    }

    /// Resets after a successful receive.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Connects, subscribes, and spawns the listener task.
///
/// Subscription happens before this returns, so a `connect` that cannot
/// listen fails instead of silently running without invalidation.
pub(crate) async fn spawn_listener(
    pool: PgPool,
    channel: String,
    origin: String,
    local: Arc<LocalCache>,
    stats: Arc<StatsRecorder>,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, CacheError> {
    let mut listener = PgListener::connect_with(&pool).await?;
    listener.listen(&channel).await?;
    debug!(%channel, "notification listener subscribed");

    Ok(tokio::spawn(listen_loop(
        listener, channel, origin, local, stats, shutdown,
    )))
}

async fn listen_loop(
    mut listener: PgListener,
    channel: String,
    origin: String,
    local: Arc<LocalCache>,
    stats: Arc<StatsRecorder>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::new(BACKOFF_BASE, BACKOFF_CAP);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            received = listener.try_recv() => match received {
                Ok(Some(notification)) => {
                    backoff.reset();
                    handle_payload(notification.payload(), &origin, &local, &stats);
                }
                Ok(None) => {
                    // The connection dropped and sqlx re-established it.
                    // Events in the gap are gone; the local tier can no
                    // longer be trusted.
                    warn!(%channel, "listener reconnected; flushing local cache");
                    local.clear();
                    stats.record_listener_reset();
                    backoff.reset();
                }
                Err(err) => {
                    warn!(%channel, error = %err, "listener connection error");
                    local.clear();
                    stats.record_listener_reset();
                    let delay = backoff.next_delay();
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
    debug!(%channel, "notification listener stopped");
}

fn handle_payload(
    payload: &str,
    origin: &str,
    local: &LocalCache,
    stats: &StatsRecorder,
) {
    let event = match InvalidationEvent::from_payload(payload) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, payload, "ignoring undecodable invalidation event");
            return;
        }
    };
    if event.origin == origin {
        return;
    }
    debug!(key = %event.key, op = ?event.op, "dropping locally cached key");
    local.drop_key(&event.key);
    stats.record_invalidation();
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use pgcache_core::events::{EventOp, InvalidationEvent};

    use super::*;

    fn seeded_cache() -> LocalCache {
        let cache = LocalCache::new(8);
        cache.put("a", json!(1), Utc::now() + chrono::Duration::hours(1));
        cache
    }

    #[test]
    fn peer_event_drops_the_key() {
        let cache = seeded_cache();
        let stats = StatsRecorder::default();
        let payload = InvalidationEvent::new("a", EventOp::Invalidate, "peer")
            .to_payload()
            .expect("serialize");

        handle_payload(&payload, "self", &cache, &stats);

        assert!(cache.peek("a", Utc::now()).is_none());
        assert_eq!(stats.snapshot().invalidations, 1);
    }

    #[test]
    fn self_event_is_skipped() {
        let cache = seeded_cache();
        let stats = StatsRecorder::default();
        let payload = InvalidationEvent::new("a", EventOp::Set, "self")
            .to_payload()
            .expect("serialize");

        handle_payload(&payload, "self", &cache, &stats);

        assert!(cache.peek("a", Utc::now()).is_some());
        assert_eq!(stats.snapshot().invalidations, 0);
    }

    #[test]
    fn undecodable_payload_is_ignored() {
        let cache = seeded_cache();
        let stats = StatsRecorder::default();

        handle_payload("{oops", "self", &cache, &stats);
        handle_payload(r#"{"key":"a","op":"merge","origin":"p"}"#, "self", &cache, &stats);

        assert!(cache.peek("a", Utc::now()).is_some());
    }

    #[test]
    fn backoff_delays_stay_under_the_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5));
        for _ in 0..20 {
            assert!(backoff.next_delay() <= Duration::from_secs(5));
        }
    }

    #[test]
    fn backoff_ceiling_doubles_until_the_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5));
        // Sample each attempt many times; the observed maximum must stay
        // inside that attempt's ceiling.
        for attempt in 0..4 {
            let ceiling = Duration::from_millis(100 * 2_u64.pow(attempt));
            for _ in 0..50 {
                backoff.attempt = attempt;
                assert!(backoff.next_delay() <= ceiling);
            }
        }
    }

    #[test]
    fn backoff_reset_restarts_the_envelope() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5));
        for _ in 0..10 {
            backoff.next_delay();
        }
        backoff.reset();
        assert!(backoff.next_delay() <= Duration::from_millis(100));
    }
}
