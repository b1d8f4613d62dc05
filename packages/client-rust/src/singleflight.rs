//! Per-key single-flight coordination.
//!
//! Guarantees at-most-one concurrent loader invocation per key within the
//! process. The first caller to miss becomes the slot's *creator* and is
//! obliged to publish exactly once; everyone else becomes a *waiter* and
//! suspends until the outcome lands. Publication removes the slot from
//! the registry before waiters resume, so the next caller after an
//! outcome observes a fresh miss.
//!
//! The registry mutex is short-held and never crosses a suspension point;
//! waiting happens on a `tokio::sync::watch` channel outside the lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::CacheError;

/// Published outcome of a slot.
#[derive(Debug, Clone)]
enum SlotState {
    /// The creator has not published yet.
    Pending,
    /// The creator produced a value.
    Resolved(Value),
    /// The creator failed; waiters surface this as a loader error.
    Failed(String),
    /// The slot was rejected at shutdown, or the creator vanished.
    Cancelled,
}

type SlotSender = Arc<watch::Sender<SlotState>>;

#[derive(Debug, Default)]
struct Registry {
    slots: Mutex<HashMap<String, SlotSender>>,
}

impl Registry {
    /// Removes `key` only if it still maps to `sender`.
    ///
    /// A slot resolved long ago must not remove its successor for the
    /// same key.
    fn remove_if_current(&self, key: &str, sender: &SlotSender) {
        let mut slots = self.slots.lock();
        if let Some(current) = slots.get(key) {
            if Arc::ptr_eq(current, sender) {
                slots.remove(key);
            }
        }
    }
}

/// Per-key single-flight registry.
#[derive(Debug, Clone, Default)]
pub(crate) struct Singleflight {
    registry: Arc<Registry>,
}

/// Outcome of [`Singleflight::acquire`].
pub(crate) enum Acquired {
    /// This caller owns the slot and must publish exactly once.
    Creator(SlotGuard),
    /// Another caller owns the slot; wait for its outcome.
    Waiter(SlotWaiter),
}

impl Singleflight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the slot for `key`, creating it on first miss.
    pub fn acquire(&self, key: &str) -> Acquired {
        let mut slots = self.registry.slots.lock();
        if let Some(sender) = slots.get(key) {
            return Acquired::Waiter(SlotWaiter {
                receiver: sender.subscribe(),
            });
        }
        let (tx, _rx) = watch::channel(SlotState::Pending);
        let sender = Arc::new(tx);
        slots.insert(key.to_string(), Arc::clone(&sender));
        Acquired::Creator(SlotGuard {
            key: key.to_string(),
            sender,
            registry: Arc::clone(&self.registry),
            published: false,
        })
    }

    /// Rejects every outstanding slot with `Cancelled`.
    ///
    /// Called by `close`; waiters resume with [`CacheError::Cancelled`]
    /// and the registry is left empty for any later instance.
    pub fn fail_all(&self) {
        let drained: Vec<SlotSender> = {
            let mut slots = self.registry.slots.lock();
            slots.drain().map(|(_, sender)| sender).collect()
        };
        for sender in drained {
            let _ = sender.send(SlotState::Cancelled);
        }
    }

    /// Number of live slots. Test hook.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.registry.slots.lock().len()
    }
}

/// Creator-side handle: publishes the slot outcome exactly once.
///
/// Dropping the guard without publishing rejects the slot with
/// `Cancelled`, so an aborted creator never strands its waiters.
pub(crate) struct SlotGuard {
    key: String,
    sender: SlotSender,
    registry: Arc<Registry>,
    published: bool,
}

impl SlotGuard {
    /// Publishes a value to every waiter.
    pub fn resolve(mut self, value: Value) {
        self.publish(SlotState::Resolved(value));
    }

    /// Publishes a failure to every waiter.
    pub fn fail(mut self, message: String) {
        self.publish(SlotState::Failed(message));
    }

    /// Rejects the slot without an outcome.
    pub fn cancel(mut self) {
        self.publish(SlotState::Cancelled);
    }

    fn publish(&mut self, state: SlotState) {
        // Remove before sending: a waiter that resumes and immediately
        // retries must observe a fresh miss, never this finished slot.
        self.registry.remove_if_current(&self.key, &self.sender);
        let _ = self.sender.send(state);
        self.published = true;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.published {
            self.publish(SlotState::Cancelled);
        }
    }
}

/// Waiter-side handle on a slot.
pub(crate) struct SlotWaiter {
    receiver: watch::Receiver<SlotState>,
}

impl SlotWaiter {
    /// Suspends until the slot publishes, then returns the shared outcome.
    ///
    /// Waiters observe value equivalence, not identity: each gets its own
    /// clone of the resolved value.
    pub async fn wait(mut self) -> Result<Value, CacheError> {
        loop {
            {
                let state = self.receiver.borrow_and_update();
                match &*state {
                    SlotState::Pending => {}
                    SlotState::Resolved(value) => return Ok(value.clone()),
                    SlotState::Failed(message) => {
                        return Err(CacheError::Loader {
                            message: message.clone(),
                        })
                    }
                    SlotState::Cancelled => return Err(CacheError::Cancelled),
                }
            }
            if self.receiver.changed().await.is_err() {
                // Sender dropped without publishing; treat as shutdown.
                return Err(CacheError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn waiters_share_the_creator_outcome() {
        let flights = Singleflight::new();

        let Acquired::Creator(guard) = flights.acquire("k") else {
            panic!("first caller must create");
        };

        let mut waiters = Vec::new();
        for _ in 0..10 {
            let Acquired::Waiter(waiter) = flights.acquire("k") else {
                panic!("subsequent callers must wait");
            };
            waiters.push(tokio::spawn(waiter.wait()));
        }

        guard.resolve(json!({"n": 7}));

        for handle in waiters {
            let value = handle.await.expect("join").expect("resolved");
            assert_eq!(value, json!({"n": 7}));
        }
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_as_loader_error() {
        let flights = Singleflight::new();

        let Acquired::Creator(guard) = flights.acquire("k") else {
            panic!("creator expected");
        };
        let Acquired::Waiter(waiter) = flights.acquire("k") else {
            panic!("waiter expected");
        };

        guard.fail("boom".to_string());

        let err = waiter.wait().await.expect_err("failed slot");
        match err {
            CacheError::Loader { message } => assert_eq!(message, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn slot_is_removed_before_waiters_resume() {
        let flights = Singleflight::new();

        let Acquired::Creator(guard) = flights.acquire("k") else {
            panic!("creator expected");
        };
        let Acquired::Waiter(waiter) = flights.acquire("k") else {
            panic!("waiter expected");
        };

        guard.resolve(json!(1));
        waiter.wait().await.expect("resolved");

        // A fresh caller after publication starts a new flight.
        assert!(matches!(flights.acquire("k"), Acquired::Creator(_)));
    }

    #[tokio::test]
    async fn dropped_guard_cancels_waiters() {
        let flights = Singleflight::new();

        let Acquired::Creator(guard) = flights.acquire("k") else {
            panic!("creator expected");
        };
        let Acquired::Waiter(waiter) = flights.acquire("k") else {
            panic!("waiter expected");
        };

        drop(guard);

        assert!(matches!(
            waiter.wait().await,
            Err(CacheError::Cancelled)
        ));
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test]
    async fn fail_all_rejects_outstanding_slots() {
        let flights = Singleflight::new();

        let Acquired::Creator(guard_a) = flights.acquire("a") else {
            panic!("creator expected");
        };
        let Acquired::Creator(_guard_b) = flights.acquire("b") else {
            panic!("creator expected");
        };
        let Acquired::Waiter(waiter) = flights.acquire("a") else {
            panic!("waiter expected");
        };

        flights.fail_all();

        assert!(matches!(
            waiter.wait().await,
            Err(CacheError::Cancelled)
        ));
        assert_eq!(flights.len(), 0);

        // The old guard resolving late must not clobber a successor slot.
        let Acquired::Creator(successor) = flights.acquire("a") else {
            panic!("successor creator expected");
        };
        guard_a.resolve(json!("stale"));
        assert_eq!(flights.len(), 1);
        successor.resolve(json!("fresh"));
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_fly_independently() {
        let flights = Singleflight::new();

        assert!(matches!(flights.acquire("a"), Acquired::Creator(_)));
        assert!(matches!(flights.acquire("b"), Acquired::Creator(_)));
    }

    #[tokio::test]
    async fn waiter_can_disappear_without_affecting_the_creator() {
        let flights = Singleflight::new();

        let Acquired::Creator(guard) = flights.acquire("k") else {
            panic!("creator expected");
        };
        let Acquired::Waiter(waiter) = flights.acquire("k") else {
            panic!("waiter expected");
        };
        drop(waiter);

        // Publishing into a waiterless slot is fine.
        guard.resolve(json!(42));
        assert_eq!(flights.len(), 0);
    }
}
