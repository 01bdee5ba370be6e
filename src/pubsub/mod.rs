//! Process-local topic-based publish/subscribe bus.
//!
//! The subscriber map is guarded by a single lock, and callbacks fire
//! outside that lock so a callback may itself subscribe, unsubscribe, or
//! publish without deadlocking. Delivery is synchronous and preserves
//! publication order per subscriber; exact-topic match only, no wildcards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

pub mod topics {
    pub const INVOICE_CREATED: &str = "/invoice/created";
    pub const INVOICE_PENDING: &str = "/invoice/pending";
    pub const INVOICE_FINALIZED: &str = "/invoice/finalized";
}

pub type Callback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

struct Subscription {
    topic: String,
    callback: Callback,
}

/// An in-process fan-out bus. Cheap to clone (wraps an `Arc`); production
/// wires a single instance shared through `AppState`, tests construct their
/// own so that PubSub state never leaks across test cases.
#[derive(Clone)]
pub struct PubSub {
    inner: Arc<Inner>,
}

struct Inner {
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                subscriptions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a callback for an exact-match topic. Returns a fresh
    /// positive id usable with `unsubscribe`.
    pub fn subscribe(&self, topic: impl Into<String>, callback: Callback) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let topic = topic.into();
        self.inner.subscriptions.lock().insert(
            id,
            Subscription {
                topic,
                callback,
            },
        );
        id
    }

    /// Idempotent: removing an id that is absent (already unsubscribed, or
    /// never registered) is not an error.
    pub fn unsubscribe(&self, id: u64) {
        self.inner.subscriptions.lock().remove(&id);
    }

    /// Deliver `payload` synchronously to every subscriber whose topic
    /// equals `topic`, in registration order. The subscriber snapshot is
    /// taken under the lock and then the lock is dropped before any
    /// callback runs, so a callback is free to subscribe/unsubscribe/publish
    /// itself. A failing callback is logged and does not prevent delivery
    /// to the remaining subscribers.
    pub fn publish(&self, topic: &str, payload: Value) {
        let matching: Vec<Callback> = {
            let subs = self.inner.subscriptions.lock();
            let mut ids: Vec<_> = subs
                .iter()
                .filter(|(_, s)| s.topic == topic)
                .collect();
            ids.sort_by_key(|(id, _)| **id);
            ids.into_iter().map(|(_, s)| s.callback.clone()).collect()
        };

        for callback in matching {
            let topic = topic.to_string();
            let payload = payload.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&topic, &payload);
            }));
            if let Err(panic) = result {
                tracing::error!(topic = %topic, "pubsub subscriber panicked: {:?}", panic);
            }
        }
    }

    /// Convenience: serialize `payload` and publish, logging (not
    /// panicking) on a serialization failure, matching the bus's
    /// "log and swallow" failure policy.
    pub fn publish_value<T: serde::Serialize>(&self, topic: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.publish(topic, value),
            Err(e) => tracing::error!(topic = %topic, error = %e, "failed to serialize pubsub payload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn subscriber_receives_published_event() {
        let bus = PubSub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        bus.subscribe(
            "/invoice/created",
            Arc::new(move |_topic, _payload| {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish("/invoice/created", serde_json::json!({"invoice_id": 1}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exact_topic_match_only() {
        let bus = PubSub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        bus.subscribe(
            "/invoice/created",
            Arc::new(move |_t, _p| {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish("/invoice/pending", serde_json::json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_stops_delivery() {
        let bus = PubSub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let id = bus.subscribe(
            "/invoice/created",
            Arc::new(move |_t, _p| {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.unsubscribe(id);
        bus.unsubscribe(id); // idempotent
        bus.publish("/invoice/created", serde_json::json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_may_unsubscribe_itself_without_deadlock() {
        let bus = PubSub::new();
        let bus2 = bus.clone();
        let id_cell: Arc<Mutex<Option<u64>>> = Arc::new(Mutex::new(None));
        let id_cell2 = id_cell.clone();

        let id = bus.subscribe(
            "/invoice/created",
            Arc::new(move |_t, _p| {
                if let Some(id) = *id_cell2.lock() {
                    bus2.unsubscribe(id);
                }
            }),
        );
        *id_cell.lock() = Some(id);

        // Must not deadlock.
        bus.publish("/invoice/created", serde_json::json!({}));
        assert!(bus.inner.subscriptions.lock().is_empty());
    }

    #[test]
    fn second_subscriber_still_runs_after_first_panics() {
        let bus = PubSub::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();

        bus.subscribe(
            "/invoice/created",
            Arc::new(|_t, _p| panic!("boom")),
        );
        bus.subscribe(
            "/invoice/created",
            Arc::new(move |_t, _p| {
                ran2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish("/invoice/created", serde_json::json!({}));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
