//! Per-connection event feeds.
//!
//! A feed subscribes to a pubsub topic, accumulates matching events into a
//! bounded queue, and on every cooperative tick drains up to
//! `FEED_MAX_BATCH` of them into one `feed` notification. Re-checks
//! authentication on every tick. The feed quota check is strict (`>=`, not
//! `>`): once `max_feeds_allowed` feeds are active, a new `select_feed`
//! is rejected rather than allowed one slot over quota.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::rpc::{JsonRpcError, JsonRpcResult};
use crate::models::invoice::FinalizedInvoiceEvent;
use crate::pubsub::{topics, PubSub};
use crate::rpc::envelope::FeedNotification;
use crate::rpc::session::Session;

pub const FEED_MAX_BATCH: usize = 100;
pub const FEED_TYPE_FINALIZED_INVOICES: &str = "finalized_invoices";

struct FeedState {
    feed_type: String,
    cancelled: Arc<AtomicBool>,
}

/// The set of feeds active on one connection, plus the id allocator. Shared
/// by every worker in the connection's pool; `select_feed`/`cancel_feed`
/// mutate it, and each feed's streaming loop removes its own entry on exit.
pub struct FeedRegistry {
    max_feeds_allowed: usize,
    last_feed_id: AtomicU64,
    feeds: Mutex<Vec<(u64, FeedState)>>,
    bus: PubSub,
    session: Session,
    outbound: mpsc::UnboundedSender<Value>,
    tick_interval: std::time::Duration,
}

impl FeedRegistry {
    pub fn new(
        max_feeds_allowed: usize,
        bus: PubSub,
        session: Session,
        outbound: mpsc::UnboundedSender<Value>,
        tick_interval: std::time::Duration,
    ) -> Self {
        Self {
            max_feeds_allowed,
            last_feed_id: AtomicU64::new(0),
            feeds: Mutex::new(Vec::new()),
            bus,
            session,
            outbound,
            tick_interval,
        }
    }

    fn feed_type_exists(&self, feed_type: &str) -> bool {
        self.feeds.lock().iter().any(|(_, s)| s.feed_type == feed_type)
    }

    /// Allocate a feed, reply the id to the caller, and spawn its streaming
    /// loop as an independent task so the worker that accepted
    /// `select_feed` is free to pick up the next inbound frame immediately.
    ///
    /// Takes `self: &Arc<Self>` (not `&self`) because the streaming loop
    /// below outlives this call — it runs as an independent `tokio::spawn`
    /// task and needs its own owned handle to the registry so it can
    /// deregister itself (`remove`) once it exits.
    pub async fn select_feed(self: &Arc<Self>, account_id: i64, feed_type: &str) -> JsonRpcResult<u64> {
        if self.feeds.lock().len() >= self.max_feeds_allowed {
            return Err(JsonRpcError::invalid_request(
                "max feeds reached",
                "You have reached the max number of feeds",
            ));
        }
        if self.feed_type_exists(feed_type) {
            return Err(JsonRpcError::invalid_request(
                format!("feed type {feed_type} already exists"),
                format!("Feed type {feed_type} already exists"),
            ));
        }
        if feed_type != FEED_TYPE_FINALIZED_INVOICES {
            return Err(JsonRpcError::invalid_params(
                format!("unknown feed_type: {feed_type}"),
                "Unknown feed type",
            ));
        }

        let feed_id = self.last_feed_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancelled = Arc::new(AtomicBool::new(false));
        self.feeds.lock().push((
            feed_id,
            FeedState {
                feed_type: feed_type.to_string(),
                cancelled: cancelled.clone(),
            },
        ));

        self.run_finalized_invoices_feed(feed_id, account_id, cancelled);
        Ok(feed_id)
    }

    pub fn cancel_feed(&self, feed_id: u64) -> JsonRpcResult<()> {
        let feeds = self.feeds.lock();
        match feeds.iter().find(|(id, _)| *id == feed_id) {
            Some((_, state)) => {
                state.cancelled.store(true, Ordering::SeqCst);
                Ok(())
            }
            None => Err(JsonRpcError::invalid_request(
                format!("feed id {feed_id} not found"),
                format!("Feed ID {feed_id} is not found"),
            )),
        }
    }

    /// Cancels every feed on this connection; called when the connection
    /// closes so each streaming loop observes `cancelled` and unwinds.
    pub fn cancel_all(&self) {
        for (_, state) in self.feeds.lock().iter() {
            state.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn remove(&self, feed_id: u64) {
        self.feeds.lock().retain(|(id, _)| *id != feed_id);
    }

    fn run_finalized_invoices_feed(self: &Arc<Self>, feed_id: u64, account_id: i64, cancelled: Arc<AtomicBool>) {
        let queue: Arc<Mutex<VecDeque<Value>>> = Arc::new(Mutex::new(VecDeque::new()));
        let queue_for_callback = queue.clone();

        let subscriber_id = self.bus.subscribe(
            topics::INVOICE_FINALIZED,
            Arc::new(move |_topic, payload| {
                let Ok(event) = serde_json::from_value::<FinalizedInvoiceEvent>(payload.clone()) else {
                    return;
                };
                if event.account_id != account_id {
                    return;
                }
                queue_for_callback.lock().push_back(serde_json::json!({
                    "invoice_id": event.invoice_id,
                    "status": event.status,
                }));
            }),
        );

        let registry = self.clone();
        let bus = self.bus.clone();
        let session = self.session.clone();
        let outbound = self.outbound.clone();
        let tick_interval = self.tick_interval;

        // Each feed owns its loop as an independent task so the worker that
        // called `select_feed` is free to pick up the next inbound message
        // immediately, keeping requests pipelined rather than blocked on a
        // still-streaming feed.
        tokio::spawn(async move {
            loop {
                if cancelled.load(Ordering::SeqCst) || session.check_auth().is_err() {
                    break;
                }

                let items: Vec<Value> = {
                    let mut q = queue.lock();
                    let mut items = Vec::new();
                    while items.len() < FEED_MAX_BATCH {
                        match q.pop_front() {
                            Some(item) => items.push(item),
                            None => break,
                        }
                    }
                    items
                };

                if !items.is_empty() {
                    let notification = FeedNotification::new(feed_id, items);
                    if let Ok(value) = serde_json::to_value(&notification) {
                        if outbound.send(value).is_err() {
                            break;
                        }
                    }
                }

                // Without this sleep the loop would spin a full core
                // checking an empty queue between batches.
                tokio::time::sleep(tick_interval).await;
            }

            bus.unsubscribe(subscriber_id);
            registry.remove(feed_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(max_feeds: usize) -> (Arc<FeedRegistry>, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(FeedRegistry::new(
                max_feeds,
                PubSub::new(),
                Session::new(),
                tx,
                std::time::Duration::from_millis(5),
            )),
            rx,
        )
    }

    /// Like `registry`, but with a session that stays authenticated for the
    /// duration of the test, so the streaming loop doesn't cancel itself on
    /// its first tick — needed by tests that wait for a published event.
    fn registry_authenticated(
        max_feeds: usize,
        account_id: i64,
        bus: PubSub,
    ) -> (Arc<FeedRegistry>, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new();
        session.set_authenticated(account_id, chrono::Utc::now().timestamp() + 3600);
        (
            Arc::new(FeedRegistry::new(
                max_feeds,
                bus,
                session,
                tx,
                std::time::Duration::from_millis(5),
            )),
            rx,
        )
    }

    #[tokio::test]
    async fn select_feed_rejects_unknown_feed_type() {
        let (registry, _rx) = registry(1);
        let account_id = 1;
        let err = registry.select_feed(account_id, "bogus").await.unwrap_err();
        assert_eq!(err.code, crate::error::rpc::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn select_feed_enforces_quota_strictly() {
        let (registry, _rx) = registry(1);
        let first = registry
            .select_feed(1, FEED_TYPE_FINALIZED_INVOICES)
            .await
            .expect("first feed succeeds");
        assert_eq!(first, 1);

        let err = registry
            .select_feed(1, FEED_TYPE_FINALIZED_INVOICES)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::rpc::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn cancel_feed_rejects_unknown_id() {
        let (registry, _rx) = registry(1);
        let err = registry.cancel_feed(999).unwrap_err();
        assert_eq!(err.code, crate::error::rpc::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn cancelled_feed_frees_its_slot_for_reselection() {
        let (registry, _rx) = registry(1);
        let feed_id = registry
            .select_feed(1, FEED_TYPE_FINALIZED_INVOICES)
            .await
            .expect("first feed succeeds");
        registry.cancel_feed(feed_id).expect("cancel succeeds");

        // The streaming loop notices `cancelled` and deregisters itself on
        // its next tick; give it a moment to do so.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        registry
            .select_feed(1, FEED_TYPE_FINALIZED_INVOICES)
            .await
            .expect("slot is free again after cancellation");
    }

    #[tokio::test]
    async fn finalized_event_is_delivered_only_to_its_own_account() {
        let bus = PubSub::new();
        let (registry, mut rx) = registry_authenticated(1, 5, bus.clone());

        let feed_id = registry
            .select_feed(5, FEED_TYPE_FINALIZED_INVOICES)
            .await
            .expect("feed selects");

        bus.publish_value(
            topics::INVOICE_FINALIZED,
            &FinalizedInvoiceEvent {
                invoice_id: 7,
                account_id: 5,
                status: crate::models::invoice::InvoiceStatus::Paid,
            },
        );
        bus.publish_value(
            topics::INVOICE_FINALIZED,
            &FinalizedInvoiceEvent {
                invoice_id: 8,
                account_id: 6,
                status: crate::models::invoice::InvoiceStatus::Paid,
            },
        );

        let notification = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv())
            .await
            .expect("a feed notification arrives")
            .expect("channel stays open");

        assert_eq!(notification["method"], "feed");
        assert_eq!(notification["params"]["feed_id"], feed_id);
        let items = notification["params"]["feed"].as_array().unwrap();
        assert_eq!(items.len(), 1, "the other account's event must not appear in this batch");
        assert_eq!(items[0]["invoice_id"], 7);
        assert_eq!(items[0]["status"], "paid");

        let second = tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await;
        assert!(
            second.is_err(),
            "no further notification should arrive for the other account's event"
        );
    }
}
