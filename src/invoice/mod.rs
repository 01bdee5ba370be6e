//! Invoice creation: the synchronous front door onto the asynchronous
//! Lightning hand-off.
//!
//! Waits for the `/invoice/pending` snapshot via a one-shot rendezvous: the
//! subscriber callback completes a `tokio::sync::oneshot` channel so the
//! calling task actually suspends instead of polling.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::db::repositories::InvoiceRepository;
use crate::exchange::ExchangeRateSource;
use crate::models::invoice::InvoiceSummary;
use crate::models::Invoice;
use crate::pubsub::{topics, PubSub};

#[derive(Debug, thiserror::Error)]
pub enum InvoiceGenerationError {
    #[error("failed to fetch the current exchange rate: {0}")]
    Exchange(#[from] crate::exchange::ExchangeError),
    #[error("failed to create the invoice row: {0}")]
    Database(#[from] sqlx::Error),
    #[error("timed out waiting for the lightning node to pick up the invoice")]
    TimedOut,
}

#[derive(Clone)]
pub struct InvoiceGenerator {
    repo: InvoiceRepository,
    exchange: ExchangeRateSource,
    bus: PubSub,
    wait_timeout: Duration,
}

impl InvoiceGenerator {
    pub fn new(
        repo: InvoiceRepository,
        exchange: ExchangeRateSource,
        bus: PubSub,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            exchange,
            bus,
            wait_timeout,
        }
    }

    /// Create a new invoice for `account_id` requesting `amount_requested`
    /// USD cents, and wait for the Lightning monitor to turn it into a
    /// bolt11 invoice. Call once per invoice; unsubscribes in every path,
    /// including the timeout and error paths.
    ///
    /// Subscribes to `/invoice/pending` *before* inserting the row and
    /// publishing `/invoice/created`: the monitor reacts to that publish on
    /// its own task and may mint and publish the pending snapshot before
    /// this call would otherwise get around to subscribing, which would
    /// otherwise strand the wait on a rendezvous nobody will ever signal.
    /// The invoice id needed to filter the right pending event isn't known
    /// until the insert returns, so the callback matches against a cell
    /// that starts empty and is filled in right before the publish.
    pub async fn generate(
        &self,
        account_id: i64,
        amount_requested: i64,
    ) -> Result<InvoiceSummary, InvoiceGenerationError> {
        let exchange_rate = self.exchange.sat_per_usd().await?;

        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let target_id: Arc<Mutex<Option<i64>>> = Arc::new(Mutex::new(None));

        let tx_for_callback = tx.clone();
        let target_id_for_callback = target_id.clone();
        let subscriber_id = self.bus.subscribe(
            topics::INVOICE_PENDING,
            Arc::new(move |_topic, payload| {
                let Ok(pending) = serde_json::from_value::<Invoice>(payload.clone()) else {
                    return;
                };
                if pending.account_id != account_id {
                    return;
                }
                if *target_id_for_callback.lock() != Some(pending.invoice_id) {
                    return;
                }
                if let Some(sender) = tx_for_callback.lock().take() {
                    let _ = sender.send(pending);
                }
            }),
        );

        let created = match self.repo.create(account_id, amount_requested).await {
            Ok(created) => created,
            Err(e) => {
                self.bus.unsubscribe(subscriber_id);
                return Err(e.into());
            }
        };
        *target_id.lock() = Some(created.invoice_id);

        // The repository itself stays pubsub-free; publication of the
        // created event is this caller's responsibility so every invoice
        // creation path funnels through the same announcement.
        self.bus.publish_value(topics::INVOICE_CREATED, &created_with_rate(&created, exchange_rate));

        let result = tokio::time::timeout(self.wait_timeout, rx).await;
        self.bus.unsubscribe(subscriber_id);

        match result {
            Ok(Ok(pending)) => Ok(pending.into_summary()),
            Ok(Err(_)) | Err(_) => Err(InvoiceGenerationError::TimedOut),
        }
    }
}

/// The row freshly inserted by `InvoiceRepository::create` does not yet
/// carry the exchange rate captured for this request (that column is a
/// placeholder until the Lightning monitor stamps it in `mark_pending`); the
/// `/invoice/created` event needs it so the monitor can size `msatoshi`.
fn created_with_rate(invoice: &Invoice, exchange_rate: i64) -> Invoice {
    let mut invoice = invoice.clone();
    invoice.exchange_rate = exchange_rate;
    invoice
}
