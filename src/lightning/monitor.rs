//! Background task bridging the invoice lifecycle to the Lightning node.
//!
//! Subscribes to `/invoice/created`, asks the node to generate a bolt11
//! invoice, writes it back as `pending`, and publishes `/invoice/pending`.
//! A second loop polls `invoice_status` for every still-pending label and,
//! on a terminal status, finalizes the row and publishes
//! `/invoice/finalized`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::config::LightningConfig;
use crate::db::repositories::InvoiceRepository;
use crate::lightning::client::{LightningClient, NodeInvoiceStatus};
use crate::models::invoice::{FinalizedInvoiceEvent, InvoiceStatus};
use crate::models::Invoice;
use crate::pubsub::{topics, PubSub};

struct Inner {
    node: LightningClient,
    repo: InvoiceRepository,
    bus: PubSub,
    label_prefix: String,
    invoice_expiry: String,
    poll_interval: Duration,
    pending_labels: Mutex<HashMap<i64, String>>,
    stopped: AtomicBool,
}

/// Owns the node connection details and the set of invoices currently
/// awaiting settlement. Cheap to clone; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct LightningMonitor {
    inner: Arc<Inner>,
}

impl LightningMonitor {
    pub fn new(config: &LightningConfig, repo: InvoiceRepository, bus: PubSub) -> Self {
        Self {
            inner: Arc::new(Inner {
                node: LightningClient::new(config.socket_path.clone()),
                repo,
                bus,
                label_prefix: config.label_prefix.clone(),
                invoice_expiry: config.invoice_expiry.clone(),
                poll_interval: Duration::from_millis(config.poll_interval_ms),
                pending_labels: Mutex::new(HashMap::new()),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Cooperative shutdown: the polling loop checks this flag between
    /// ticks and exits once it observes it set. Does not interrupt an
    /// in-flight node call or the `/invoice/created` handler.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    fn label_for(&self, account_id: i64, invoice_id: i64) -> String {
        format!("{}-{}-{}", self.inner.label_prefix, account_id, invoice_id)
    }

    /// Subscribes to `/invoice/created` and spawns the polling loop. The
    /// returned subscription id is never unsubscribed in normal operation;
    /// the monitor lives for the process lifetime.
    pub fn start(&self) {
        let monitor = self.clone();
        self.inner.bus.subscribe(
            topics::INVOICE_CREATED,
            Arc::new(move |_topic, payload| {
                let monitor = monitor.clone();
                let payload = payload.clone();
                tokio::spawn(async move {
                    if let Err(e) = monitor.on_invoice_created(payload).await {
                        tracing::error!(error = %e, "failed to hand invoice off to lightning node");
                    }
                });
            }),
        );

        let monitor = self.clone();
        tokio::spawn(async move {
            monitor.poll_loop().await;
        });
    }

    async fn on_invoice_created(&self, payload: Value) -> anyhow::Result<()> {
        let invoice: Invoice = serde_json::from_value(payload)?;
        let label = self.label_for(invoice.account_id, invoice.invoice_id);

        let msatoshi = invoice.amount_requested * invoice.exchange_rate * 1000;
        let node_invoice = self
            .inner
            .node
            .invoice(&label, msatoshi, "", &self.inner.invoice_expiry)
            .await?;

        let updated = self
            .inner
            .repo
            .mark_pending(
                invoice.invoice_id,
                &node_invoice.bolt11,
                invoice.exchange_rate,
                node_invoice.expires_at,
            )
            .await?;

        self.inner
            .pending_labels
            .lock()
            .insert(invoice.invoice_id, label);

        self.inner.bus.publish_value(topics::INVOICE_PENDING, &updated);
        Ok(())
    }

    async fn poll_loop(&self) {
        loop {
            tokio::time::sleep(self.inner.poll_interval).await;

            if self.inner.stopped.load(Ordering::SeqCst) {
                break;
            }

            let snapshot: Vec<(i64, String)> = self
                .inner
                .pending_labels
                .lock()
                .iter()
                .map(|(id, label)| (*id, label.clone()))
                .collect();

            for (invoice_id, label) in snapshot {
                match self.inner.node.invoice_status(&label).await {
                    Ok(NodeInvoiceStatus::Paid) => self.finalize(invoice_id, InvoiceStatus::Paid).await,
                    Ok(NodeInvoiceStatus::Expired) => {
                        self.finalize(invoice_id, InvoiceStatus::Expired).await
                    }
                    Ok(NodeInvoiceStatus::Unpaid) => {}
                    Err(e) => tracing::debug!(invoice_id, error = %e, "invoice_status poll failed"),
                }
            }
        }
    }

    async fn finalize(&self, invoice_id: i64, status: InvoiceStatus) {
        let invoice = match self.inner.repo.finalize(invoice_id, status).await {
            Ok(invoice) => invoice,
            Err(e) => {
                tracing::error!(invoice_id, error = %e, "failed to finalize invoice");
                return;
            }
        };

        self.inner.bus.publish_value(
            topics::INVOICE_FINALIZED,
            &FinalizedInvoiceEvent {
                invoice_id: invoice.invoice_id,
                account_id: invoice.account_id,
                status,
            },
        );

        self.inner.pending_labels.lock().remove(&invoice_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_matches_prefix_account_invoice_convention() {
        let label_prefix = "OpenLightningWallet";
        let label = format!("{}-{}-{}", label_prefix, 7, 42);
        assert_eq!(label, "OpenLightningWallet-7-42");
    }

    #[tokio::test]
    async fn poll_loop_exits_once_stopped() {
        let monitor = LightningMonitor::new(
            &LightningConfig {
                socket_path: "/tmp/unused.sock".to_string(),
                label_prefix: "test".to_string(),
                invoice_expiry: "10m".to_string(),
                poll_interval_ms: 5,
            },
            InvoiceRepository::new(Arc::new(
                sqlx::postgres::PgPoolOptions::new()
                    .connect_lazy("postgres://localhost/unused")
                    .expect("lazy pool construction never touches the network"),
            )),
            PubSub::new(),
        );

        monitor.stop();
        let handle = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.poll_loop().await }
        });

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poll_loop exits promptly once stopped")
            .expect("task does not panic");
    }
}
