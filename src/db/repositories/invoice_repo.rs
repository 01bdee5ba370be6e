use sqlx::PgPool;

use crate::db::pool::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::invoice::InvoiceStatus;
use crate::models::Invoice;

/// Runtime-checked queries against `invoices`. `create` assigns `invoice_id`
/// on insert; publishing the `/invoice/created` event is the caller's
/// responsibility (see `invoice::InvoiceGenerator`) so this repository stays
/// free of a pubsub dependency.
#[derive(Clone)]
pub struct InvoiceRepository {
    pool: DbPool,
}

impl InvoiceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_by_id(&self, invoice_id: i64) -> AppResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT invoice_id, account_id, status, encoded_invoice, created_at, \
             amount_requested, exchange_rate, expired_at \
             FROM invoices WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(invoice)
    }

    /// Reject a transition to `next` unless `invoice_id`'s current status
    /// permits it under the `created -> pending -> {paid, expired}` order.
    async fn guard_transition(&self, invoice_id: i64, next: InvoiceStatus) -> AppResult<()> {
        let current = self
            .find_by_id(invoice_id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("invoice {invoice_id} does not exist")))?
            .status;

        if !current.can_transition_to(next) {
            return Err(AppError::Validation(format!(
                "invoice {invoice_id} cannot transition from {current:?} to {next:?}"
            )));
        }

        Ok(())
    }

    /// Insert a new `created` invoice for `account_id` requesting
    /// `amount_requested` (USD cents). `encoded_invoice`, `exchange_rate`
    /// and `expired_at` are filled in later by the Lightning monitor once
    /// the node has produced an invoice.
    pub async fn create(&self, account_id: i64, amount_requested: i64) -> AppResult<Invoice> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "INSERT INTO invoices (account_id, status, amount_requested, created_at, exchange_rate) \
             VALUES ($1, $2, $3, EXTRACT(EPOCH FROM now())::bigint, 0) \
             RETURNING invoice_id, account_id, status, encoded_invoice, created_at, \
                       amount_requested, exchange_rate, expired_at",
        )
        .bind(account_id)
        .bind(InvoiceStatus::Created)
        .bind(amount_requested)
        .fetch_one(self.pool())
        .await?;

        Ok(invoice)
    }

    /// Transition `invoice_id` to `pending`, stamping the encoded invoice,
    /// the exchange rate in effect, and the node-reported expiry. Rejects
    /// the transition if the row isn't currently `created`.
    pub async fn mark_pending(
        &self,
        invoice_id: i64,
        encoded_invoice: &str,
        exchange_rate: i64,
        expired_at: i64,
    ) -> AppResult<Invoice> {
        self.guard_transition(invoice_id, InvoiceStatus::Pending).await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            "UPDATE invoices \
             SET status = $2, encoded_invoice = $3, exchange_rate = $4, expired_at = $5 \
             WHERE invoice_id = $1 \
             RETURNING invoice_id, account_id, status, encoded_invoice, created_at, \
                       amount_requested, exchange_rate, expired_at",
        )
        .bind(invoice_id)
        .bind(InvoiceStatus::Pending)
        .bind(encoded_invoice)
        .bind(exchange_rate)
        .bind(expired_at)
        .fetch_one(self.pool())
        .await?;

        Ok(invoice)
    }

    /// Transition `invoice_id` to a terminal status (`paid`/`expired`).
    /// Rejects the transition if the row isn't currently `pending`.
    pub async fn finalize(&self, invoice_id: i64, status: InvoiceStatus) -> AppResult<Invoice> {
        self.guard_transition(invoice_id, status).await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            "UPDATE invoices SET status = $2 WHERE invoice_id = $1 \
             RETURNING invoice_id, account_id, status, encoded_invoice, created_at, \
                       amount_requested, exchange_rate, expired_at",
        )
        .bind(invoice_id)
        .bind(status)
        .fetch_one(self.pool())
        .await?;

        Ok(invoice)
    }
}
