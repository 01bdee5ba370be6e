use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle status of an `Invoice`. Advances only `created -> pending ->
/// {expired, paid}`; never reverts once `pending` is reached, and never
/// changes once terminal (`expired`/`paid`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Created,
    Pending,
    Expired,
    Paid,
}

impl InvoiceStatus {
    /// Whether a transition from `self` to `next` is permitted by the
    /// partial order `created -> pending -> {expired, paid}`.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Created, InvoiceStatus::Pending)
                | (InvoiceStatus::Pending, InvoiceStatus::Paid)
                | (InvoiceStatus::Pending, InvoiceStatus::Expired)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Expired)
    }
}

/// An instance of a merchant's USD-denominated Lightning payment request.
///
/// Invariant: `encoded_invoice` and `expired_at` are `Some` exactly when
/// `status >= Pending`; `account_id` is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: i64,
    pub account_id: i64,
    pub status: InvoiceStatus,
    pub encoded_invoice: Option<String>,
    pub created_at: i64,
    pub amount_requested: i64,
    pub exchange_rate: i64,
    pub expired_at: Option<i64>,
}

/// The `create_invoice` RPC result shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub invoice_id: i64,
    pub encoded_invoice: String,
    pub amount_requested: i64,
    pub exchange_rate: i64,
    pub expired_at: i64,
}

impl Invoice {
    /// Project a `Pending`-or-later invoice into the wire summary. Panics
    /// if called on a `Created` row — callers must only invoke this after
    /// observing the `/invoice/pending` snapshot.
    pub fn into_summary(self) -> InvoiceSummary {
        InvoiceSummary {
            invoice_id: self.invoice_id,
            encoded_invoice: self.encoded_invoice.expect("invoice not yet pending"),
            amount_requested: self.amount_requested,
            exchange_rate: self.exchange_rate,
            expired_at: self.expired_at.expect("invoice not yet pending"),
        }
    }
}

/// Payload carried on the `/invoice/finalized` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedInvoiceEvent {
    pub invoice_id: i64,
    pub account_id: i64,
    pub status: InvoiceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_partial_order() {
        assert!(InvoiceStatus::Created.can_transition_to(InvoiceStatus::Pending));
        assert!(InvoiceStatus::Pending.can_transition_to(InvoiceStatus::Paid));
        assert!(InvoiceStatus::Pending.can_transition_to(InvoiceStatus::Expired));

        assert!(!InvoiceStatus::Created.can_transition_to(InvoiceStatus::Paid));
        assert!(!InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Pending));
        assert!(!InvoiceStatus::Expired.can_transition_to(InvoiceStatus::Paid));
        assert!(!InvoiceStatus::Pending.can_transition_to(InvoiceStatus::Created));
    }

    #[test]
    fn terminal_statuses() {
        assert!(InvoiceStatus::Paid.is_terminal());
        assert!(InvoiceStatus::Expired.is_terminal());
        assert!(!InvoiceStatus::Created.is_terminal());
        assert!(!InvoiceStatus::Pending.is_terminal());
    }
}
