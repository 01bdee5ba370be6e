pub mod client;
pub mod monitor;

pub use client::{LightningClient, LightningClientError, NodeInvoice, NodeInvoiceStatus};
pub use monitor::LightningMonitor;
