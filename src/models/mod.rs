pub mod account;
pub mod invoice;

pub use account::Account;
pub use invoice::{Invoice, InvoiceStatus};
