pub mod account_repo;
pub mod invoice_repo;

pub use account_repo::AccountRepository;
pub use invoice_repo::InvoiceRepository;
