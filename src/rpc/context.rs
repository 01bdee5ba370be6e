use std::sync::Arc;

use crate::db::repositories::AccountRepository;
use crate::feed::FeedRegistry;
use crate::invoice::InvoiceGenerator;
use crate::rpc::session::Session;
use crate::token::TokenService;

/// Everything a method handler needs, scoped to one connection. Built once
/// per accepted connection and shared by every worker in its pool.
#[derive(Clone)]
pub struct RpcContext {
    pub tokens: TokenService,
    pub accounts: AccountRepository,
    pub invoices: InvoiceGenerator,
    pub feeds: Arc<FeedRegistry>,
    pub session: Session,
}
