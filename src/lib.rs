pub mod api;
pub mod auth;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod exchange;
pub mod feed;
pub mod invoice;
pub mod lightning;
pub mod models;
pub mod pubsub;
pub mod rpc;
pub mod token;
pub mod websocket;

use std::sync::Arc;

use auth::{AuthService, PasswordHasher};
use config::Config;
use db::pool::DbPool;
use db::repositories::{AccountRepository, InvoiceRepository};
use exchange::ExchangeRateSource;
use pubsub::PubSub;
use token::TokenService;

/// Shared process state. Built once in `main`, cloned into every accepted
/// connection via `connection::ConnectionDeps`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DbPool,
    pub bus: PubSub,
    pub tokens: TokenService,
    pub accounts: AccountRepository,
    pub invoice_repo: InvoiceRepository,
    pub exchange: ExchangeRateSource,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let config = Arc::new(config);
        let bus = PubSub::new();
        let tokens = TokenService::from_config_secret(&config.security.jwt_secret);
        let accounts = AccountRepository::new(db.clone());
        let invoice_repo = InvoiceRepository::new(db.clone());
        let exchange = ExchangeRateSource::new(&config.exchange);
        let hasher = PasswordHasher::new(config.security.password_salt.clone());
        let auth = AuthService::new(accounts.clone(), hasher);

        Self {
            config,
            db,
            bus,
            tokens,
            accounts,
            invoice_repo,
            exchange,
            auth,
        }
    }

    /// Builds the dependency bundle handed to every accepted connection.
    pub fn connection_deps(&self) -> connection::ConnectionDeps {
        connection::ConnectionDeps {
            tokens: self.tokens.clone(),
            accounts: self.accounts.clone(),
            invoice_repo: self.invoice_repo.clone(),
            exchange: self.exchange.clone(),
            bus: self.bus.clone(),
            connection: self.config.connection.clone(),
        }
    }
}
