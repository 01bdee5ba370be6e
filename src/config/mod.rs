use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub lightning: LightningConfig,
    pub exchange: ExchangeConfig,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 32-byte secret used to sign/verify session tokens (HMAC-SHA256).
    pub jwt_secret: String,
    /// Fixed per-deployment salt prepended to passwords before hashing.
    pub password_salt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LightningConfig {
    /// Path to the Lightning node's local Unix-domain JSON-RPC socket.
    pub socket_path: String,
    /// Prefix used when building invoice labels: "<prefix>-<account_id>-<invoice_id>".
    pub label_prefix: String,
    /// How often the monitor polls pending invoices for a terminal status.
    pub poll_interval_ms: u64,
    /// Expiry passed to the node's `invoice` call, e.g. "10m".
    pub invoice_expiry: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// HTTP GET endpoint returning a scalar BTC-per-USD price.
    pub rate_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Number of cooperating workers spawned per accepted connection.
    pub worker_pool_size: usize,
    /// At most this many seconds waiting for the invoice generator rendezvous.
    pub invoice_wait_timeout_secs: u64,
    /// Max concurrent feeds per connection.
    pub max_feeds_allowed: usize,
    /// How long a feed's streaming loop sleeps between batching ticks.
    /// The batch size itself is fixed at `feed::FEED_MAX_BATCH` per spec.
    pub feed_tick_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("lightning.label_prefix", "OpenLightningWallet")?
            .set_default("lightning.poll_interval_ms", 500)?
            .set_default("lightning.invoice_expiry", "10m")?
            .set_default("connection.worker_pool_size", 4)?
            .set_default("connection.invoice_wait_timeout_secs", 5)?
            .set_default("connection.max_feeds_allowed", 1)?
            .set_default("connection.feed_tick_interval_ms", 50)?
            .add_source(config::Environment::default().separator("_").try_parsing(true))
            .build()?;

        // Manual construction due to environment variable naming
        Ok(Config {
            server: ServerConfig {
                host: config.get_string("host").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: config.get_int("port").unwrap_or(8080) as u16,
            },
            database: DatabaseConfig {
                url: config.get_string("database.url")?,
                max_connections: config.get_int("database.max_connections").unwrap_or(10) as u32,
            },
            security: SecurityConfig {
                jwt_secret: config.get_string("jwt.secret")?,
                password_salt: config.get_string("password.salt")?,
            },
            lightning: LightningConfig {
                socket_path: config.get_string("lightning.socket.path")?,
                label_prefix: config
                    .get_string("lightning.label.prefix")
                    .unwrap_or_else(|_| "OpenLightningWallet".to_string()),
                poll_interval_ms: config.get_int("lightning.poll.interval.ms").unwrap_or(500) as u64,
                invoice_expiry: config
                    .get_string("lightning.invoice.expiry")
                    .unwrap_or_else(|_| "10m".to_string()),
            },
            exchange: ExchangeConfig {
                rate_url: config.get_string("exchange.rate.url")?,
            },
            connection: ConnectionConfig {
                worker_pool_size: config.get_int("connection.worker.pool.size").unwrap_or(4) as usize,
                invoice_wait_timeout_secs: config
                    .get_int("connection.invoice.wait.timeout.secs")
                    .unwrap_or(5) as u64,
                max_feeds_allowed: config.get_int("connection.max.feeds.allowed").unwrap_or(1) as usize,
                feed_tick_interval_ms: config
                    .get_int("connection.feed.tick.interval.ms")
                    .unwrap_or(50) as u64,
            },
        })
    }
}

pub type SharedConfig = Arc<Config>;
