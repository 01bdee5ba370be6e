use std::net::SocketAddr;

use ln_merchant_gateway::{
    api::create_router,
    api::middleware::logging::init_tracing,
    config::Config,
    db::{create_pool, repositories::InvoiceRepository, run_migrations},
    lightning::LightningMonitor,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    tracing::info!("Starting Lightning payment gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    tracing::info!("Configuration loaded successfully");

    if config.connection.max_feeds_allowed + 1 > config.connection.worker_pool_size {
        tracing::warn!(
            max_feeds_allowed = config.connection.max_feeds_allowed,
            worker_pool_size = config.connection.worker_pool_size,
            "max_feeds_allowed + 1 exceeds worker_pool_size: a connection with every feed slot \
             in use may leave no worker free to answer cancel_feed or echo promptly",
        );
    }

    let db_pool = create_pool(&config.database).await?;

    tracing::info!("Database connection pool created");

    run_migrations(&db_pool).await?;

    tracing::info!("Database migrations completed");

    let state = AppState::new(config.clone(), db_pool.clone());

    let monitor = LightningMonitor::new(
        &config.lightning,
        InvoiceRepository::new(db_pool.clone()),
        state.bus.clone(),
    );
    monitor.start();

    tracing::info!("Lightning monitor started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("WebSocket JSON-RPC: ws://{}/ws/", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Payment gateway is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor.stop();

    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
