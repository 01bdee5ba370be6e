//! Per-connection runtime.
//!
//! One `ConnectionDeps` is built once at startup and cloned for every
//! accepted connection. `run` then owns that connection end to end: it
//! builds the connection's `Session`, `FeedRegistry` and `RpcContext`,
//! spawns a fixed pool of cooperating workers sharing one inbound queue,
//! and feeds every reply and every `feed` notification onto a single
//! outbound channel so the transport's single writer serializes them,
//! letting request replies interleave arbitrarily with feed notifications.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::config::ConnectionConfig;
use crate::db::repositories::{AccountRepository, InvoiceRepository};
use crate::exchange::ExchangeRateSource;
use crate::feed::FeedRegistry;
use crate::invoice::InvoiceGenerator;
use crate::pubsub::PubSub;
use crate::rpc::context::RpcContext;
use crate::rpc::dispatcher::handle_frame;
use crate::rpc::session::Session;
use crate::token::TokenService;

/// Everything needed to construct a connection's `RpcContext`. Built once
/// from `AppState` and cloned into every accepted connection; every field is
/// itself cheap to clone (wraps an `Arc` or a connection pool handle).
#[derive(Clone)]
pub struct ConnectionDeps {
    pub tokens: TokenService,
    pub accounts: AccountRepository,
    pub invoice_repo: InvoiceRepository,
    pub exchange: ExchangeRateSource,
    pub bus: PubSub,
    pub connection: ConnectionConfig,
}

/// Drives one connection: reads JSON-RPC text frames from `incoming` until
/// it closes, dispatches each across a worker pool of
/// `connection.worker_pool_size` tasks, and writes replies plus any active
/// feed's notifications onto `outgoing`. Returns once `incoming` closes
/// (the transport detected disconnection or an error), after every worker
/// has drained and every feed on the connection has been cancelled.
///
/// The worker pool bounds how many feeds can run concurrently: each
/// streaming feed occupies one worker's "slot" in spirit (it runs as its
/// own task, but backpressure from `max_feeds_allowed` should still leave
/// at least one worker free to answer `cancel_feed`/`echo` — see the
/// warning `main` logs if `max_feeds_allowed + 1 > worker_pool_size`).
pub async fn run(deps: ConnectionDeps, mut incoming: mpsc::UnboundedReceiver<String>, outgoing: mpsc::UnboundedSender<serde_json::Value>) {
    let session = Session::new();
    let wait_timeout = std::time::Duration::from_secs(deps.connection.invoice_wait_timeout_secs);
    let invoices = InvoiceGenerator::new(deps.invoice_repo, deps.exchange, deps.bus.clone(), wait_timeout);
    let tick_interval = std::time::Duration::from_millis(deps.connection.feed_tick_interval_ms);
    let feeds = Arc::new(FeedRegistry::new(
        deps.connection.max_feeds_allowed,
        deps.bus.clone(),
        session.clone(),
        outgoing.clone(),
        tick_interval,
    ));

    let ctx = RpcContext {
        tokens: deps.tokens,
        accounts: deps.accounts,
        invoices,
        feeds: feeds.clone(),
        session,
    };

    // The worker pool shares one queue: each worker locks it only for the
    // duration of a single `recv`, so at most one worker is ever waiting on
    // a given frame and frames are handed out in arrival order.
    let (work_tx, work_rx) = mpsc::unbounded_channel::<String>();
    let work_rx = Arc::new(AsyncMutex::new(work_rx));

    let mut workers = Vec::with_capacity(deps.connection.worker_pool_size.max(1));
    for _ in 0..deps.connection.worker_pool_size.max(1) {
        let ctx = ctx.clone();
        let work_rx = work_rx.clone();
        let outgoing = outgoing.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let raw = {
                    let mut rx = work_rx.lock().await;
                    rx.recv().await
                };
                let Some(raw) = raw else { break };

                if let Some(reply) = handle_frame(&ctx, &raw).await {
                    match serde_json::to_value(&reply) {
                        Ok(value) => {
                            if outgoing.send(value).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "failed to serialize rpc reply"),
                    }
                }
            }
        }));
    }

    while let Some(raw) = incoming.recv().await {
        if work_tx.send(raw).is_err() {
            break;
        }
    }

    // Dropping the sender lets every worker's `recv` return `None` once the
    // queue drains, so in-flight requests still get answered before we tear
    // the connection down.
    drop(work_tx);
    for worker in workers {
        let _ = worker.await;
    }

    feeds.cancel_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{AccountRepository, InvoiceRepository};
    use crate::exchange::ExchangeRateSource;
    use serde_json::Value;

    fn deps() -> ConnectionDeps {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool construction never touches the network");
        let pool = Arc::new(pool);

        ConnectionDeps {
            tokens: TokenService::new([0u8; 32]),
            accounts: AccountRepository::new(pool.clone()),
            invoice_repo: InvoiceRepository::new(pool),
            exchange: ExchangeRateSource::new(&crate::config::ExchangeConfig {
                rate_url: "http://localhost/unused".to_string(),
            }),
            bus: PubSub::new(),
            connection: ConnectionConfig {
                worker_pool_size: 2,
                invoice_wait_timeout_secs: 2,
                max_feeds_allowed: 1,
                feed_tick_interval_ms: 5,
            },
        }
    }

    #[tokio::test]
    async fn unauthenticated_create_invoice_is_replied_with_an_error() {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run(deps(), in_rx, out_tx));

        in_tx
            .send(r#"{"jsonrpc":"2.0","method":"create_invoice","params":{"amount_requested":100},"id":1}"#.to_string())
            .unwrap();
        let reply = out_rx.recv().await.expect("worker replies");
        assert_eq!(reply["error"]["code"], Value::from(-32600));

        drop(in_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn multiple_requests_are_each_answered_exactly_once() {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run(deps(), in_rx, out_tx));

        for id in 0..5 {
            in_tx
                .send(format!(r#"{{"jsonrpc":"2.0","method":"no_such","id":{id}}}"#))
                .unwrap();
        }

        let mut seen_ids = Vec::new();
        for _ in 0..5 {
            let reply = out_rx.recv().await.expect("worker replies");
            seen_ids.push(reply["id"].as_i64().unwrap());
        }
        seen_ids.sort();
        assert_eq!(seen_ids, vec![0, 1, 2, 3, 4]);

        drop(in_tx);
        handle.await.unwrap();
    }
}
