//! Client for the Lightning node's local JSON-RPC socket.
//!
//! Newline-delimited JSON-RPC 2.0 requests over a Unix domain stream
//! socket, a fresh connection per call, and a single retry after a fixed
//! backoff when the node itself returns a JSON-RPC error. Only the two
//! methods this gateway needs are exposed: `invoice` and `invoice_status`
//! (backed by the node's `listinvoices`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum LightningClientError {
    #[error("failed to connect to lightning node socket: {0}")]
    Connect(#[source] std::io::Error),
    #[error("i/o error talking to lightning node: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed response from lightning node: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("lightning node returned an error: {0}")]
    NodeError(String),
    #[error("lightning node reported a warning, treated as a hard failure: {0:?}")]
    Warning(Vec<(String, Value)>),
    #[error("lightning node returned an unexpected shape for {method}: {detail}")]
    UnexpectedShape { method: &'static str, detail: String },
}

/// The outcome of a successful `invoice` call.
#[derive(Debug, Clone)]
pub struct NodeInvoice {
    pub bolt11: String,
    pub expires_at: i64,
}

/// `listinvoices`' per-invoice status, matching the Lightning spec's three
/// terminal-or-waiting states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeInvoiceStatus {
    Unpaid,
    Paid,
    Expired,
}

/// Connects to the node's Unix-domain JSON-RPC socket on every call — the
/// node is local and connection setup is cheap compared to invoice
/// settlement latency.
#[derive(Clone)]
pub struct LightningClient {
    socket_path: String,
}

impl LightningClient {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub async fn invoice(
        &self,
        label: &str,
        msatoshi: i64,
        description: &str,
        expiry: &str,
    ) -> Result<NodeInvoice, LightningClientError> {
        assert!(description.len() < 100, "invoice description must be under 100 chars");

        let params = json!({
            "msatoshi": msatoshi,
            "label": label,
            "description": description,
            "expiry": expiry,
        });

        let result = self.call_with_retry("invoice", params).await?;

        let warnings: Vec<(String, Value)> = result
            .as_object()
            .into_iter()
            .flat_map(|obj| obj.iter())
            .filter(|(key, _)| key.starts_with("warning_"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !warnings.is_empty() {
            return Err(LightningClientError::Warning(warnings));
        }

        let bolt11 = result
            .get("bolt11")
            .and_then(Value::as_str)
            .ok_or_else(|| LightningClientError::UnexpectedShape {
                method: "invoice",
                detail: "missing bolt11".to_string(),
            })?
            .to_string();
        let expires_at = result
            .get("expires_at")
            .and_then(Value::as_i64)
            .ok_or_else(|| LightningClientError::UnexpectedShape {
                method: "invoice",
                detail: "missing expires_at".to_string(),
            })?;

        Ok(NodeInvoice { bolt11, expires_at })
    }

    pub async fn invoice_status(
        &self,
        label: &str,
    ) -> Result<NodeInvoiceStatus, LightningClientError> {
        let result = self.call_with_retry("listinvoices", json!({ "label": label })).await?;

        let invoices = result
            .get("invoices")
            .and_then(Value::as_array)
            .ok_or_else(|| LightningClientError::UnexpectedShape {
                method: "listinvoices",
                detail: "missing invoices array".to_string(),
            })?;
        if invoices.len() != 1 {
            return Err(LightningClientError::UnexpectedShape {
                method: "listinvoices",
                detail: format!("expected exactly 1 invoice for {label}, got {}", invoices.len()),
            });
        }

        let status: NodeInvoiceStatus =
            serde_json::from_value(invoices[0]["status"].clone())?;
        Ok(status)
    }

    /// One attempt, then (on a JSON-RPC-level error only, not a transport
    /// failure) a single retry after `RETRY_BACKOFF`.
    async fn call_with_retry(&self, method: &str, params: Value) -> Result<Value, LightningClientError> {
        match self.call(method, params.clone()).await {
            Ok(result) => Ok(result),
            Err(LightningClientError::NodeError(e)) => {
                tracing::warn!(method, error = %e, "lightning node call failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.call(method, params).await
            }
            Err(e) => Err(e),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, LightningClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(LightningClientError::Connect)?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 0,
        };
        let mut msg = serde_json::to_vec(&request)?;
        msg.push(b'\n');
        write_half.write_all(&msg).await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let response: RpcResponse = serde_json::from_str(&line)?;

        if let Some(error) = response.error {
            return Err(LightningClientError::NodeError(error.to_string()));
        }

        response.result.ok_or_else(|| LightningClientError::UnexpectedShape {
            method: "<rpc>",
            detail: "response had neither result nor error".to_string(),
        })
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<Value>,
}
