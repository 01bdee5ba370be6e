//! JSON-RPC 2.0 wire envelope. A request with no `id` field is a
//! notification: it is still dispatched but never gets a reply. `id` is
//! therefore `Option<Value>` rather than `Value`, so a missing `id` key
//! (`None`) is distinguishable from an explicit `"id": null` (`Some(Null)`),
//! which JSON-RPC clients sometimes send and which does get a reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::rpc::JsonRpcErrorBody;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorBody>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, error: JsonRpcErrorBody) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// A server-initiated `feed` notification. Never answered; has no `id`.
#[derive(Debug, Clone, Serialize)]
pub struct FeedNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: FeedParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedParams {
    pub feed_id: u64,
    pub feed: Vec<Value>,
}

impl FeedNotification {
    pub fn new(feed_id: u64, items: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "feed",
            params: FeedParams {
                feed_id,
                feed: items,
            },
        }
    }
}
