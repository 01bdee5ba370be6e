//! Explicit method registration table, plus the frame-level validation
//! pipeline, checked in order: (1) JSON parses, (2) `jsonrpc == "2.0"`,
//! (3) `method` present and a registered handler exists.
//!
//! The registry is a plain match over known method names, so a typo in a
//! client request fails as `method not found` rather than silently
//! matching nothing.

use serde_json::Value;

use crate::error::rpc::{JsonRpcError, JsonRpcResult};
use crate::rpc::context::RpcContext;
use crate::rpc::envelope::{JsonRpcRequest, JsonRpcResponse};
use crate::rpc::methods;

pub async fn dispatch(ctx: &RpcContext, method: &str, params: Value) -> JsonRpcResult<Value> {
    match method {
        "authenticate" => methods::authenticate::handle(ctx, params).await,
        "echo" => methods::echo::handle(ctx, params).await,
        "select_feed" => methods::select_feed::handle(ctx, params).await,
        "cancel_feed" => methods::cancel_feed::handle(ctx, params).await,
        "create_invoice" => methods::create_invoice::handle(ctx, params).await,
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

/// Validate and dispatch one raw text frame. Returns `None` exactly when
/// the frame was a well-formed request with no `id` — a true notification,
/// which never gets a reply regardless of whether dispatch succeeds or
/// fails. Frames that fail before a notification can even be recognized as
/// such (unparseable JSON, the wrong `jsonrpc` version, a missing `method`)
/// are always replied to, using `id: null` when no `id` could be recovered
/// from the frame, matching JSON-RPC 2.0's convention for unidentifiable
/// errors.
pub async fn handle_frame(ctx: &RpcContext, raw: &str) -> Option<JsonRpcResponse> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                Value::Null,
                JsonRpcError::parse_error(e.to_string()).as_wire(),
            ))
        }
    };

    let id_hint = value.get("id").cloned().unwrap_or(Value::Null);

    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                id_hint,
                JsonRpcError::parse_error(e.to_string()).as_wire(),
            ))
        }
    };

    let reply_id = request.id.clone();

    if request.jsonrpc.as_deref() != Some("2.0") {
        let body =
            JsonRpcError::invalid_request("jsonrpc field must equal \"2.0\"", "Invalid Request").as_wire();
        return Some(JsonRpcResponse::error(reply_id.unwrap_or(Value::Null), body));
    }

    let Some(method) = request.method else {
        let body = JsonRpcError::invalid_request("method field is required", "Invalid Request").as_wire();
        return Some(JsonRpcResponse::error(reply_id.unwrap_or(Value::Null), body));
    };

    let result = dispatch(ctx, &method, request.params).await;

    match (result, reply_id) {
        (Ok(value), Some(id)) => Some(JsonRpcResponse::success(id, value)),
        (Err(err), Some(id)) => Some(JsonRpcResponse::error(id, err.as_wire())),
        (_, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{AccountRepository, InvoiceRepository};
    use crate::exchange::ExchangeRateSource;
    use crate::feed::FeedRegistry;
    use crate::invoice::InvoiceGenerator;
    use crate::pubsub::PubSub;
    use crate::rpc::session::Session;
    use crate::token::TokenService;
    use std::sync::Arc;
    use std::time::Duration;

    // `RpcContext` needs a live `DbPool`/`ExchangeRateSource`, neither of
    // which this unit test touches (every path below fails before reaching
    // a handler that uses them), so the repositories wrap a lazily-connected
    // pool that never actually dials out.
    fn test_ctx() -> RpcContext {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool construction never touches the network");
        let pool = Arc::new(pool);
        let bus = PubSub::new();
        let session = Session::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        RpcContext {
            tokens: TokenService::new([0u8; 32]),
            accounts: AccountRepository::new(pool.clone()),
            invoices: InvoiceGenerator::new(
                InvoiceRepository::new(pool),
                ExchangeRateSource::new(&crate::config::ExchangeConfig {
                    rate_url: "http://localhost/unused".to_string(),
                }),
                bus.clone(),
                Duration::from_secs(1),
            ),
            feeds: Arc::new(FeedRegistry::new(1, bus, session.clone(), tx, Duration::from_millis(10))),
            session,
        }
    }

    #[tokio::test]
    async fn malformed_json_is_parse_error_with_null_id() {
        let ctx = test_ctx();
        let reply = handle_frame(&ctx, "{not json").await.unwrap();
        assert_eq!(reply.error.unwrap().code, crate::error::rpc::PARSE_ERROR);
        assert_eq!(reply.id, Value::Null);
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_invalid_request() {
        let ctx = test_ctx();
        let reply = handle_frame(&ctx, r#"{"jsonrpc":"1.0","method":"echo","id":1}"#)
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, crate::error::rpc::INVALID_REQUEST);
        assert_eq!(reply.id, Value::from(1));
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let ctx = test_ctx();
        let reply = handle_frame(&ctx, r#"{"jsonrpc":"2.0","method":"no_such","id":9}"#)
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, crate::error::rpc::METHOD_NOT_FOUND);
        assert_eq!(reply.id, Value::from(9));
    }

    #[tokio::test]
    async fn echo_succeeds_without_authentication() {
        let ctx = test_ctx();
        let reply = handle_frame(&ctx, r#"{"jsonrpc":"2.0","method":"echo","params":["hi"],"id":1}"#)
            .await
            .unwrap();
        assert_eq!(reply.result.unwrap(), Value::from("hi"));
    }

    #[tokio::test]
    async fn notification_that_fails_dispatch_still_gets_no_reply() {
        let ctx = test_ctx();
        // Unauthenticated `cancel_feed` fails, but since there is no `id`
        // it is a true notification and is never replied to, even on error.
        let reply = handle_frame(&ctx, r#"{"jsonrpc":"2.0","method":"cancel_feed","params":{"feed_id":1}}"#).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn unauthenticated_request_with_id_is_replied_to() {
        let ctx = test_ctx();
        let reply = handle_frame(
            &ctx,
            r#"{"jsonrpc":"2.0","method":"cancel_feed","params":{"feed_id":1},"id":1}"#,
        )
        .await
        .unwrap();
        assert_eq!(reply.error.unwrap().code, crate::error::rpc::INVALID_REQUEST);
    }
}
