//! `authenticate` — the only method callable before a session exists.
//!
//! Verifies the token, rejects an already-expired `exp`, looks the subject
//! up by username, and stamps the session. A later call with a
//! later-expiring token is accepted and simply overwrites the session;
//! re-authentication is not rejected.

use serde_json::{json, Value};

use crate::error::rpc::{JsonRpcError, JsonRpcResult};
use crate::rpc::context::RpcContext;
use crate::rpc::params;

pub async fn handle(ctx: &RpcContext, params: Value) -> JsonRpcResult<Value> {
    let jwt_token: String = params::field(&params, "jwt_token")?;

    let payload = ctx.tokens.verify(&jwt_token).map_err(|_| JsonRpcError::invalid_token())?;

    let now = chrono::Utc::now().timestamp();
    if payload.exp < now {
        return Err(JsonRpcError::invalid_request(
            format!("token expired at {}", payload.exp),
            "Token has expired",
        ));
    }

    let account = ctx
        .accounts
        .find_by_username(&payload.sub)
        .await
        .map_err(|e| JsonRpcError::internal(e.to_string()))?
        .ok_or_else(|| JsonRpcError::invalid_request("no account for token subject", "Invalid JWT Token"))?;

    ctx.session.set_authenticated(account.account_id, payload.exp);
    Ok(json!("ok"))
}
