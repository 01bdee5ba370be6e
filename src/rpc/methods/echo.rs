//! `echo` — liveness probe, callable with or without an authenticated
//! session (like `authenticate` itself, it carries no `check_auth` call).

use serde_json::Value;

use crate::error::rpc::JsonRpcResult;
use crate::rpc::context::RpcContext;
use crate::rpc::params;

pub async fn handle(_ctx: &RpcContext, params: Value) -> JsonRpcResult<Value> {
    let msg: Value = params::field(&params, "msg")?;
    Ok(msg)
}
