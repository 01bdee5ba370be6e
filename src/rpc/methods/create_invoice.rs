use serde_json::Value;

use crate::error::rpc::JsonRpcResult;
use crate::rpc::context::RpcContext;
use crate::rpc::params;

pub async fn handle(ctx: &RpcContext, params: Value) -> JsonRpcResult<Value> {
    let account_id = ctx.session.check_auth()?;
    let amount_requested: i64 = params::field(&params, "amount_requested")?;

    let summary = ctx
        .invoices
        .generate(account_id, amount_requested)
        .await
        .map_err(|e| match e {
            crate::invoice::InvoiceGenerationError::TimedOut => {
                crate::error::rpc::JsonRpcError::timed_out("waiting for pending invoice timed out")
            }
            other => crate::error::rpc::JsonRpcError::internal(other.to_string()),
        })?;

    serde_json::to_value(summary)
        .map_err(|e| crate::error::rpc::JsonRpcError::internal(e.to_string()))
}
