use serde_json::{json, Value};

use crate::error::rpc::JsonRpcResult;
use crate::rpc::context::RpcContext;
use crate::rpc::params;

pub async fn handle(ctx: &RpcContext, params: Value) -> JsonRpcResult<Value> {
    ctx.session.check_auth()?;
    let feed_id: u64 = params::field(&params, "feed_id")?;

    ctx.feeds.cancel_feed(feed_id)?;
    Ok(json!("ok"))
}
