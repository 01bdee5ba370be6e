use serde_json::{json, Value};

use crate::error::rpc::JsonRpcResult;
use crate::rpc::context::RpcContext;
use crate::rpc::params;

pub async fn handle(ctx: &RpcContext, params: Value) -> JsonRpcResult<Value> {
    let account_id = ctx.session.check_auth()?;
    let feed_type: String = params::field(&params, "feed_type")?;

    let feed_id = ctx.feeds.select_feed(account_id, &feed_type).await?;
    Ok(json!(feed_id))
}
