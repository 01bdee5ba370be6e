pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod methods;
pub mod params;
pub mod session;

pub use context::RpcContext;
pub use dispatcher::handle_frame;
pub use envelope::{FeedNotification, JsonRpcRequest, JsonRpcResponse};
pub use session::Session;
