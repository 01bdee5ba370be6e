use serde::Serialize;
use thiserror::Error;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Error raised while handling one JSON-RPC request.
///
/// `message_to_client` is the only text ever placed on the wire; the
/// `Display` impl (used for logging) may carry internal detail that must
/// never reach the client.
#[derive(Error, Debug)]
#[error("{internal}")]
pub struct JsonRpcError {
    pub code: i64,
    internal: String,
    message_to_client: String,
}

impl JsonRpcError {
    pub fn new(code: i64, internal: impl Into<String>, message_to_client: impl Into<String>) -> Self {
        Self {
            code,
            internal: internal.into(),
            message_to_client: message_to_client.into(),
        }
    }

    pub fn parse_error(internal: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, internal, "Failed to parse the JSON request")
    }

    pub fn invalid_request(internal: impl Into<String>, message_to_client: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, internal, message_to_client)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            METHOD_NOT_FOUND,
            format!("method not found: {method}"),
            "Method not found",
        )
    }

    pub fn invalid_params(internal: impl Into<String>, message_to_client: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, internal, message_to_client)
    }

    pub fn internal(internal: impl Into<String>) -> Self {
        let internal = internal.into();
        Self::new(INTERNAL_ERROR, internal, "An internal error occurred")
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            INVALID_REQUEST,
            "session is not authenticated or has expired",
            "Please authenticate",
        )
    }

    pub fn invalid_token() -> Self {
        Self::new(INVALID_REQUEST, "malformed or badly signed token", "Invalid token")
    }

    pub fn timed_out(internal: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, internal, "Waiting timed out")
    }

    pub fn as_wire(&self) -> JsonRpcErrorBody {
        JsonRpcErrorBody {
            code: self.code,
            message: self.message_to_client.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
}

pub type JsonRpcResult<T> = Result<T, JsonRpcError>;
