//! Helpers for pulling typed arguments out of a JSON-RPC `params` value,
//! which per spec may be a positional array or a named object.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::rpc::JsonRpcError;

/// Extract a single named field, accepting either `{name: value}` or a
/// one-element positional array `[value]`.
pub fn field<T: DeserializeOwned>(params: &Value, name: &str) -> Result<T, JsonRpcError> {
    let raw = match params {
        Value::Object(map) => map.get(name).cloned().ok_or_else(|| missing(name))?,
        Value::Array(items) => items.first().cloned().ok_or_else(|| missing(name))?,
        _ => return Err(invalid_shape(name)),
    };

    serde_json::from_value(raw).map_err(|e| {
        JsonRpcError::invalid_params(
            format!("field {name} has the wrong type: {e}"),
            format!("Invalid value for {name}"),
        )
    })
}

fn missing(name: &str) -> JsonRpcError {
    JsonRpcError::invalid_params(
        format!("missing required param {name}"),
        format!("Missing required parameter: {name}"),
    )
}

fn invalid_shape(name: &str) -> JsonRpcError {
    JsonRpcError::invalid_params(
        format!("params must be an object or array to read {name}"),
        "Invalid params",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_named_object_field() {
        let params = json!({"msg": "hi"});
        let msg: String = field(&params, "msg").unwrap();
        assert_eq!(msg, "hi");
    }

    #[test]
    fn reads_positional_array_field() {
        let params = json!(["hi"]);
        let msg: String = field(&params, "msg").unwrap();
        assert_eq!(msg, "hi");
    }

    #[test]
    fn missing_field_is_invalid_params() {
        let params = json!({});
        let result: Result<String, _> = field(&params, "msg");
        assert_eq!(result.unwrap_err().code, crate::error::rpc::INVALID_PARAMS);
    }
}
