// ABOUTME: JSON-RPC 2.0 envelope types shared by every MCP method (spec §4.5, §6).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32_700;
pub const METHOD_NOT_FOUND: i64 = -32_601;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

fn default_version() -> String {
    "2.0".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Map a classified application error into a JSON-RPC error, preserving
    /// the classification in `data.kind` (spec §4.5: "preserving the
    /// classification in `data.kind`").
    #[must_use]
    pub fn from_app_error(id: Value, error: &crate::errors::AppError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: error.kind.jsonrpc_code(),
                message: error.message.clone(),
                data: Some(serde_json::json!({"kind": error.kind, "field_paths": error.field_paths})),
            }),
        }
    }
}

pub fn default_request_id() -> Value {
    Value::Number(serde_json::Number::from(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_a_request_defaults_jsonrpc_version() {
        let request: JsonRpcRequest = serde_json::from_str(r#"{"id": 1, "method": "initialize"}"#).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
    }

    #[test]
    fn app_error_mapping_preserves_kind_in_data() {
        let error = crate::errors::AppError::tool_not_found("missing");
        let response = JsonRpcResponse::from_app_error(Value::Number(1.into()), &error);
        let data = response.error.unwrap().data.unwrap();
        assert_eq!(data["kind"], "tool_not_found");
    }
}
