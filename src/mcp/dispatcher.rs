// ABOUTME: McpDispatcher - routes JSON-RPC 2.0 requests to the registry/envelope/prompt store
// ABOUTME: (spec §4.5). The single capability set {schema(), execute()} lives on ToolHandler;
// ABOUTME: this module only does method routing and response shaping.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR};
use super::prompts::PromptStore;
use crate::access_policy;
use crate::auth::Principal;
use crate::errors::AppError;
use crate::tools::{ToolEnvelope, ToolRegistry};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Protocol versions this dispatcher understands. `initialize` negotiates
/// down to the latest of these rather than failing the handshake when a
/// client requests something else (spec §9 supplement: permissive
/// negotiation recovered from the original server).
const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2024-10-07"];
const LATEST_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

/// Routes `initialize`, `tools/list`, `tools/call`, and `prompts/*` to the
/// registry/envelope/prompt store. One instance is shared across every
/// inbound JSON-RPC request.
pub struct McpDispatcher {
    registry: Arc<ToolRegistry>,
    envelope: Arc<ToolEnvelope>,
    prompts: Arc<PromptStore>,
}

impl McpDispatcher {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, envelope: Arc<ToolEnvelope>, prompts: Arc<PromptStore>) -> Self {
        Self {
            registry,
            envelope,
            prompts,
        }
    }

    /// Dispatch one already-parsed request. Parse failures are handled by
    /// the caller (the HTTP transport), since a request that fails to parse
    /// has no `id` to echo back.
    pub async fn handle(&self, request: JsonRpcRequest, principal: &Principal) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or_else(super::jsonrpc::default_request_id);
        match request.method.as_str() {
            "initialize" => Self::handle_initialize(id, request.params.as_ref()),
            "tools/list" => self.handle_tools_list(id, principal),
            "tools/call" => self.handle_tools_call(id, request.params, principal).await,
            "prompts/list" => self.handle_prompts_list(id),
            "prompts/get" => self.handle_prompts_get(id, request.params),
            "prompts/render" => self.handle_prompts_render(id, request.params),
            other => {
                warn!(method = other, "unknown MCP method");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("method not found: {other}"))
            }
        }
    }

    /// Parse a raw request body, returning `-32700` on malformed JSON-RPC
    /// (spec §4.5 "Parse failures return `-32700`").
    #[must_use]
    pub fn parse_request(body: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
        serde_json::from_str(body).map_err(|e| JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {e}")))
    }

    fn handle_initialize(id: Value, params: Option<&Value>) -> JsonRpcResponse {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let negotiated = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(LATEST_PROTOCOL_VERSION);

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": negotiated,
                "capabilities": {
                    "tools": {"listChanged": false},
                    "prompts": {"listChanged": false},
                },
                "serverInfo": {
                    "name": "sajha-server",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
    }

    fn handle_tools_list(&self, id: Value, principal: &Principal) -> JsonRpcResponse {
        let tools: Vec<_> = self
            .registry
            .list()
            .into_iter()
            .filter(|summary| access_policy::can_access(principal, &summary.name))
            .collect();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>, principal: &Principal) -> JsonRpcResponse {
        let Some(params) = params else {
            let err = AppError::invalid_argument("tools/call requires params", vec!["params".to_string()]);
            return JsonRpcResponse::from_app_error(id, &err);
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            let err = AppError::invalid_argument("tools/call params.name is required", vec!["name".to_string()]);
            return JsonRpcResponse::from_app_error(id, &err);
        };
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        match self.envelope.dispatch(name, principal, arguments).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::from_app_error(id, &err),
        }
    }

    fn handle_prompts_list(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::success(id, json!({ "prompts": self.prompts.list() }))
    }

    fn handle_prompts_get(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(name) = params.as_ref().and_then(|p| p.get("name")).and_then(Value::as_str) else {
            let err = AppError::invalid_argument("prompts/get params.name is required", vec!["name".to_string()]);
            return JsonRpcResponse::from_app_error(id, &err);
        };
        match self.prompts.get(name) {
            Ok(template) => JsonRpcResponse::success(id, serde_json::to_value(template).unwrap_or(Value::Null)),
            Err(err) => JsonRpcResponse::from_app_error(id, &err),
        }
    }

    fn handle_prompts_render(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            let err = AppError::invalid_argument("prompts/render requires params", vec!["params".to_string()]);
            return JsonRpcResponse::from_app_error(id, &err);
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            let err = AppError::invalid_argument("prompts/render params.name is required", vec!["name".to_string()]);
            return JsonRpcResponse::from_app_error(id, &err);
        };
        let arguments: HashMap<String, String> = params
            .get("arguments")
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        match self.prompts.render(name, &arguments) {
            Ok(text) => JsonRpcResponse::success(id, json!({ "text": text })),
            Err(err) => JsonRpcResponse::from_app_error(id, &err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{build_principal, PrincipalKind};
    use crate::tools::audit::AuditLog;
    use crate::tools::definition::{HandlerSpec, SourceKind, ToolDefinition, ToolMetadata};
    use crate::tools::handler::{Deadline, ToolHandler};
    use crate::tools::registry::ToolRegistry as Registry;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn execute(&self, arguments: Value, _deadline: Deadline) -> crate::errors::AppResult<Value> {
            Ok(arguments)
        }
    }

    fn dispatcher() -> (McpDispatcher, Arc<Registry>) {
        let registry = Arc::new(Registry::new("/tmp/unused"));
        registry
            .register(
                ToolDefinition {
                    name: "echo_tool".to_string(),
                    description: "echoes input".to_string(),
                    version: "1.0.0".to_string(),
                    enabled: true,
                    input_schema: json!({"type": "object"}),
                    output_schema: None,
                    metadata: ToolMetadata {
                        author: None,
                        category: None,
                        tags: Vec::new(),
                        requested_rate_limit: None,
                        cache_ttl_seconds: None,
                        source: SourceKind::Native,
                        requested_timeout_seconds: None,
                    },
                    handler_spec: HandlerSpec::Native,
                },
                Arc::new(Echo),
            )
            .unwrap();
        let envelope = Arc::new(ToolEnvelope::new(
            Arc::clone(&registry),
            Arc::new(access_policy::RateLimiter::new()),
            Arc::new(AuditLog::new(16)),
            Duration::from_secs(5),
            Duration::from_secs(30),
        ));
        let prompts = Arc::new(PromptStore::new());
        (McpDispatcher::new(Arc::clone(&registry), envelope, prompts), registry)
    }

    fn principal_allowing(tool: &str) -> Principal {
        build_principal("p1", PrincipalKind::ApiKey, HashSet::new(), HashSet::from([tool.to_string()]), Vec::new())
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let (dispatcher, _registry) = dispatcher();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "bogus/method".to_string(),
            params: None,
        };
        let response = dispatcher.handle(request, &principal_allowing("echo_tool")).await;
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_list_is_access_filtered() {
        let (dispatcher, _registry) = dispatcher();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "tools/list".to_string(),
            params: None,
        };
        let stranger = build_principal("stranger", PrincipalKind::ApiKey, HashSet::new(), HashSet::new(), Vec::new());
        let response = dispatcher.handle(request, &stranger).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 0);
    }

    #[tokio::test]
    async fn tools_call_dispatches_through_the_envelope() {
        let (dispatcher, _registry) = dispatcher();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "tools/call".to_string(),
            params: Some(json!({"name": "echo_tool", "arguments": {"x": 1}})),
        };
        let response = dispatcher.handle(request, &principal_allowing("echo_tool")).await;
        assert_eq!(response.result.unwrap(), json!({"x": 1}));
    }

    #[test]
    fn initialize_falls_back_to_latest_for_unknown_version() {
        let response = McpDispatcher::handle_initialize(json!(1), Some(&json!({"protocolVersion": "bogus"})));
        assert_eq!(response.result.unwrap()["protocolVersion"], LATEST_PROTOCOL_VERSION);
    }

    #[test]
    fn parse_request_rejects_malformed_json() {
        assert!(McpDispatcher::parse_request("not json").is_err());
    }
}
