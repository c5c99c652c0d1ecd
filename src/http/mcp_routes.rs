// ABOUTME: HTTP transport for the MCP JSON-RPC dispatcher - a single POST endpoint (spec §4.5, §6).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::mcp::{JsonRpcResponse, McpDispatcher};
use crate::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new().route("/mcp", post(handle_mcp)).with_state(state)
}

/// Resolve the caller, parse the JSON-RPC body, and dispatch. A request that
/// fails to parse never reaches the dispatcher (it has no `id` to echo back),
/// so the parse error is shaped here directly.
async fn handle_mcp(State(state): State<Arc<AppState>>, headers: HeaderMap, body: String) -> Response {
    let principal = match state.auth.resolve_request(&headers) {
        Ok(principal) => principal,
        Err(err) => return Json(JsonRpcResponse::from_app_error(serde_json::Value::Null, &err)).into_response(),
    };

    match McpDispatcher::parse_request(&body) {
        Ok(request) => Json(state.mcp_dispatcher.handle(request, &principal).await).into_response(),
        Err(parse_error) => Json(parse_error).into_response(),
    }
}
