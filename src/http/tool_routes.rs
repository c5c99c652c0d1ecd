// ABOUTME: REST surface for tool discovery and execution, mirroring the MCP tools/* methods
// ABOUTME: for callers that prefer plain HTTP over JSON-RPC (spec §6).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::access_policy;
use crate::errors::AppError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tools/list", get(list_tools))
        .route("/api/tools/execute", post(execute_tool))
        .route("/api/tools/:name/schema", get(tool_schema))
        .with_state(state)
}

async fn list_tools(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, AppError> {
    let principal = state.auth.resolve_request(&headers)?;
    let tools: Vec<_> = state
        .registry
        .list()
        .into_iter()
        .filter(|summary| access_policy::can_access(&principal, &summary.name))
        .collect();
    Ok(Json(json!({ "tools": tools })).into_response())
}

#[derive(Deserialize)]
struct ExecuteRequest {
    tool: String,
    #[serde(default)]
    arguments: Value,
}

async fn execute_tool(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ExecuteRequest>,
) -> Result<Response, AppError> {
    let principal = state.auth.resolve_request(&headers)?;
    let result = state.envelope.dispatch(&request.tool, &principal, request.arguments).await?;
    Ok(Json(json!({ "result": result })).into_response())
}

async fn tool_schema(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(name): Path<String>) -> Result<Response, AppError> {
    let principal = state.auth.resolve_request(&headers)?;
    if !access_policy::can_access(&principal, &name) {
        return Err(AppError::access_denied(&principal.principal_id, &name));
    }
    let (definition, _handler) = state.registry.resolve(&name)?;
    Ok(Json(json!({
        "name": definition.name,
        "description": definition.description,
        "input_schema": definition.input_schema,
        "output_schema": definition.output_schema,
    }))
    .into_response())
}
