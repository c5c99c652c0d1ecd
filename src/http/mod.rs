// ABOUTME: HTTP surface - the MCP JSON-RPC endpoint plus the REST surface that complements it
// ABOUTME: (spec §6). Each submodule is a thin `Router` factory over the same `AppState`.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod admin_routes;
pub mod auth_routes;
pub mod mcp_routes;
pub mod tool_routes;

use crate::AppState;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Compose the full application router: one sub-router per concern, merged
/// under a shared `AppState`, wrapped in the standard tower-http layer stack
/// (trace, body-size limit, request timeout, permissive CORS).
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(mcp_routes::routes(Arc::clone(&state)))
        .merge(auth_routes::routes(Arc::clone(&state)))
        .merge(tool_routes::routes(Arc::clone(&state)))
        .merge(admin_routes::routes(Arc::clone(&state)))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024))
        .layer(CorsLayer::permissive())
}
