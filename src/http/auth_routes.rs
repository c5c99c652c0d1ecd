// ABOUTME: Authentication REST endpoints - basic-credential login and bearer token validation
// ABOUTME: (spec §6, §4.3).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::auth::BasicCredentials;
use crate::errors::AppError;
use crate::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/token", post(issue_token))
        .route("/api/auth/validate", post(validate_token))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
    token_type: &'static str,
    principal_id: String,
}

async fn issue_token(State(state): State<Arc<AppState>>, Json(creds): Json<BasicCredentials>) -> Result<Response, AppError> {
    let session = state.auth.authenticate_basic(&creds)?;
    Ok(Json(TokenResponse {
        token: session.token,
        token_type: "Bearer",
        principal_id: session.principal.principal_id,
    })
    .into_response())
}

#[derive(Serialize)]
struct ValidateResponse {
    authenticated: bool,
    principal_id: String,
    roles: Vec<String>,
}

async fn validate_token(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, AppError> {
    let principal = state.auth.resolve_request(&headers)?;
    let mut roles: Vec<String> = principal.roles.iter().cloned().collect();
    roles.sort();
    Ok(Json(ValidateResponse {
        authenticated: true,
        principal_id: principal.principal_id,
        roles,
    })
    .into_response())
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            state.auth.logout(token);
        }
    }
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use crate::config::ServerConfig;

    async fn state() -> Arc<AppState> {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            tools_config_dir: dir.path().join("tools"),
            scripts_dir: dir.path().join("scripts"),
            auth_store_dir: dir.path().join("auth"),
            olap_config_dir: dir.path().join("olap"),
            database_url: "sqlite::memory:".to_string(),
            admin_password: Some("hunter2".to_string()),
            ..ServerConfig::from_env()
        };
        AppState::bootstrap(config).await.unwrap()
    }

    #[tokio::test]
    async fn issue_token_then_validate_round_trips() {
        let state = state().await;
        state.auth.create_user("alice", "pw", Principal::admin("alice")).unwrap();
        let response = issue_token(
            State(Arc::clone(&state)),
            Json(BasicCredentials {
                user_id: "alice".to_string(),
                password: "pw".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
