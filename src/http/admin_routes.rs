// ABOUTME: Admin REST surface (role `admin` required): tool lifecycle, config, reload,
// ABOUTME: API-key CRUD, user CRUD (spec §6). Every handler re-checks the admin role itself -
// ABOUTME: there is no separate middleware layer, matching the rest of this HTTP surface.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::auth::{build_principal, Principal, PrincipalKind, RateLimit};
use crate::errors::{AppError, AppResult};
use crate::tools::definition::ToolDefinition;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/admin/tools/reload", post(reload_tools))
        .route("/api/admin/tools/:name/enable", post(enable_tool))
        .route("/api/admin/tools/:name/disable", post(disable_tool))
        .route("/api/admin/tools/:name/delete", delete(delete_tool))
        .route("/api/admin/tools/:name/config", get(get_tool_config).post(set_tool_config))
        .route("/api/admin/apikeys", get(list_api_keys).post(create_api_key))
        .route("/api/admin/apikeys/:partial/enable", post(enable_api_key))
        .route("/api/admin/apikeys/:partial/disable", post(disable_api_key))
        .route("/api/admin/apikeys/:partial", delete(delete_api_key))
        .route("/api/admin/users", get(list_users).post(create_user))
        .route("/api/admin/users/:user_id", delete(delete_user))
        .with_state(state)
}

/// Resolve the caller and require the `admin` role, per spec §6's "Admin
/// (role `admin` required)" gate on every route in this module.
fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<Principal> {
    let principal = state.auth.resolve_request(headers)?;
    if !principal.is_admin() {
        return Err(AppError::access_denied(&principal.principal_id, "admin"));
    }
    Ok(principal)
}

async fn reload_tools(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let pool = state.sql_pool.clone();
    let count = state
        .registry
        .reload_all(move |def| crate::studio::build_handler(&def.handler_spec, Some(&pool)))?;
    Ok(Json(json!({ "reloaded": count })).into_response())
}

async fn enable_tool(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(name): Path<String>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    state.registry.set_enabled(&name, true)?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

async fn disable_tool(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(name): Path<String>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    state.registry.set_enabled(&name, false)?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

async fn delete_tool(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(name): Path<String>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    state.registry.unregister(&name)?;
    let path = state.registry.config_dir().join(format!("{name}.json"));
    std::fs::remove_file(path).ok();
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

async fn get_tool_config(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(name): Path<String>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let (definition, _handler) = state.registry.resolve(&name)?;
    Ok(Json(definition).into_response())
}

/// Replace a tool's configuration document wholesale: persist the new
/// definition, rebuild its handler, and re-register it under the write lock
/// (spec §4.1 "`Unregister` followed by `Register` with identical name is
/// the defined reload sequence").
async fn set_tool_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(definition): Json<ToolDefinition>,
) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    if definition.name != name {
        return Err(AppError::invalid_argument(
            "path name and document name must match",
            vec!["name".to_string()],
        ));
    }
    let pool = state.sql_pool.clone();
    let handler = crate::studio::build_handler(&definition.handler_spec, Some(&pool))?;
    crate::studio::persist_definition(state.registry.config_dir(), &definition)?;
    state.registry.unregister(&name).ok();
    state.registry.register(definition.clone(), handler)?;
    Ok(Json(definition).into_response())
}

#[derive(Serialize)]
struct ApiKeySummary {
    principal_id: String,
    key_prefix: String,
    enabled: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<crate::auth::ApiKey> for ApiKeySummary {
    fn from(key: crate::auth::ApiKey) -> Self {
        Self {
            principal_id: key.principal.principal_id,
            key_prefix: key.key_prefix,
            enabled: key.enabled,
            created_at: key.created_at,
            expires_at: key.expires_at,
        }
    }
}

async fn list_api_keys(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let mut summaries: Vec<ApiKeySummary> = state.auth.api_keys().list().into_iter().map(ApiKeySummary::from).collect();
    summaries.sort_by(|a, b| a.key_prefix.cmp(&b.key_prefix));
    Ok(Json(json!({ "api_keys": summaries })).into_response())
}

#[derive(Deserialize)]
struct CreateApiKeyRequest {
    principal_id: String,
    #[serde(default)]
    roles: HashSet<String>,
    #[serde(default)]
    allowed_tools: HashSet<String>,
    #[serde(default)]
    allowed_patterns: Vec<String>,
    rate_limit: Option<RateLimit>,
    #[serde(default)]
    is_trial: bool,
}

async fn create_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let mut principal = build_principal(
        request.principal_id,
        PrincipalKind::ApiKey,
        request.roles,
        request.allowed_tools,
        request.allowed_patterns,
    );
    principal.rate_limit = request.rate_limit;
    let (full_key, record) = state.auth.api_keys().create(principal, request.is_trial);
    Ok(Json(json!({
        "key": full_key,
        "key_prefix": record.key_prefix,
        "principal_id": record.principal.principal_id,
        "expires_at": record.expires_at,
    }))
    .into_response())
}

fn resolve_key_hash(state: &AppState, partial: &str) -> AppResult<String> {
    state
        .auth
        .api_keys()
        .find_by_partial(partial)
        .map(|record| record.key_hash)
        .ok_or_else(|| AppError::tool_not_found(partial))
}

async fn enable_api_key(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(partial): Path<String>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let hash = resolve_key_hash(&state, &partial)?;
    state.auth.api_keys().enable(&hash)?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

async fn disable_api_key(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(partial): Path<String>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let hash = resolve_key_hash(&state, &partial)?;
    state.auth.api_keys().disable(&hash)?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

async fn delete_api_key(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(partial): Path<String>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let hash = resolve_key_hash(&state, &partial)?;
    state.auth.api_keys().delete(&hash)?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

#[derive(Serialize)]
struct UserSummary {
    principal_id: String,
    roles: Vec<String>,
    tool_access_mode: crate::auth::ToolAccessMode,
}

async fn list_users(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let users: Vec<UserSummary> = state
        .auth
        .list_users()
        .into_iter()
        .map(|p| {
            let mut roles: Vec<String> = p.roles.into_iter().collect();
            roles.sort();
            UserSummary {
                principal_id: p.principal_id,
                roles,
                tool_access_mode: p.tool_access_mode,
            }
        })
        .collect();
    Ok(Json(json!({ "users": users })).into_response())
}

#[derive(Deserialize)]
struct CreateUserRequest {
    user_id: String,
    password: String,
    #[serde(default)]
    roles: HashSet<String>,
    #[serde(default)]
    allowed_tools: HashSet<String>,
    #[serde(default)]
    allowed_patterns: Vec<String>,
}

async fn create_user(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(request): Json<CreateUserRequest>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let principal = build_principal(
        request.user_id.clone(),
        PrincipalKind::User,
        request.roles,
        request.allowed_tools,
        request.allowed_patterns,
    );
    state.auth.create_user(&request.user_id, &request.password, principal)?;
    Ok(Json(json!({ "user_id": request.user_id })).into_response())
}

async fn delete_user(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(user_id): Path<String>) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    state.auth.delete_user(&user_id)?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    async fn admin_state() -> (Arc<AppState>, String) {
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
        let state = AppState::bootstrap(config).await.unwrap();
        let session = state
            .auth
            .authenticate_basic(&crate::auth::BasicCredentials {
                user_id: "admin".to_string(),
                password: "hunter2".to_string(),
            })
            .unwrap();
        (state, session.token)
    }

    fn admin_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn non_admin_is_denied() {
        let (state, _) = admin_state().await;
        state
            .auth
            .create_user("bob", "pw", Principal::admin("bob"))
            .unwrap();
        // override to a non-admin principal directly via build_principal round trip
        let principal = build_principal("bob2", PrincipalKind::User, HashSet::new(), HashSet::new(), Vec::new());
        state.auth.create_user("bob2", "pw", principal).unwrap();
        let session = state
            .auth
            .authenticate_basic(&crate::auth::BasicCredentials {
                user_id: "bob2".to_string(),
                password: "pw".to_string(),
            })
            .unwrap();
        let headers = admin_headers(&session.token);
        let err = reload_tools(State(Arc::clone(&state)), headers).await.unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn create_then_list_then_disable_api_key() {
        let (state, token) = admin_state().await;
        let headers = admin_headers(&token);
        let create_response = create_api_key(
            State(Arc::clone(&state)),
            headers.clone(),
            Json(CreateApiKeyRequest {
                principal_id: "svc".to_string(),
                roles: HashSet::new(),
                allowed_tools: HashSet::from(["echo".to_string()]),
                allowed_patterns: Vec::new(),
                rate_limit: None,
                is_trial: false,
            }),
        )
        .await
        .unwrap();
        assert_eq!(create_response.status(), axum::http::StatusCode::OK);

        let list_response = list_api_keys(State(Arc::clone(&state)), headers.clone()).await.unwrap();
        assert_eq!(list_response.status(), axum::http::StatusCode::OK);

        let prefix = state.auth.api_keys().list()[0].key_prefix.clone();
        let disable_response = disable_api_key(State(Arc::clone(&state)), headers, Path(prefix)).await.unwrap();
        assert_eq!(disable_response.status(), axum::http::StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn create_user_then_delete() {
        let (state, token) = admin_state().await;
        let headers = admin_headers(&token);
        create_user(
            State(Arc::clone(&state)),
            headers.clone(),
            Json(CreateUserRequest {
                user_id: "carol".to_string(),
                password: "pw".to_string(),
                roles: HashSet::new(),
                allowed_tools: HashSet::new(),
                allowed_patterns: Vec::new(),
            }),
        )
        .await
        .unwrap();
        let response = delete_user(State(Arc::clone(&state)), headers, Path("carol".to_string())).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);
    }
}
