// ABOUTME: SAJHA - multi-tenant tool registry, MCP dispatcher and OLAP analytics engine.
// ABOUTME: Wires the registry, envelope, auth layer, Studio generators and OLAP engine together.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![forbid(unsafe_code)]

//! # SAJHA Server
//!
//! A multi-tenant server that exposes a catalog of executable tools through
//! a uniform Model Context Protocol (MCP) JSON-RPC interface and a
//! companion REST surface. Administrators register tools at runtime from
//! declarative configurations; callers invoke them under access control
//! with quota enforcement; every execution is recorded for audit.
//!
//! ## Architecture
//!
//! - [`tools`] - the registry/dispatch core: `ToolRegistry`, `ToolEnvelope`.
//! - [`auth`] / [`access_policy`] - session and API-key based authentication,
//!   allow-list/regex authorization, per-principal rate limiting.
//! - [`studio`] - declarative tool generators (REST, SQL, script, report
//!   export, DAX, document store) that emit registry-loadable handlers.
//! - [`olap`] - the analytical semantic layer and query builders.
//! - [`mcp`] - the JSON-RPC 2.0 dispatcher.
//! - [`http`] - the REST surface that complements MCP.

pub mod access_policy;
pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod olap;
pub mod security;
pub mod studio;
pub mod tools;

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::mcp::{McpDispatcher, PromptStore};
use crate::olap::OlapExecutor;
use crate::tools::{AuditLog, ToolEnvelope, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything one inbound request (HTTP or MCP) needs, shared behind `Arc`
/// across every handler (spec §5 concurrency model: the registry, auth
/// tables and rate limiter are each independently lock-guarded; this struct
/// only groups their handles).
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub envelope: Arc<ToolEnvelope>,
    pub auth: Arc<AuthManager>,
    pub rate_limiter: Arc<access_policy::RateLimiter>,
    pub audit_log: Arc<AuditLog>,
    pub prompts: Arc<PromptStore>,
    pub mcp_dispatcher: Arc<McpDispatcher>,
    pub olap: Arc<OlapExecutor>,
    pub sql_pool: sqlx::SqlitePool,
    pub config: ServerConfig,
}

impl AppState {
    /// Assemble the full application from configuration: connect the
    /// shared SQLite pool, seed the bootstrap admin account, load every
    /// tool document under `config.tools_config_dir`, and wire the MCP
    /// dispatcher on top (spec §9 "config directory as process-wide state").
    ///
    /// # Errors
    /// Returns `Internal` if the database pool cannot be established.
    pub async fn bootstrap(config: ServerConfig) -> AppResult<Arc<Self>> {
        std::fs::create_dir_all(&config.tools_config_dir).ok();
        std::fs::create_dir_all(&config.scripts_dir).ok();
        std::fs::create_dir_all(&config.auth_store_dir).ok();
        std::fs::create_dir_all(&config.olap_config_dir).ok();

        let sql_pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&config.database_url)
            .await
            .map_err(|e| AppError::internal(format!("failed to connect to {}: {e}", config.database_url)))?;

        let registry = Arc::new(ToolRegistry::new(config.tools_config_dir.clone()));
        let pool_for_reload = sql_pool.clone();
        match registry.reload_all(move |def| crate::studio::build_handler(&def.handler_spec, Some(&pool_for_reload))) {
            Ok(count) => info!(count, "loaded tool registry from configuration directory"),
            Err(err) => warn!(error = %err.message, "initial tool registry load failed, starting with an empty registry"),
        }

        let auth = Arc::new(AuthManager::new(config.session_timeout_hours));
        seed_admin(&auth, &config);

        let rate_limiter = Arc::new(access_policy::RateLimiter::new());
        let audit_log = Arc::new(AuditLog::new(4096));
        let envelope = Arc::new(ToolEnvelope::new(
            Arc::clone(&registry),
            Arc::clone(&rate_limiter),
            Arc::clone(&audit_log),
            Duration::from_secs(config.default_tool_timeout_secs),
            Duration::from_secs(config.max_tool_timeout_secs),
        ));

        let prompts = Arc::new(PromptStore::new());
        seed_default_prompts(&prompts);

        let mcp_dispatcher = Arc::new(McpDispatcher::new(Arc::clone(&registry), Arc::clone(&envelope), Arc::clone(&prompts)));
        let olap = Arc::new(OlapExecutor::new(sql_pool.clone()));

        Ok(Arc::new(Self {
            registry,
            envelope,
            auth,
            rate_limiter,
            audit_log,
            prompts,
            mcp_dispatcher,
            olap,
            sql_pool,
            config,
        }))
    }
}

/// Seed the bootstrap admin account so a fresh deployment always has one
/// user capable of registering further users and API keys (spec §4.3: "an
/// admin user cannot be disabled or deleted"). Generates a random password
/// and logs it once when `SAJHA_ADMIN_PASSWORD` is unset.
fn seed_admin(auth: &AuthManager, config: &ServerConfig) {
    let password = config.admin_password.clone().unwrap_or_else(|| {
        use rand::distributions::Alphanumeric;
        use rand::Rng;
        let generated: String = rand::thread_rng().sample_iter(&Alphanumeric).take(20).map(char::from).collect();
        warn!(
            user = %config.admin_user_id,
            "SAJHA_ADMIN_PASSWORD not set; generated a one-time bootstrap admin password, see below"
        );
        println!("Bootstrap admin credentials: {} / {}", config.admin_user_id, generated);
        generated
    });
    if let Err(err) = auth.create_user(&config.admin_user_id, &password, crate::auth::Principal::admin(&config.admin_user_id)) {
        warn!(error = %err.message, "failed to seed bootstrap admin account");
    }
}

/// A small set of built-in prompt templates, enough to exercise
/// `prompts/list`/`get`/`render` out of the box.
fn seed_default_prompts(prompts: &PromptStore) {
    prompts.register(mcp::PromptTemplate {
        name: "summarize_tool_result".to_string(),
        description: "Summarize a tool's JSON result for a human reader".to_string(),
        template: "Summarize the following result from the '{{tool_name}}' tool in plain language:\n\n{{result}}".to_string(),
        argument_names: vec!["tool_name".to_string(), "result".to_string()],
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_seeds_admin_and_empty_registry_on_fresh_dirs() {
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
        let state = AppState::bootstrap(config).await.expect("bootstrap should succeed");
        assert_eq!(state.registry.len(), 0);
        assert!(state.auth.is_protected_admin("admin"));
    }
}
