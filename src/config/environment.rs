// ABOUTME: Environment-driven server configuration with typed defaults for every tunable.
// ABOUTME: Nothing in the core reads std::env directly outside this module.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Server configuration, assembled once at startup from `SAJHA_*` environment
//! variables (falling back to a handful of common names like `DATABASE_URL`).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Strongly typed log level, parsed from `SAJHA_LOG`/`RUST_LOG`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Top-level server configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/MCP listener binds to.
    pub bind_address: String,
    /// Port the HTTP/MCP listener binds to.
    pub port: u16,
    /// Directory `ToolRegistry::load`/`reload_all` scan for tool configuration documents.
    pub tools_config_dir: PathBuf,
    /// Directory Studio generators write rendered script bodies into.
    pub scripts_dir: PathBuf,
    /// Directory the auth store persists users/API keys into (JSON documents).
    pub auth_store_dir: PathBuf,
    /// Directory the OLAP semantic layer loads dataset/measure/dimension configs from.
    pub olap_config_dir: PathBuf,
    /// SQLite database URL backing the OLAP columnar engine and the audit log.
    pub database_url: String,
    /// Default per-call deadline when a tool does not specify `metadata.timeout_seconds`.
    pub default_tool_timeout_secs: u64,
    /// Hard ceiling no tool timeout may exceed, regardless of what it requests.
    pub max_tool_timeout_secs: u64,
    /// Session inactivity timeout (spec §4.3 default: 24h).
    pub session_timeout_hours: i64,
    /// Default `max_rows` truncation for SQL/DAX generators when a spec omits one.
    pub default_max_rows: usize,
    /// Log level driving the `tracing-subscriber` `EnvFilter`.
    pub log_level: LogLevel,
    /// Deployment environment label, used only for log formatting decisions.
    pub environment: String,
    /// User id the bootstrap admin account is seeded under.
    pub admin_user_id: String,
    /// Bootstrap admin password. Generated and logged once if unset, so a
    /// fresh deployment always has one admin account capable of registering
    /// further users and API keys (spec §4.3 "an admin user cannot be
    /// disabled or deleted").
    pub admin_password: Option<String>,
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_var_u64_or(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_u16_or(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_i64_or(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from the environment, using production-safe defaults
    /// for anything unset. Never panics: every value has a fallback.
    #[must_use]
    pub fn from_env() -> Self {
        let log_raw = env::var("SAJHA_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            bind_address: env_var_or("SAJHA_BIND_ADDRESS", "0.0.0.0"),
            port: env_var_u16_or("SAJHA_PORT", 8080),
            tools_config_dir: PathBuf::from(env_var_or("SAJHA_TOOLS_CONFIG_DIR", "data/tools")),
            scripts_dir: PathBuf::from(env_var_or("SAJHA_SCRIPTS_DIR", "data/scripts")),
            auth_store_dir: PathBuf::from(env_var_or("SAJHA_AUTH_STORE_DIR", "data/auth")),
            olap_config_dir: PathBuf::from(env_var_or("SAJHA_OLAP_CONFIG_DIR", "data/olap")),
            database_url: env_var_or("DATABASE_URL", "sqlite://data/sajha.db"),
            default_tool_timeout_secs: env_var_u64_or("SAJHA_DEFAULT_TIMEOUT_SECS", 30),
            max_tool_timeout_secs: env_var_u64_or("SAJHA_MAX_TIMEOUT_SECS", 300),
            session_timeout_hours: env_var_i64_or("SAJHA_SESSION_TIMEOUT_HOURS", 24),
            default_max_rows: env_var_u64_or("SAJHA_DEFAULT_MAX_ROWS", 1000) as usize,
            log_level: LogLevel::from_str_or_default(&log_raw),
            environment: env_var_or("SAJHA_ENV", "development"),
            admin_user_id: env_var_or("SAJHA_ADMIN_USER", "admin"),
            admin_password: env::var("SAJHA_ADMIN_PASSWORD").ok(),
        }
    }

    /// A short, loggable summary of the resolved configuration (never
    /// includes secrets), mirroring the teacher's `ServerConfig::summary()`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "bind={}:{} env={} log={} tools_dir={} default_timeout={}s max_timeout={}s",
            self.bind_address,
            self.port,
            self.environment,
            self.log_level,
            self.tools_config_dir.display(),
            self.default_tool_timeout_secs,
            self.max_tool_timeout_secs,
        )
    }

    /// Clamp a requested per-tool timeout to `(0, max_tool_timeout_secs]`, falling
    /// back to `default_tool_timeout_secs` when the tool does not request one.
    #[must_use]
    pub fn resolve_timeout(&self, requested: Option<u64>) -> std::time::Duration {
        let secs = requested
            .unwrap_or(self.default_tool_timeout_secs)
            .clamp(1, self.max_tool_timeout_secs);
        std::time::Duration::from_secs(secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_timeout_clamps_to_hard_ceiling() {
        let cfg = ServerConfig {
            default_tool_timeout_secs: 30,
            max_tool_timeout_secs: 300,
            ..ServerConfig::from_env()
        };
        assert_eq!(cfg.resolve_timeout(Some(1000)).as_secs(), 300);
        assert_eq!(cfg.resolve_timeout(None).as_secs(), 30);
        assert_eq!(cfg.resolve_timeout(Some(5)).as_secs(), 5);
    }
}
