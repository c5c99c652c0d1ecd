// ABOUTME: Principal - the resolved identity of a caller, shared by session and API-key auth.
// ABOUTME: Carries the allow-list/regex access configuration AccessPolicy decides against.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Whether a principal authenticated via a short-lived session or a long-lived key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    ApiKey,
}

/// How a principal's tool access is granted. Derived from `allowed_tools`/
/// `allowed_patterns` at construction time so `AccessPolicy` can branch once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolAccessMode {
    AllowAll,
    AllowListed,
    AllowRegex,
    Mixed,
}

/// Optional requests-per-minute / requests-per-hour quota carried by a principal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_minute: Option<u32>,
    pub requests_per_hour: Option<u32>,
}

/// The resolved identity of a caller (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: String,
    pub kind: PrincipalKind,
    pub roles: HashSet<String>,
    pub tool_access_mode: ToolAccessMode,
    pub allowed_tools: HashSet<String>,
    #[serde(default)]
    pub allowed_patterns: Vec<String>,
    pub rate_limit: Option<RateLimit>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes audit records and Studio-generated datasets to one logical tenant.
    /// Not an access-control axis: tool access is governed solely by
    /// `tool_access_mode`/`allowed_tools`/`allowed_patterns` (spec §3 supplement).
    pub tenant_id: Option<String>,
}

impl Principal {
    /// An unrestricted admin principal (e.g. the seeded admin user).
    #[must_use]
    pub fn admin(principal_id: impl Into<String>) -> Self {
        let mut roles = HashSet::new();
        roles.insert("admin".to_string());
        Self {
            principal_id: principal_id.into(),
            kind: PrincipalKind::User,
            roles,
            tool_access_mode: ToolAccessMode::AllowAll,
            allowed_tools: HashSet::new(),
            allowed_patterns: Vec::new(),
            rate_limit: None,
            expires_at: None,
            tenant_id: None,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains("admin")
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() > exp)
    }

    /// Derive the access mode implied by a set of allow-list/regex inputs,
    /// matching the resolution order in `AccessPolicy::can_access`.
    #[must_use]
    pub fn derive_access_mode(allowed_tools: &HashSet<String>, allowed_patterns: &[String]) -> ToolAccessMode {
        let has_wildcard = allowed_tools.contains("*");
        let has_list = !allowed_tools.is_empty() && !has_wildcard;
        let has_patterns = !allowed_patterns.is_empty();

        if has_wildcard {
            ToolAccessMode::AllowAll
        } else if has_list && has_patterns {
            ToolAccessMode::Mixed
        } else if has_patterns {
            ToolAccessMode::AllowRegex
        } else {
            ToolAccessMode::AllowListed
        }
    }
}
