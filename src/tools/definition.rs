// ABOUTME: ToolDefinition - the declarative, persisted description of a tool (spec §3).
// ABOUTME: HandlerKind/HandlerSpec collapse the source's per-generator templated code into
// ABOUTME: one discriminated variant the registry instantiates a runtime dispatcher from (spec §9).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which Studio generator (or built-in) produced this tool's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Native,
    Rest,
    SqlQuery,
    Script,
    ReportExport,
    AnalyticQuery,
    DocumentStore,
    StudioUser,
}

/// Per-handler-kind payload, persisted verbatim in the tool configuration
/// document so `Load`/`Register` can reconstruct a runtime dispatcher purely
/// from disk without a second generation pass (spec §3 supplement).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerSpec {
    Native,
    Rest(crate::studio::rest::RestSpec),
    SqlQuery(crate::studio::sql::SqlQuerySpec),
    Script(crate::studio::script::ScriptSpec),
    ReportExport(crate::studio::report_export::ReportExportSpec),
    AnalyticQuery(crate::studio::dax::DaxQuerySpec),
    DocumentStore(crate::studio::document_store::DocumentStoreSpec),
    StudioUser(crate::studio::studio_user::StudioUserSpec),
}

impl HandlerSpec {
    #[must_use]
    pub const fn kind(&self) -> HandlerKind {
        match self {
            Self::Native => HandlerKind::Native,
            Self::Rest(_) => HandlerKind::Rest,
            Self::SqlQuery(_) => HandlerKind::SqlQuery,
            Self::Script(_) => HandlerKind::Script,
            Self::ReportExport(_) => HandlerKind::ReportExport,
            Self::AnalyticQuery(_) => HandlerKind::AnalyticQuery,
            Self::DocumentStore(_) => HandlerKind::DocumentStore,
            Self::StudioUser(_) => HandlerKind::StudioUser,
        }
    }
}

/// Source kind discriminator carried in `metadata.source`, mirroring the wire
/// document format (spec §6) independent of the in-process `HandlerKind` enum
/// tag name so on-disk documents stay stable across internal refactors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Native,
    Rest,
    Sqlquery,
    Script,
    ReportExport,
    AnalyticQuery,
    DocumentStore,
    StudioPython,
}

/// `ToolDefinition.metadata` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub author: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub requested_rate_limit: Option<u32>,
    pub cache_ttl_seconds: Option<u64>,
    pub source: SourceKind,
    /// Clamped against the envelope deadline rule at execution time, not load time.
    pub requested_timeout_seconds: Option<u64>,
}

/// The declarative description of a tool, persisted one JSON document per
/// tool under the tools configuration directory (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub version: String,
    pub enabled: bool,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
    pub metadata: ToolMetadata,
    pub handler_spec: HandlerSpec,
}

/// A tool name is a lowercase identifier, 3-64 chars, `[a-z][a-z0-9_]*` (spec §3).
#[must_use]
pub fn is_valid_tool_name(name: &str) -> bool {
    if name.len() < 3 || name.len() > 64 {
        return false;
    }
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Lightweight summary returned by `ToolRegistry::list` (visible even for
/// disabled tools, per spec §4.1 invariants).
#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub version: String,
    pub enabled: bool,
    pub category: Option<String>,
}

impl From<&ToolDefinition> for ToolSummary {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            version: def.version.clone(),
            enabled: def.enabled,
            category: def.metadata.category.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_validation_matches_spec_pattern() {
        assert!(is_valid_tool_name("echo"));
        assert!(is_valid_tool_name("get_activities_2"));
        assert!(!is_valid_tool_name("Echo"));
        assert!(!is_valid_tool_name("_echo"));
        assert!(!is_valid_tool_name("1echo"));
        assert!(!is_valid_tool_name("ab"));
        assert!(!is_valid_tool_name(&"a".repeat(65)));
    }
}
