// ABOUTME: ToolRegistry - the single RwLock-guarded source of truth for loaded tool definitions,
// ABOUTME: their runtime handlers, and their cumulative metrics (spec §3, §4.1, §5).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::definition::{ToolDefinition, ToolSummary};
use super::handler::ToolHandler;
use super::metrics::ToolMetrics;
use crate::errors::{AppError, AppResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

struct Entry {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
    metrics: ToolMetrics,
}

/// The in-memory tool table. One instance is shared (via `Arc`) across every
/// request handler; all mutation goes through a single writer lock at a time,
/// readers never block each other (spec §5).
pub struct ToolRegistry {
    config_dir: PathBuf,
    entries: RwLock<HashMap<String, Entry>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a definition together with its runtime handler.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the name fails validation (spec §3), or
    /// `Conflict` if a tool with the same name is already registered (spec
    /// §4.1 `Load`/`Register`: "Duplicates fail with `Conflict`").
    pub fn register(&self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> AppResult<()> {
        if !super::definition::is_valid_tool_name(&definition.name) {
            return Err(AppError::invalid_argument(
                format!("'{}' is not a valid tool name", definition.name),
                vec!["name".to_string()],
            ));
        }
        let name = definition.name.clone();
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if entries.contains_key(&name) {
            return Err(AppError::conflict(format!("a tool named '{name}' already exists")));
        }
        entries.insert(
            name,
            Entry {
                definition,
                handler,
                metrics: ToolMetrics::default(),
            },
        );
        Ok(())
    }

    /// Remove a tool entirely (spec §4.1 `Unregister`).
    ///
    /// # Errors
    /// Returns `ToolNotFound` if no such tool is registered.
    pub fn unregister(&self, name: &str) -> AppResult<()> {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AppError::tool_not_found(name))
    }

    /// Flip a tool's `enabled` flag without touching its handler or metrics.
    ///
    /// # Errors
    /// Returns `ToolNotFound` if no such tool is registered.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> AppResult<()> {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let entry = entries.get_mut(name).ok_or_else(|| AppError::tool_not_found(name))?;
        entry.definition.enabled = enabled;
        Ok(())
    }

    /// Look up a tool's definition and handler together, for the envelope's
    /// resolve stage.
    ///
    /// # Errors
    /// Returns `ToolNotFound` if no such tool is registered.
    pub fn resolve(&self, name: &str) -> AppResult<(ToolDefinition, Arc<dyn ToolHandler>)> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let entry = entries.get(name).ok_or_else(|| AppError::tool_not_found(name))?;
        Ok((entry.definition.clone(), Arc::clone(&entry.handler)))
    }

    /// List every tool, enabled or not (spec §4.1 invariant).
    #[must_use]
    pub fn list(&self) -> Vec<ToolSummary> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let mut summaries: Vec<ToolSummary> = entries.values().map(|e| ToolSummary::from(&e.definition)).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the outcome of one call against a tool's cumulative metrics.
    pub fn record_execution(&self, name: &str, duration: std::time::Duration, outcome: Option<crate::errors::ErrorKind>) {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if let Some(entry) = entries.get_mut(name) {
            entry.metrics.record(duration, outcome);
        }
    }

    #[must_use]
    pub fn metrics(&self, name: &str) -> Option<ToolMetrics> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .map(|e| e.metrics.clone())
    }

    /// Render every tool's cumulative metrics as CSV (spec §4.1 `ExportMetricsCSV`).
    #[must_use]
    pub fn export_metrics_csv(&self) -> String {
        let entries = self.entries.read().expect("registry lock poisoned");
        let mut names: Vec<&String> = entries.keys().collect();
        names.sort();
        let rows: Vec<super::metrics::ToolMetricsRow<'_>> = names
            .into_iter()
            .map(|name| {
                let entry = &entries[name];
                super::metrics::ToolMetricsRow {
                    name,
                    version: &entry.definition.version,
                    enabled: entry.definition.enabled,
                    metrics: &entry.metrics,
                    description: &entry.definition.description,
                }
            })
            .collect();
        super::metrics::to_csv(&rows)
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Reload every `*.json` tool document under the configured directory,
    /// replacing the entire table atomically from the caller's perspective
    /// (the write lock is held for the whole swap). A single malformed
    /// document is logged and skipped rather than aborting the reload (spec
    /// §4.1 `ReloadAll`, §9 design note: config directory is a
    /// content-addressed store the registry re-derives state from wholesale).
    ///
    /// # Errors
    /// Returns `Internal` if the directory itself cannot be read.
    pub fn reload_all<F>(&self, build_handler: F) -> AppResult<usize>
    where
        F: Fn(&ToolDefinition) -> AppResult<Arc<dyn ToolHandler>>,
    {
        let dir_entries = std::fs::read_dir(&self.config_dir)
            .map_err(|e| AppError::internal(format!("cannot read tools config dir: {e}")))?;

        let mut loaded = HashMap::new();
        for dir_entry in dir_entries.flatten() {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_definition(&path).and_then(|def| build_handler(&def).map(|h| (def, h))) {
                Ok((definition, handler)) => {
                    if !super::definition::is_valid_tool_name(&definition.name) {
                        warn!(path = %path.display(), "skipping tool document with invalid name");
                        continue;
                    }
                    let name = definition.name.clone();
                    if loaded.contains_key(&name) {
                        warn!(
                            path = %path.display(),
                            name = %name,
                            "skipping tool document, a tool with this name was already loaded from this scan"
                        );
                        continue;
                    }
                    loaded.insert(
                        name,
                        Entry {
                            definition,
                            handler,
                            metrics: ToolMetrics::default(),
                        },
                    );
                }
                Err(err) => warn!(path = %path.display(), error = %err.message, "skipping malformed tool document"),
            }
        }

        let count = loaded.len();
        *self.entries.write().expect("registry lock poisoned") = loaded;
        info!(count, "reloaded tool registry from configuration directory");
        Ok(count)
    }
}

fn load_definition(path: &Path) -> AppResult<ToolDefinition> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::internal(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| AppError::internal(format!("cannot parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::definition::{HandlerSpec, SourceKind, ToolMetadata};
    use crate::tools::handler::Deadline;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn execute(&self, arguments: Value, _deadline: Deadline) -> AppResult<Value> {
            Ok(arguments)
        }
    }

    fn sample_definition(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: "test tool".to_string(),
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
        }
    }

    #[test]
    fn register_then_resolve_round_trips() {
        let registry = ToolRegistry::new("/tmp/unused");
        registry.register(sample_definition("echo_tool"), Arc::new(Echo)).unwrap();
        let (def, _handler) = registry.resolve("echo_tool").unwrap();
        assert_eq!(def.name, "echo_tool");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_invalid_name() {
        let registry = ToolRegistry::new("/tmp/unused");
        let err = registry.register(sample_definition("Bad Name"), Arc::new(Echo)).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::InvalidArgument);
    }

    #[test]
    fn register_rejects_duplicate_name() {
        let registry = ToolRegistry::new("/tmp/unused");
        registry.register(sample_definition("echo_tool"), Arc::new(Echo)).unwrap();
        let err = registry.register(sample_definition("echo_tool"), Arc::new(Echo)).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Conflict);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = ToolRegistry::new("/tmp/unused");
        registry.register(sample_definition("echo_tool"), Arc::new(Echo)).unwrap();
        registry.unregister("echo_tool").unwrap();
        assert!(registry.resolve("echo_tool").is_err());
    }

    #[test]
    fn list_includes_disabled_tools() {
        let registry = ToolRegistry::new("/tmp/unused");
        registry.register(sample_definition("echo_tool"), Arc::new(Echo)).unwrap();
        registry.set_enabled("echo_tool", false).unwrap();
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].enabled);
    }

    #[test]
    fn reload_all_picks_up_documents_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("echo_tool.json"),
            serde_json::to_string(&sample_definition("echo_tool")).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "not json").unwrap();

        let registry = ToolRegistry::new(dir.path());
        let count = registry.reload_all(|_def| Ok(Arc::new(Echo) as Arc<dyn ToolHandler>)).unwrap();
        assert_eq!(count, 1);
        assert!(registry.resolve("echo_tool").is_ok());
    }

    #[test]
    fn reload_all_skips_second_document_claiming_an_already_loaded_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = sample_definition("echo_tool");
        first.description = "first".to_string();
        let mut second = sample_definition("echo_tool");
        second.description = "second".to_string();
        std::fs::write(dir.path().join("a_echo_tool.json"), serde_json::to_string(&first).unwrap()).unwrap();
        std::fs::write(dir.path().join("b_echo_tool.json"), serde_json::to_string(&second).unwrap()).unwrap();

        let registry = ToolRegistry::new(dir.path());
        let count = registry.reload_all(|_def| Ok(Arc::new(Echo) as Arc<dyn ToolHandler>)).unwrap();
        assert_eq!(count, 1, "one of the two same-name documents must be skipped, not both admitted");
        assert!(registry.resolve("echo_tool").is_ok());
    }
}
