// ABOUTME: ToolEnvelope - the seven-stage call pipeline every tool invocation passes through:
// ABOUTME: resolve, enabled-check, authorize, quota, validate, execute, record (spec §4.1, §9).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::audit::{AuditLog, AuditRecord};
use super::handler::{run_with_deadline, Deadline};
use super::registry::ToolRegistry;
use crate::access_policy::{self, RateLimiter};
use crate::auth::Principal;
use crate::errors::{AppError, AppResult};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Wires the registry, access policy and audit log together behind one
/// entry point so both the REST surface and the MCP dispatcher invoke tools
/// identically (spec §9: "a single dispatcher handles every `HandlerKind`").
pub struct ToolEnvelope {
    registry: Arc<ToolRegistry>,
    rate_limiter: Arc<RateLimiter>,
    audit_log: Arc<AuditLog>,
    default_timeout: Duration,
    max_timeout: Duration,
}

impl ToolEnvelope {
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        rate_limiter: Arc<RateLimiter>,
        audit_log: Arc<AuditLog>,
        default_timeout: Duration,
        max_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            rate_limiter,
            audit_log,
            default_timeout,
            max_timeout,
        }
    }

    /// Run the full pipeline: resolve -> enabled-check -> authorize -> quota
    /// -> validate -> execute -> record. Every stage's failure is audited the
    /// same way a successful call is; only a successful `resolve` attaches a
    /// tool name to the metrics/audit record (an unresolved name has nothing
    /// to attribute the failure to).
    ///
    /// # Errors
    /// Returns whichever classified `AppError` the first failing stage
    /// produces.
    pub async fn dispatch(&self, tool_name: &str, principal: &Principal, arguments: Value) -> AppResult<Value> {
        let started_at = Utc::now();
        let started = Instant::now();

        let result = self.run_stages(tool_name, principal, arguments).await;

        let duration = started.elapsed();
        match &result {
            Ok(_) => {
                self.registry.record_execution(tool_name, duration, None);
                self.audit_log
                    .push(AuditRecord::success(tool_name, &principal.principal_id, started_at, duration.as_millis()));
                info!(tool = tool_name, principal = %principal.principal_id, ms = duration.as_millis(), "tool call succeeded");
            }
            Err(err) => {
                self.registry.record_execution(tool_name, duration, Some(err.kind));
                self.audit_log
                    .push(AuditRecord::failure(tool_name, &principal.principal_id, started_at, duration.as_millis(), err));
                warn!(tool = tool_name, principal = %principal.principal_id, kind = ?err.kind, "tool call failed");
            }
        }
        result
    }

    async fn run_stages(&self, tool_name: &str, principal: &Principal, arguments: Value) -> AppResult<Value> {
        // 1. resolve
        let (definition, handler) = self.registry.resolve(tool_name)?;

        // 2. enabled-check
        if !definition.enabled {
            return Err(AppError::tool_disabled(tool_name));
        }

        // 3. authorize
        access_policy::authorize(principal, tool_name)?;

        // 4. quota
        self.rate_limiter.check_and_record(principal)?;

        // 5. validate
        validate_arguments(&definition.input_schema, &arguments)?;

        // 6. execute (with a deadline clamped between 1s and the server-wide ceiling)
        let requested = definition.metadata.requested_timeout_seconds.map(Duration::from_secs);
        let timeout = requested
            .unwrap_or(self.default_timeout)
            .clamp(Duration::from_secs(1), self.max_timeout);
        let deadline = Deadline::after(timeout);
        let output = run_with_deadline(deadline, handler.execute(arguments, deadline)).await?;

        // 7. record happens in the caller (dispatch) once duration is known.
        Ok(output)
    }
}

/// Validate `arguments` against `schema` using draft-agnostic JSON Schema
/// validation. An invalid schema document itself is an internal
/// misconfiguration, not a caller error.
fn validate_arguments(schema: &Value, arguments: &Value) -> AppResult<()> {
    let compiled = jsonschema::validator_for(schema)
        .map_err(|e| AppError::internal(format!("tool input schema is invalid: {e}")))?;
    let field_paths: Vec<String> = compiled
        .iter_errors(arguments)
        .map(|e| e.instance_path.to_string())
        .collect();
    if field_paths.is_empty() {
        Ok(())
    } else {
        Err(AppError::invalid_argument("arguments failed schema validation", field_paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{build_principal, PrincipalKind};
    use crate::tools::audit::AuditLog;
    use crate::tools::definition::{HandlerSpec, SourceKind, ToolDefinition, ToolMetadata};
    use crate::tools::handler::ToolHandler;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn execute(&self, arguments: Value, _deadline: Deadline) -> AppResult<Value> {
            Ok(arguments)
        }
    }

    struct Never;

    #[async_trait]
    impl ToolHandler for Never {
        async fn execute(&self, _arguments: Value, _deadline: Deadline) -> AppResult<Value> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            unreachable!("deadline should fire first")
        }
    }

    fn envelope() -> (ToolEnvelope, Arc<ToolRegistry>) {
        let registry = Arc::new(ToolRegistry::new("/tmp/unused"));
        let envelope = ToolEnvelope::new(
            Arc::clone(&registry),
            Arc::new(RateLimiter::new()),
            Arc::new(AuditLog::new(16)),
            Duration::from_secs(5),
            Duration::from_secs(30),
        );
        (envelope, registry)
    }

    fn definition(name: &str, schema: Value, timeout_secs: Option<u64>) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: "test".to_string(),
            version: "1.0.0".to_string(),
            enabled: true,
            input_schema: schema,
            output_schema: None,
            metadata: ToolMetadata {
                author: None,
                category: None,
                tags: Vec::new(),
                requested_rate_limit: None,
                cache_ttl_seconds: None,
                source: SourceKind::Native,
                requested_timeout_seconds: timeout_secs,
            },
            handler_spec: HandlerSpec::Native,
        }
    }

    fn principal_allowing(tool: &str) -> Principal {
        build_principal(
            "p1",
            PrincipalKind::ApiKey,
            HashSet::new(),
            HashSet::from([tool.to_string()]),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn successful_dispatch_echoes_and_records_metrics() {
        let (envelope, registry) = envelope();
        registry
            .register(definition("echo_tool", json!({"type": "object"}), None), Arc::new(Echo))
            .unwrap();
        let out = envelope
            .dispatch("echo_tool", &principal_allowing("echo_tool"), json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(out, json!({"x": 1}));
        assert_eq!(registry.metrics("echo_tool").unwrap().execution_count, 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_tool_not_found() {
        let (envelope, _registry) = envelope();
        let err = envelope
            .dispatch("missing_tool", &principal_allowing("missing_tool"), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::ToolNotFound);
    }

    #[tokio::test]
    async fn disabled_tool_is_rejected() {
        let (envelope, registry) = envelope();
        registry
            .register(definition("echo_tool", json!({"type": "object"}), None), Arc::new(Echo))
            .unwrap();
        registry.set_enabled("echo_tool", false).unwrap();
        let err = envelope
            .dispatch("echo_tool", &principal_allowing("echo_tool"), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::ToolDisabled);
    }

    #[tokio::test]
    async fn unauthorized_principal_is_access_denied() {
        let (envelope, registry) = envelope();
        registry
            .register(definition("echo_tool", json!({"type": "object"}), None), Arc::new(Echo))
            .unwrap();
        let stranger = principal_allowing("other_tool");
        let err = envelope.dispatch("echo_tool", &stranger, json!({})).await.unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn schema_mismatch_is_invalid_argument() {
        let (envelope, registry) = envelope();
        let schema = json!({"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}});
        registry.register(definition("greet", schema, None), Arc::new(Echo)).unwrap();
        let err = envelope
            .dispatch("greet", &principal_allowing("greet"), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::InvalidArgument);
        assert!(!err.field_paths.is_empty());
    }

    #[tokio::test]
    async fn slow_handler_is_timed_out() {
        let (envelope, registry) = envelope();
        registry
            .register(definition("slow", json!({"type": "object"}), Some(1)), Arc::new(Never))
            .unwrap();
        let err = envelope
            .dispatch("slow", &principal_allowing("slow"), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Timeout);
    }
}
