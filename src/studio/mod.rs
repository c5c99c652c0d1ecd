// ABOUTME: StudioGenerators - the seven tool-generator families (spec §4.6). Each generator
// ABOUTME: shares three stages: validate spec, render handler, persist + notify reload.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod dax;
pub mod document_store;
pub mod report_export;
pub mod rest;
pub mod script;
pub mod sql;
pub mod studio_user;

use crate::errors::{AppError, AppResult};
use crate::tools::definition::{HandlerSpec, SourceKind, ToolDefinition, ToolMetadata};
use crate::tools::handler::ToolHandler;
use std::path::Path;
use std::sync::Arc;

/// Instantiate the runtime handler matching a persisted `HandlerSpec`. This
/// is the single point the registry's `reload_all` and every generator's
/// "persist + notify" stage both call through (spec §9 dispatcher note).
///
/// # Errors
/// Returns `InvalidArgument` if the spec itself fails its own validation
/// (e.g. a forbidden SQL keyword, a non-`EVALUATE` DAX query).
pub fn build_handler(spec: &HandlerSpec, sql_pool: Option<&sqlx::SqlitePool>) -> AppResult<Arc<dyn ToolHandler>> {
    match spec {
        HandlerSpec::Native => Err(AppError::internal(
            "native tools must be registered directly by the embedding application",
        )),
        HandlerSpec::Rest(rest_spec) => {
            rest_spec.validate()?;
            Ok(Arc::new(rest::RestHandler::new(rest_spec.clone())))
        }
        HandlerSpec::SqlQuery(sql_spec) => {
            sql_spec.validate()?;
            let pool = sql_pool
                .ok_or_else(|| AppError::internal("no SQL connection pool configured for this deployment"))?;
            Ok(Arc::new(sql::SqlQueryHandler::new(sql_spec.clone(), pool.clone())))
        }
        HandlerSpec::Script(script_spec) => {
            script_spec.validate()?;
            Ok(Arc::new(script::ScriptHandler::new(script_spec.clone())))
        }
        HandlerSpec::ReportExport(report_spec) => {
            report_spec.validate()?;
            Ok(Arc::new(report_export::ReportExportHandler::new(report_spec.clone())))
        }
        HandlerSpec::AnalyticQuery(dax_spec) => {
            dax_spec.validate()?;
            Ok(Arc::new(dax::DaxQueryHandler::new(dax_spec.clone())))
        }
        HandlerSpec::DocumentStore(doc_spec) => {
            doc_spec.validate()?;
            Ok(Arc::new(document_store::DocumentStoreHandler::new(doc_spec.clone())))
        }
        HandlerSpec::StudioUser(user_spec) => {
            user_spec.validate()?;
            unreachable!("StudioUserSpec::validate always errs")
        }
    }
}

/// Persist a tool definition as its on-disk document and return the path
/// written (spec §4.6 "persist" stage; spec §6 one-file-per-tool layout).
///
/// # Errors
/// Returns `Internal` if the document cannot be serialized or written.
pub fn persist_definition(config_dir: &Path, definition: &ToolDefinition) -> AppResult<std::path::PathBuf> {
    let path = config_dir.join(format!("{}.json", definition.name));
    let body = serde_json::to_string_pretty(definition)
        .map_err(|e| AppError::internal(format!("failed serializing tool definition: {e}")))?;
    std::fs::write(&path, body).map_err(|e| AppError::internal(format!("failed writing {}: {e}", path.display())))?;
    Ok(path)
}

/// Build a complete `ToolDefinition` wrapper around a validated `HandlerSpec`,
/// the declarative half of every generator's "validate spec" stage (spec
/// §4.6: "Validation refuses a spec when it would produce a name collision,
/// an invalid identifier, or a handler whose inputs cannot be derived").
///
/// # Errors
/// Returns `InvalidArgument` if `name` fails `is_valid_tool_name`, or if the
/// name collides with `existing_names`.
pub fn build_definition(
    name: &str,
    description: &str,
    input_schema: serde_json::Value,
    handler_spec: HandlerSpec,
    existing_names: &[String],
) -> AppResult<ToolDefinition> {
    if !crate::tools::definition::is_valid_tool_name(name) {
        return Err(AppError::invalid_argument(format!("'{name}' is not a valid tool name"), vec!["name".to_string()]));
    }
    if existing_names.iter().any(|existing| existing == name) {
        return Err(AppError::conflict(format!("a tool named '{name}' already exists")));
    }
    let source = match &handler_spec {
        HandlerSpec::Native => SourceKind::Native,
        HandlerSpec::Rest(_) => SourceKind::Rest,
        HandlerSpec::SqlQuery(_) => SourceKind::Sqlquery,
        HandlerSpec::Script(_) => SourceKind::Script,
        HandlerSpec::ReportExport(_) => SourceKind::ReportExport,
        HandlerSpec::AnalyticQuery(_) => SourceKind::AnalyticQuery,
        HandlerSpec::DocumentStore(_) => SourceKind::DocumentStore,
        HandlerSpec::StudioUser(_) => SourceKind::StudioPython,
    };
    Ok(ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        version: "1.0.0".to_string(),
        enabled: true,
        input_schema,
        output_schema: None,
        metadata: ToolMetadata {
            author: None,
            category: None,
            tags: Vec::new(),
            requested_rate_limit: None,
            cache_ttl_seconds: None,
            source,
            requested_timeout_seconds: None,
        },
        handler_spec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::rest::{HttpMethod, ResponseFormat, RestSpec};

    #[test]
    fn build_definition_rejects_name_collision() {
        let spec = HandlerSpec::Rest(RestSpec {
            endpoint_url: "https://example.com".to_string(),
            method: HttpMethod::Get,
            response_format: ResponseFormat::Json,
            csv_options: None,
            auth: None,
            auth_secret: None,
            timeout_seconds: 30,
        });
        let err = build_definition("echo_tool", "desc", serde_json::json!({}), spec, &["echo_tool".to_string()]).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Conflict);
    }

    #[test]
    fn build_handler_rejects_studio_user_spec() {
        let spec = HandlerSpec::StudioUser(studio_user::StudioUserSpec {
            source: "def f(): pass".to_string(),
            annotated_function: None,
        });
        let err = build_handler(&spec, None).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::InvalidArgument);
    }
}
