// ABOUTME: SQL query generator - parameterised templates against an external database connection.
// ABOUTME: Sanitization is intentionally substring-only (see DESIGN.md Open Question resolution).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use crate::tools::handler::{Deadline, ToolHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    Columnar,
    Sqlite,
    Postgres,
    Mysql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Date,
    Datetime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    pub default: Option<Value>,
    #[serde(default)]
    pub enum_values: Vec<Value>,
}

/// Declarative spec for a SQL-backed tool (spec §4.6 "SQL query generator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlQuerySpec {
    pub db_kind: DbKind,
    pub connection_descriptor: String,
    pub template: String,
    pub params: Vec<SqlParam>,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_max_rows() -> usize {
    1000
}

const FORBIDDEN: [&str; 3] = ["DROP ", "DELETE ", "TRUNCATE "];

impl SqlQuerySpec {
    /// Reject templates containing a destructive DDL/DML keyword (spec §4.6:
    /// "the generator must reject any template whose uppercase form contains
    /// `DROP `, `DELETE `, or `TRUNCATE `"). This is a substring check only —
    /// see DESIGN.md for why a fuller SQL-aware sanitizer is out of scope.
    ///
    /// # Errors
    /// Returns `InvalidArgument` naming the forbidden keyword found.
    pub fn validate(&self) -> AppResult<()> {
        let upper = self.template.to_uppercase();
        for keyword in FORBIDDEN {
            if upper.contains(keyword) {
                return Err(AppError::invalid_argument(
                    format!("template contains forbidden keyword '{}'", keyword.trim()),
                    vec!["template".to_string()],
                ));
            }
        }
        Ok(())
    }

    /// Render the template by substituting `{{param}}` markers with
    /// type-aware literal values (spec §4.6: strings are single-quote
    /// escaped, numbers/booleans/null rendered literal).
    ///
    /// # Errors
    /// Returns `InvalidArgument` if a required parameter is missing or has
    /// the wrong JSON type.
    pub fn render(&self, arguments: &Value) -> AppResult<String> {
        let mut rendered = self.template.clone();
        for param in &self.params {
            let value = arguments
                .get(&param.name)
                .cloned()
                .or_else(|| param.default.clone());
            let value = match value {
                Some(v) => v,
                None if param.required => {
                    return Err(AppError::invalid_argument(
                        format!("missing required parameter '{}'", param.name),
                        vec![param.name.clone()],
                    ))
                }
                None => Value::Null,
            };
            let literal = format_literal(&value);
            rendered = rendered.replace(&format!("{{{{{}}}}}", param.name), &literal);
        }
        Ok(rendered)
    }
}

fn format_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// Result shape returned by every SQL/OLAP handler (spec §4.6).
#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    pub elapsed_ms: u128,
    pub db_kind: DbKind,
}

pub struct SqlQueryHandler {
    spec: SqlQuerySpec,
    pool: sqlx::SqlitePool,
}

impl SqlQueryHandler {
    #[must_use]
    pub fn new(spec: SqlQuerySpec, pool: sqlx::SqlitePool) -> Self {
        Self { spec, pool }
    }
}

#[async_trait]
impl ToolHandler for SqlQueryHandler {
    async fn execute(&self, arguments: Value, _deadline: Deadline) -> AppResult<Value> {
        let started = Instant::now();
        let rendered = self.spec.render(&arguments)?;

        let rows = sqlx::query(&rendered)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::upstream(format!("query failed: {e}")))?;

        let columns: Vec<String> = rows
            .first()
            .map(|r| {
                use sqlx::Column;
                r.columns().iter().map(|c| c.name().to_string()).collect()
            })
            .unwrap_or_default();

        let mut out_rows = Vec::new();
        for row in rows.iter().take(self.spec.max_rows) {
            out_rows.push(row_to_values(row, &columns));
        }

        let result = QueryResult {
            row_count: out_rows.len(),
            columns,
            rows: out_rows,
            elapsed_ms: started.elapsed().as_millis(),
            db_kind: self.spec.db_kind,
        };
        serde_json::to_value(result).map_err(|e| AppError::internal(format!("failed serializing query result: {e}")))
    }
}

fn row_to_values(row: &sqlx::sqlite::SqliteRow, columns: &[String]) -> Vec<Value> {
    use sqlx::Row;
    columns
        .iter()
        .enumerate()
        .map(|(i, _)| {
            row.try_get::<Option<String>, _>(i)
                .map(|v| v.map_or(Value::Null, Value::String))
                .unwrap_or(Value::Null)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(template: &str) -> SqlQuerySpec {
        SqlQuerySpec {
            db_kind: DbKind::Sqlite,
            connection_descriptor: "sqlite::memory:".to_string(),
            template: template.to_string(),
            params: vec![SqlParam {
                name: "id".to_string(),
                param_type: ParamType::Integer,
                required: true,
                default: None,
                enum_values: Vec::new(),
            }],
            max_rows: 1000,
        }
    }

    #[test]
    fn validate_rejects_drop_delete_truncate_case_insensitively() {
        assert!(spec("drop table users").validate().is_err());
        assert!(spec("SELECT * FROM x WHERE 1=1; DELETE FROM x").validate().is_err());
        assert!(spec("TRUNCATE TABLE x").validate().is_err());
        assert!(spec("SELECT * FROM users WHERE id = {{id}}").validate().is_ok());
    }

    #[test]
    fn render_escapes_single_quotes_in_strings() {
        let s = SqlQuerySpec {
            db_kind: DbKind::Sqlite,
            connection_descriptor: String::new(),
            template: "SELECT * FROM t WHERE name = {{name}}".to_string(),
            params: vec![SqlParam {
                name: "name".to_string(),
                param_type: ParamType::String,
                required: true,
                default: None,
                enum_values: Vec::new(),
            }],
            max_rows: 1000,
        };
        let rendered = s.render(&serde_json::json!({"name": "O'Brien"})).unwrap();
        assert!(rendered.contains("'O''Brien'"));
    }

    #[test]
    fn render_fails_on_missing_required_param() {
        let err = spec("SELECT * FROM t WHERE id = {{id}}")
            .render(&serde_json::json!({}))
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::InvalidArgument);
    }
}
