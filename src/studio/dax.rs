// ABOUTME: DAX query generator - single-query analogue of the report-export OAuth pattern.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use crate::tools::handler::{Deadline, ToolHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Instant;

struct CachedToken {
    token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

/// Declarative spec for a DAX-backed tool (spec §4.6 "DAX query generator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaxQuerySpec {
    pub dataset_id: String,
    pub query: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub query_base_url: String,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_max_rows() -> usize {
    1000
}

impl DaxQuerySpec {
    /// Queries must begin with `EVALUATE` (case-insensitive, after leading
    /// whitespace) per spec §4.6.
    ///
    /// # Errors
    /// Returns `InvalidArgument` when the query is not `EVALUATE`-prefixed.
    pub fn validate(&self) -> AppResult<()> {
        if !self.query.trim_start().to_uppercase().starts_with("EVALUATE") {
            return Err(AppError::invalid_argument(
                "query must begin with EVALUATE",
                vec!["query".to_string()],
            ));
        }
        Ok(())
    }
}

pub struct DaxQueryHandler {
    spec: DaxQuerySpec,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl DaxQueryHandler {
    #[must_use]
    pub fn new(spec: DaxQuerySpec) -> Self {
        Self {
            spec,
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> AppResult<String> {
        {
            let cached = self.token.lock().expect("token cache lock poisoned");
            if let Some(cached) = cached.as_ref() {
                if cached.expires_at - chrono::Duration::seconds(60) > chrono::Utc::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }
        let response: TokenResponse = self
            .client
            .post(&self.spec.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", &self.spec.client_id),
                ("client_secret", &self.spec.client_secret),
            ])
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("token request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("invalid token response: {e}")))?;
        let expires_at = chrono::Utc::now() + chrono::Duration::seconds(response.expires_in);
        *self.token.lock().expect("token cache lock poisoned") = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at,
        });
        Ok(response.access_token)
    }
}

#[derive(Deserialize)]
struct DaxRow {
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

#[async_trait]
impl ToolHandler for DaxQueryHandler {
    async fn execute(&self, _arguments: Value, deadline: Deadline) -> AppResult<Value> {
        let started = Instant::now();
        let token = self.access_token().await?;

        #[derive(Deserialize)]
        struct QueryResponse {
            results: Vec<DaxTable>,
        }
        #[derive(Deserialize)]
        struct DaxTable {
            rows: Vec<DaxRow>,
        }

        let response: QueryResponse = self
            .client
            .post(format!("{}/datasets/{}/executeQueries", self.spec.query_base_url, self.spec.dataset_id))
            .bearer_auth(&token)
            .timeout(deadline.remaining())
            .json(&json!({"queries": [{"query": self.spec.query}]}))
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("DAX query failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("invalid DAX response: {e}")))?;

        let rows: Vec<&DaxRow> = response
            .results
            .first()
            .map(|t| t.rows.iter().take(self.spec.max_rows).collect())
            .unwrap_or_default();
        let columns: Vec<String> = rows.first().map(|r| r.fields.keys().cloned().collect()).unwrap_or_default();
        let data: Vec<Value> = rows.into_iter().map(|r| Value::Object(r.fields.clone())).collect();

        Ok(json!({
            "row_count": data.len(),
            "columns": columns,
            "data": data,
            "query_time_seconds": started.elapsed().as_secs_f64(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(query: &str) -> DaxQuerySpec {
        DaxQuerySpec {
            dataset_id: "ds".to_string(),
            query: query.to_string(),
            token_url: "https://example.com/token".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            query_base_url: "https://example.com".to_string(),
            max_rows: 1000,
        }
    }

    #[test]
    fn validate_requires_evaluate_prefix_case_insensitive() {
        assert!(spec("EVALUATE Sales").validate().is_ok());
        assert!(spec("  evaluate Sales").validate().is_ok());
        assert!(spec("SELECT * FROM Sales").validate().is_err());
    }
}
