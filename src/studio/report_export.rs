// ABOUTME: Report export generator - OAuth client-credentials, async export kickoff, poll, fetch.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use crate::tools::handler::{Deadline, ToolHandler};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Pdf,
    Pptx,
    Png,
}

/// Declarative spec for a report-export tool (spec §4.6 "Report export generator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportExportSpec {
    pub workspace: String,
    pub report: String,
    pub tenant: String,
    pub format: ExportFormat,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub export_base_url: String,
    pub poll_interval_seconds: u64,
    pub timeout_seconds: u64,
}

impl ReportExportSpec {
    /// # Errors
    /// Returns `InvalidArgument` if the poll interval is non-positive or
    /// exceeds the overall timeout.
    pub fn validate(&self) -> AppResult<()> {
        if self.poll_interval_seconds == 0 || self.poll_interval_seconds > self.timeout_seconds {
            return Err(AppError::invalid_argument(
                "poll_interval_seconds must be positive and not exceed timeout_seconds",
                vec!["poll_interval_seconds".to_string()],
            ));
        }
        Ok(())
    }
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct ReportExportHandler {
    spec: ReportExportSpec,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl ReportExportHandler {
    #[must_use]
    pub fn new(spec: ReportExportSpec) -> Self {
        Self {
            spec,
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Client-credentials OAuth token, cached until 60s before expiry (spec §4.6).
    async fn access_token(&self) -> AppResult<String> {
        {
            let cached = self.token.lock().expect("token cache lock poisoned");
            if let Some(cached) = cached.as_ref() {
                if cached.expires_at - chrono::Duration::seconds(60) > Utc::now() {
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

        let expires_at = Utc::now() + chrono::Duration::seconds(response.expires_in);
        *self.token.lock().expect("token cache lock poisoned") = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at,
        });
        Ok(response.access_token)
    }
}

#[derive(Deserialize)]
struct ExportStatus {
    status: String,
    #[serde(default)]
    file_url: Option<String>,
}

#[async_trait]
impl ToolHandler for ReportExportHandler {
    async fn execute(&self, arguments: Value, deadline: Deadline) -> AppResult<Value> {
        let started = Instant::now();
        let token = self.access_token().await?;
        let page = arguments.get("page").cloned();
        let filters = arguments.get("filters").cloned();

        let kickoff: Value = self
            .client
            .post(format!(
                "{}/workspaces/{}/reports/{}/export",
                self.spec.export_base_url, self.spec.workspace, self.spec.report
            ))
            .bearer_auth(&token)
            .json(&json!({"tenant": self.spec.tenant, "format": self.spec.format, "page": page, "filters": filters}))
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("export kickoff failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("invalid export kickoff response: {e}")))?;

        let export_id = kickoff
            .get("export_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::upstream("export kickoff response missing export_id"))?
            .to_string();

        loop {
            if deadline.is_expired() {
                return Err(AppError::new(crate::errors::ErrorKind::Timeout, "report export timed out"));
            }
            let status: ExportStatus = self
                .client
                .get(format!("{}/exports/{}", self.spec.export_base_url, export_id))
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| AppError::upstream(format!("export status poll failed: {e}")))?
                .json()
                .await
                .map_err(|e| AppError::upstream(format!("invalid export status response: {e}")))?;

            match status.status.as_str() {
                "Succeeded" => {
                    let file_url = status
                        .file_url
                        .ok_or_else(|| AppError::upstream("succeeded export missing file_url"))?;
                    let bytes = self
                        .client
                        .get(file_url)
                        .bearer_auth(&token)
                        .send()
                        .await
                        .map_err(|e| AppError::upstream(format!("export file fetch failed: {e}")))?
                        .bytes()
                        .await
                        .map_err(|e| AppError::upstream(format!("export file read failed: {e}")))?;
                    return Ok(json!({
                        "format": self.spec.format,
                        "size_bytes": bytes.len(),
                        "data": base64::engine::general_purpose::STANDARD.encode(&bytes),
                        "export_time_seconds": started.elapsed().as_secs_f64(),
                    }));
                }
                "Failed" => return Err(AppError::upstream("upstream reported export status Failed")),
                _ => tokio::time::sleep(Duration::from_secs(self.spec.poll_interval_seconds)).await,
            }
        }
    }
}
