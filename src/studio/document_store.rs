// ABOUTME: Document-store generator - search/list/get/download against a remote document server.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use crate::tools::handler::{Deadline, ToolHandler};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocStoreAuth {
    Basic,
    OAuth,
    Ticket,
}

/// Declarative spec for a document-store tool (spec §4.6 "Document-store generator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreSpec {
    pub server_url: String,
    pub auth_kind: DocStoreAuth,
    pub auth_secret: String,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

impl DocumentStoreSpec {
    /// # Errors
    /// Returns `InvalidArgument` if `server_url` is not absolute.
    pub fn validate(&self) -> AppResult<()> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(AppError::invalid_argument(
                "server_url must be an absolute http(s) URL",
                vec!["server_url".to_string()],
            ));
        }
        Ok(())
    }
}

pub struct DocumentStoreHandler {
    spec: DocumentStoreSpec,
    client: reqwest::Client,
}

impl DocumentStoreHandler {
    #[must_use]
    pub fn new(spec: DocumentStoreSpec) -> Self {
        Self {
            spec,
            client: reqwest::Client::new(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.spec.auth_kind {
            DocStoreAuth::Basic => {
                let (user, pass) = self.spec.auth_secret.split_once(':').unwrap_or((&self.spec.auth_secret, ""));
                builder.basic_auth(user, Some(pass))
            }
            DocStoreAuth::OAuth => builder.bearer_auth(&self.spec.auth_secret),
            DocStoreAuth::Ticket => builder.header("X-Ticket", &self.spec.auth_secret),
        }
    }
}

#[derive(Deserialize)]
struct DocMetadata {
    size_bytes: u64,
    download_url: String,
}

#[async_trait]
impl ToolHandler for DocumentStoreHandler {
    async fn execute(&self, arguments: Value, deadline: Deadline) -> AppResult<Value> {
        let action = arguments
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::invalid_argument("action is required", vec!["action".to_string()]))?;

        match action {
            "search" | "list" => {
                let query = arguments.get("query").cloned().unwrap_or(Value::Null);
                let response = self
                    .authed(self.client.get(format!("{}/{}", self.spec.server_url, action)))
                    .timeout(deadline.remaining())
                    .query(&[("q", query.as_str().unwrap_or_default())])
                    .send()
                    .await
                    .map_err(|e| AppError::upstream(format!("{action} failed: {e}")))?
                    .json::<Value>()
                    .await
                    .map_err(|e| AppError::upstream(format!("invalid {action} response: {e}")))?;
                Ok(response)
            }
            "get" => {
                let id = required_id(&arguments)?;
                self.authed(self.client.get(format!("{}/documents/{}", self.spec.server_url, id)))
                    .timeout(deadline.remaining())
                    .send()
                    .await
                    .map_err(|e| AppError::upstream(format!("get failed: {e}")))?
                    .json::<Value>()
                    .await
                    .map_err(|e| AppError::upstream(format!("invalid get response: {e}")))
            }
            "download" => {
                let id = required_id(&arguments)?;
                let metadata: DocMetadata = self
                    .authed(self.client.get(format!("{}/documents/{}/metadata", self.spec.server_url, id)))
                    .timeout(deadline.remaining())
                    .send()
                    .await
                    .map_err(|e| AppError::upstream(format!("metadata fetch failed: {e}")))?
                    .json()
                    .await
                    .map_err(|e| AppError::upstream(format!("invalid metadata response: {e}")))?;

                if metadata.size_bytes > self.spec.max_file_size {
                    return Err(AppError::new(
                        crate::errors::ErrorKind::PayloadTooLarge,
                        format!("document is {} bytes, exceeds max_file_size {}", metadata.size_bytes, self.spec.max_file_size),
                    ));
                }

                let bytes = self
                    .authed(self.client.get(&metadata.download_url))
                    .timeout(deadline.remaining())
                    .send()
                    .await
                    .map_err(|e| AppError::upstream(format!("download failed: {e}")))?
                    .bytes()
                    .await
                    .map_err(|e| AppError::upstream(format!("download read failed: {e}")))?;
                Ok(json!({
                    "size_bytes": bytes.len(),
                    "data": base64::engine::general_purpose::STANDARD.encode(&bytes),
                }))
            }
            other => Err(AppError::invalid_argument(
                format!("unknown document-store action '{other}'"),
                vec!["action".to_string()],
            )),
        }
    }
}

fn required_id(arguments: &Value) -> AppResult<&str> {
    arguments
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::invalid_argument("id is required", vec!["id".to_string()]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_relative_server_url() {
        let spec = DocumentStoreSpec {
            server_url: "not-a-url".to_string(),
            auth_kind: DocStoreAuth::OAuth,
            auth_secret: "token".to_string(),
            max_file_size: default_max_file_size(),
        };
        assert!(spec.validate().is_err());
    }
}
