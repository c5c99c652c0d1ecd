// ABOUTME: REST generator - calls an upstream HTTP endpoint, decoding the response per format.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use crate::tools::handler::{Deadline, ToolHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    fn into_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Csv,
    Xml,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvOptions {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default)]
    pub skip_rows: usize,
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestAuth {
    ApiKeyHeader,
    Basic,
}

/// Declarative spec for one REST-backed tool (spec §4.6 "REST generator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestSpec {
    pub endpoint_url: String,
    pub method: HttpMethod,
    pub response_format: ResponseFormat,
    pub csv_options: Option<CsvOptions>,
    pub auth: Option<RestAuth>,
    pub auth_secret: Option<String>,
    pub timeout_seconds: u64,
}

impl RestSpec {
    /// Reject specs that cannot plausibly be rendered: a relative URL, or
    /// CSV options on a non-CSV format (spec §4.6 validate stage).
    ///
    /// # Errors
    /// Returns `InvalidArgument` with the offending field path.
    pub fn validate(&self) -> AppResult<()> {
        if !(self.endpoint_url.starts_with("http://") || self.endpoint_url.starts_with("https://")) {
            return Err(AppError::invalid_argument(
                "endpoint_url must be an absolute http(s) URL",
                vec!["endpoint_url".to_string()],
            ));
        }
        if self.csv_options.is_some() && self.response_format != ResponseFormat::Csv {
            return Err(AppError::invalid_argument(
                "csv_options is only meaningful with response_format = csv",
                vec!["csv_options".to_string()],
            ));
        }
        Ok(())
    }
}

pub struct RestHandler {
    spec: RestSpec,
    client: reqwest::Client,
}

impl RestHandler {
    #[must_use]
    pub fn new(spec: RestSpec) -> Self {
        Self {
            spec,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ToolHandler for RestHandler {
    async fn execute(&self, arguments: Value, deadline: Deadline) -> AppResult<Value> {
        let request = self
            .client
            .request(self.spec.method.into_reqwest(), &self.spec.endpoint_url)
            .timeout(deadline.remaining())
            .json(&arguments);

        let request = match self.spec.auth {
            Some(RestAuth::ApiKeyHeader) => request.header("X-API-Key", self.spec.auth_secret.as_deref().unwrap_or_default()),
            Some(RestAuth::Basic) => {
                let secret = self.spec.auth_secret.as_deref().unwrap_or_default();
                let (user, pass) = secret.split_once(':').unwrap_or((secret, ""));
                request.basic_auth(user, Some(pass))
            }
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("REST call failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::upstream(format!("failed reading REST response body: {e}")))?;
        if !status.is_success() {
            return Err(AppError::upstream(format!("upstream returned HTTP {status}: {body}")));
        }

        decode_body(&body, self.spec.response_format, self.spec.csv_options.as_ref())
    }
}

fn decode_body(body: &str, format: ResponseFormat, csv_options: Option<&CsvOptions>) -> AppResult<Value> {
    match format {
        ResponseFormat::Json => serde_json::from_str(body).map_err(|e| AppError::upstream(format!("invalid JSON response: {e}"))),
        ResponseFormat::Text => Ok(Value::String(body.to_string())),
        ResponseFormat::Xml => {
            let mut reader = quick_xml::Reader::from_str(body);
            reader.config_mut().trim_text(true);
            let mut rows = Vec::new();
            loop {
                match reader.read_event() {
                    Ok(quick_xml::events::Event::Text(t)) => {
                        let text = t.unescape().map_err(|e| AppError::upstream(format!("invalid XML: {e}")))?;
                        if !text.trim().is_empty() {
                            rows.push(Value::String(text.to_string()));
                        }
                    }
                    Ok(quick_xml::events::Event::Eof) => break,
                    Err(e) => return Err(AppError::upstream(format!("invalid XML: {e}"))),
                    _ => {}
                }
            }
            Ok(Value::Array(rows))
        }
        ResponseFormat::Csv => {
            let opts = csv_options.cloned().unwrap_or(CsvOptions {
                delimiter: ',',
                has_header: true,
                skip_rows: 0,
            });
            let skipped: String = body.lines().skip(opts.skip_rows).collect::<Vec<_>>().join("\n");
            let mut reader = csv::ReaderBuilder::new()
                .delimiter(opts.delimiter as u8)
                .has_headers(opts.has_header)
                .from_reader(skipped.as_bytes());
            let headers: Vec<String> = if opts.has_header {
                reader
                    .headers()
                    .map_err(|e| AppError::upstream(format!("invalid CSV headers: {e}")))?
                    .iter()
                    .map(str::to_string)
                    .collect()
            } else {
                Vec::new()
            };
            let mut rows = Vec::new();
            for record in reader.records() {
                let record = record.map_err(|e| AppError::upstream(format!("invalid CSV row: {e}")))?;
                if headers.is_empty() {
                    rows.push(Value::Array(record.iter().map(|f| Value::String(f.to_string())).collect()));
                } else {
                    let mut obj = serde_json::Map::new();
                    for (key, value) in headers.iter().zip(record.iter()) {
                        obj.insert(key.clone(), Value::String(value.to_string()));
                    }
                    rows.push(Value::Object(obj));
                }
            }
            Ok(Value::Array(rows))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_relative_urls() {
        let spec = RestSpec {
            endpoint_url: "/relative/path".to_string(),
            method: HttpMethod::Get,
            response_format: ResponseFormat::Json,
            csv_options: None,
            auth: None,
            auth_secret: None,
            timeout_seconds: 30,
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn validate_rejects_csv_options_on_json_format() {
        let spec = RestSpec {
            endpoint_url: "https://example.com".to_string(),
            method: HttpMethod::Get,
            response_format: ResponseFormat::Json,
            csv_options: Some(CsvOptions {
                delimiter: ',',
                has_header: true,
                skip_rows: 0,
            }),
            auth: None,
            auth_secret: None,
            timeout_seconds: 30,
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn decode_csv_with_header_produces_objects() {
        let value = decode_body(
            "name,age\nalice,30\nbob,40\n",
            ResponseFormat::Csv,
            Some(&CsvOptions {
                delimiter: ',',
                has_header: true,
                skip_rows: 0,
            }),
        )
        .unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "alice");
    }
}
