// ABOUTME: Centralized error taxonomy shared by the registry, envelope, auth and OLAP layers.
// ABOUTME: Every failure mode in the system is classified into one of these closed variants.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Error Classification
//!
//! [`AppError`] is the single error type that crosses component boundaries. Each
//! [`ErrorKind`] maps deterministically to an HTTP status code (for the REST surface)
//! and a JSON-RPC error code (for the MCP dispatcher), and is recorded verbatim in
//! [`crate::tools::metrics::ToolMetrics`] and the audit log. Recovery is never
//! attempted inside the core: every variant here is fatal to the call that produced it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// The closed set of error classifications defined in the envelope design (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    InvalidCredentials,
    InvalidToken,
    InvalidKey,
    AccessDenied,
    ToolNotFound,
    ToolDisabled,
    QuotaExceeded,
    Timeout,
    PayloadTooLarge,
    UpstreamFailure,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// HTTP status code for the REST surface.
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::InvalidToken | Self::InvalidKey => {
                StatusCode::UNAUTHORIZED
            }
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::ToolNotFound => StatusCode::NOT_FOUND,
            Self::ToolDisabled | Self::Conflict => StatusCode::CONFLICT,
            Self::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamFailure => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON-RPC error code from the reserved application range (-32000..-32099),
    /// distinct from the protocol-level `-32700`/`-32601` codes the dispatcher
    /// uses directly for parse failures and unknown methods.
    #[must_use]
    pub const fn jsonrpc_code(self) -> i64 {
        match self {
            Self::InvalidArgument => -32_001,
            Self::InvalidCredentials => -32_002,
            Self::InvalidToken => -32_003,
            Self::InvalidKey => -32_004,
            Self::AccessDenied => -32_005,
            Self::ToolNotFound => -32_006,
            Self::ToolDisabled => -32_007,
            Self::QuotaExceeded => -32_008,
            Self::Timeout => -32_009,
            Self::PayloadTooLarge => -32_010,
            Self::UpstreamFailure => -32_011,
            Self::Conflict => -32_012,
            Self::Internal => -32_013,
        }
    }

    /// Whether a caller may legitimately retry the same call later.
    #[must_use]
    pub const fn retriable(self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }
}

/// The error type returned by every fallible operation in the core.
#[derive(Debug, Error, Clone)]
#[error("{kind:?}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    /// Offending JSON-Schema paths, populated only for `InvalidArgument`.
    pub field_paths: Vec<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_paths: Vec::new(),
        }
    }

    #[must_use]
    pub fn invalid_argument(message: impl Into<String>, field_paths: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidArgument,
            message: message.into(),
            field_paths,
        }
    }

    #[must_use]
    pub fn tool_not_found(name: &str) -> Self {
        Self::new(ErrorKind::ToolNotFound, format!("tool '{name}' not found"))
    }

    #[must_use]
    pub fn tool_disabled(name: &str) -> Self {
        Self::new(ErrorKind::ToolDisabled, format!("tool '{name}' is disabled"))
    }

    #[must_use]
    pub fn access_denied(principal: &str, tool: &str) -> Self {
        Self::new(
            ErrorKind::AccessDenied,
            format!("principal '{principal}' may not call '{tool}'"),
        )
    }

    #[must_use]
    pub fn quota_exceeded(retry_after_secs: u64) -> Self {
        Self::new(
            ErrorKind::QuotaExceeded,
            format!("rate limit exceeded, retry after {retry_after_secs}s"),
        )
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamFailure, message)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: ErrorKind,
    field_paths: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.kind.http_status();
        let mut response = axum::Json(ErrorBody {
            error: self.message,
            kind: self.kind,
            field_paths: self.field_paths,
        })
        .into_response();
        *response.status_mut() = status;
        if self.kind.retriable() {
            response
                .headers_mut()
                .insert("Retry-After", "60".parse().unwrap());
        }
        response
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
