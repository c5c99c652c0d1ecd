// ABOUTME: Structured, span-based logging setup driven by SAJHA_LOG (falling back to RUST_LOG).
// ABOUTME: Also provides bearer-token/API-key redaction for anything that reaches a log line.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Production logging configuration. Every request span is tagged with a
//! `request_id`, `principal_id`, and `tool` where applicable, matching the
//! audit fields recorded by [`crate::tools::envelope::ToolEnvelope`].

use std::env;
use std::io;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format for the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Initialize the global tracing subscriber. Idempotent-safe to call once at
/// process start; a second call is a logic error in the caller, not here.
pub fn init(level: &str, format: LogFormat) {
    let base = env::var("SAJHA_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| level.to_string());

    let env_filter = EnvFilter::new(&base)
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap())
        .add_directive("sqlx=warn".parse().unwrap())
        .add_directive("tower_http=info".parse().unwrap());

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_target(true)
                .with_writer(io::stdout)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .json();
            registry.with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_target(true)
                .with_writer(io::stdout)
                .with_span_events(FmtSpan::NONE);
            registry.with(layer).init();
        }
    }
}

/// Redact a bearer token or API key so it is safe to place in a log line or
/// audit record: keeps a short prefix for correlation, masks the rest.
#[must_use]
pub fn redact_credential(value: &str) -> String {
    if value.len() <= 8 {
        return "***".to_string();
    }
    format!("{}***({} chars)", &value[..8], value.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_credential_keeps_short_prefix() {
        let redacted = redact_credential("sk_live_abcdef1234567890");
        assert!(redacted.starts_with("sk_live_"));
        assert!(!redacted.contains("abcdef1234567890"));
    }

    #[test]
    fn redact_credential_handles_short_values() {
        assert_eq!(redact_credential("abc"), "***");
    }
}
