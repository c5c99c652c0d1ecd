// ABOUTME: Python-studio generator - implemented as the prohibition variant per design note 2:
// ABOUTME: the wire/registry taxonomy still carries StudioUser, but nothing ever executes it.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use crate::tools::handler::{Deadline, ToolHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Carries only enough of the original document shape to round-trip an
/// existing on-disk record (e.g. from an older deployment); no field here is
/// ever compiled or executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioUserSpec {
    pub source: String,
    pub annotated_function: Option<String>,
}

impl StudioUserSpec {
    /// Always rejects: arbitrary user-submitted code execution is excluded
    /// from this rewrite (spec §9 design note 2).
    ///
    /// # Errors
    /// Always returns `InvalidArgument`.
    pub fn validate(&self) -> AppResult<()> {
        Err(AppError::invalid_argument(
            "studio-user (arbitrary Python source) tools are not supported by this deployment",
            vec!["source".to_string()],
        ))
    }
}

pub struct StudioUserHandler;

#[async_trait]
impl ToolHandler for StudioUserHandler {
    async fn execute(&self, _arguments: Value, _deadline: Deadline) -> AppResult<Value> {
        Err(AppError::invalid_argument(
            "studio-user (arbitrary Python source) tools are not supported by this deployment",
            vec!["source".to_string()],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_validation_always_rejects() {
        let spec = StudioUserSpec {
            source: "def f(): pass".to_string(),
            annotated_function: None,
        };
        assert!(spec.validate().is_err());
    }

    #[tokio::test]
    async fn handler_always_rejects_execution() {
        let handler = StudioUserHandler;
        let deadline = Deadline::after(std::time::Duration::from_secs(1));
        let err = handler.execute(Value::Null, deadline).await.unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::InvalidArgument);
    }
}
