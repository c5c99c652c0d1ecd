// ABOUTME: Script generator - runs a stored script body under an interpreter with a hard deadline.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use crate::tools::handler::{Deadline, ToolHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Shell,
    Bash,
    Python,
    Node,
    Perl,
    Ruby,
    Powershell,
}

impl ScriptKind {
    fn interpreter(self) -> &'static str {
        match self {
            Self::Shell => "sh",
            Self::Bash => "bash",
            Self::Python => "python3",
            Self::Node => "node",
            Self::Perl => "perl",
            Self::Ruby => "ruby",
            Self::Powershell => "pwsh",
        }
    }

    fn shebang(self) -> &'static str {
        match self {
            Self::Shell => "#!/bin/sh",
            Self::Bash => "#!/usr/bin/env bash",
            Self::Python => "#!/usr/bin/env python3",
            Self::Node => "#!/usr/bin/env node",
            Self::Perl => "#!/usr/bin/env perl",
            Self::Ruby => "#!/usr/bin/env ruby",
            Self::Powershell => "#!/usr/bin/env pwsh",
        }
    }
}

/// Declarative spec for a script-backed tool (spec §4.6 "Script generator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSpec {
    pub kind: ScriptKind,
    pub body: String,
    pub timeout_seconds: u64,
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub env_overlay: HashMap<String, String>,
}

impl ScriptSpec {
    /// Reject an empty body; everything else is validated at runtime by the
    /// interpreter itself (spec §4.6 validate stage).
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `body` is empty.
    pub fn validate(&self) -> AppResult<()> {
        if self.body.trim().is_empty() {
            return Err(AppError::invalid_argument("script body must not be empty", vec!["body".to_string()]));
        }
        Ok(())
    }
}

pub struct ScriptHandler {
    spec: ScriptSpec,
}

impl ScriptHandler {
    #[must_use]
    pub fn new(spec: ScriptSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl ToolHandler for ScriptHandler {
    async fn execute(&self, arguments: Value, deadline: Deadline) -> AppResult<Value> {
        let args: Vec<String> = match arguments {
            Value::Array(items) => items
                .into_iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect(),
            Value::Null => Vec::new(),
            other => vec![other.to_string()],
        };

        let mut contents = String::new();
        contents.push_str(self.spec.kind.shebang());
        contents.push('\n');
        contents.push_str(&self.spec.body);

        let script_file = tempfile::Builder::new()
            .suffix(".script")
            .tempfile()
            .map_err(|e| AppError::internal(format!("failed creating script file: {e}")))?;
        std::fs::write(script_file.path(), &contents).map_err(|e| AppError::internal(format!("failed writing script: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(script_file.path())
                .map_err(|e| AppError::internal(format!("failed reading script metadata: {e}")))?
                .permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(script_file.path(), perms).map_err(|e| AppError::internal(format!("failed chmod: {e}")))?;
        }

        let mut command = Command::new(self.spec.kind.interpreter());
        command.arg(script_file.path()).args(&args);
        if let Some(dir) = &self.spec.working_directory {
            command.current_dir(dir);
        }
        for (key, value) in &self.spec.env_overlay {
            command.env(key, value);
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        command.kill_on_drop(true);

        let run = async {
            let child = command.spawn().map_err(|e| AppError::upstream(format!("failed to spawn interpreter: {e}")))?;
            child
                .wait_with_output()
                .await
                .map_err(|e| AppError::upstream(format!("failed waiting on interpreter: {e}")))
        };

        match tokio::time::timeout(deadline.remaining(), run).await {
            Ok(Ok(output)) => Ok(json!({
                "stdout": String::from_utf8_lossy(&output.stdout),
                "stderr": String::from_utf8_lossy(&output.stderr),
                "exit_code": output.status.code().unwrap_or(-1),
                "success": output.status.success(),
            })),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(AppError::new(crate::errors::ErrorKind::Timeout, "script exceeded its timeout")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_body() {
        let spec = ScriptSpec {
            kind: ScriptKind::Bash,
            body: "   ".to_string(),
            timeout_seconds: 5,
            working_directory: None,
            env_overlay: HashMap::new(),
        };
        assert!(spec.validate().is_err());
    }

    #[tokio::test]
    async fn timed_out_script_reports_classified_timeout() {
        let spec = ScriptSpec {
            kind: ScriptKind::Bash,
            body: "sleep 5".to_string(),
            timeout_seconds: 1,
            working_directory: None,
            env_overlay: HashMap::new(),
        };
        let handler = ScriptHandler::new(spec);
        let deadline = Deadline::after(std::time::Duration::from_millis(50));
        let err = handler.execute(Value::Null, deadline).await.unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Timeout);
    }
}
