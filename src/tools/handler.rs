// ABOUTME: ToolHandler - the MCP dispatcher's single capability set: {schema(), execute()}.
// ABOUTME: Every HandlerKind (native or Studio-generated) implements this one trait (spec §9).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::AppResult;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Deadline a handler must cooperatively poll at every suspension point
/// (outbound HTTP, DB round-trip, subprocess wait) per spec §5.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: tokio::time::Instant,
}

impl Deadline {
    #[must_use]
    pub fn after(duration: Duration) -> Self {
        Self {
            expires_at: tokio::time::Instant::now() + duration,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(tokio::time::Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        tokio::time::Instant::now() >= self.expires_at
    }
}

/// The runtime pairing of a `ToolDefinition` with an executable. A handler is
/// owned exclusively by the registry; no external reference outlives an
/// unregister (spec §3).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the handler against validated arguments, honouring `deadline`.
    ///
    /// # Errors
    /// Returns any classified `AppError`; `Timeout` specifically when
    /// `deadline` is exceeded before completion.
    async fn execute(&self, arguments: Value, deadline: Deadline) -> AppResult<Value>;
}

/// Run a cancellable future against a deadline, returning `Timeout` if the
/// future does not resolve in time. Generated handlers route every
/// suspension point (HTTP call, DB round-trip, subprocess wait) through this.
///
/// # Errors
/// Propagates the inner future's error, or returns `Timeout`.
pub async fn run_with_deadline<F, T>(deadline: Deadline, fut: F) -> AppResult<T>
where
    F: std::future::Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(deadline.remaining(), fut).await {
        Ok(result) => result,
        Err(_) => Err(crate::errors::AppError::new(
            crate::errors::ErrorKind::Timeout,
            "handler exceeded its deadline",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_with_deadline_times_out_slow_futures() {
        let deadline = Deadline::after(Duration::from_millis(10));
        let result: AppResult<()> = run_with_deadline(deadline, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert_eq!(result.unwrap_err().kind, crate::errors::ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn run_with_deadline_passes_through_fast_futures() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let result = run_with_deadline(deadline, async { Ok::<_, crate::errors::AppError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
