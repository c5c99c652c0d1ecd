// ABOUTME: AuditRecord - one immutable line per completed tool call, for the audit log (spec §3).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::ErrorKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The outcome classification of one completed call, recorded regardless of
/// success so denial/quota/timeout events are auditable too.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure { kind: ErrorKind, message: String },
}

/// One record per `ToolEnvelope` run, independent of whether any pipeline
/// stage rejected the call (spec §4.1 "record" stage).
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub tool_name: String,
    pub principal_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    #[must_use]
    pub fn success(tool_name: impl Into<String>, principal_id: impl Into<String>, started_at: DateTime<Utc>, duration_ms: u128) -> Self {
        Self {
            tool_name: tool_name.into(),
            principal_id: principal_id.into(),
            started_at,
            duration_ms,
            outcome: AuditOutcome::Success,
        }
    }

    #[must_use]
    pub fn failure(
        tool_name: impl Into<String>,
        principal_id: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u128,
        error: &crate::errors::AppError,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            principal_id: principal_id.into(),
            started_at,
            duration_ms,
            outcome: AuditOutcome::Failure {
                kind: error.kind,
                message: error.message.clone(),
            },
        }
    }
}

/// An append-only, in-memory ring of the most recent audit records. A real
/// deployment would ship these to a log sink; the registry keeps a bounded
/// tail so admins can inspect recent activity without a separate store.
pub struct AuditLog {
    capacity: usize,
    records: std::sync::Mutex<std::collections::VecDeque<AuditRecord>>,
}

impl AuditLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: std::sync::Mutex::new(std::collections::VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, record: AuditRecord) {
        let mut records = self.records.lock().expect("audit log lock poisoned");
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let records = self.records.lock().expect("audit log lock poisoned");
        records.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_log_evicts_oldest_past_capacity() {
        let log = AuditLog::new(2);
        log.push(AuditRecord::success("a", "p", Utc::now(), 1));
        log.push(AuditRecord::success("b", "p", Utc::now(), 1));
        log.push(AuditRecord::success("c", "p", Utc::now(), 1));
        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tool_name, "c");
        assert_eq!(recent[1].tool_name, "b");
    }
}
