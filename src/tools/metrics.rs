// ABOUTME: ToolMetrics - per-tool execution counters the registry exposes and can export as CSV.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::ErrorKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Cumulative execution statistics for one tool (spec §3 invariant:
/// `average_duration == total_duration / execution_count` when `execution_count > 0`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolMetrics {
    pub execution_count: u64,
    #[serde(with = "duration_millis")]
    pub total_duration: Duration,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub error_count_by_kind: HashMap<String, u64>,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}

impl ToolMetrics {
    /// Record one completed call. `outcome` is `None` on success.
    pub fn record(&mut self, duration: Duration, outcome: Option<ErrorKind>) {
        self.execution_count += 1;
        self.total_duration += duration;
        self.last_execution_at = Some(Utc::now());
        if let Some(kind) = outcome {
            *self
                .error_count_by_kind
                .entry(format!("{kind:?}"))
                .or_insert(0) += 1;
        }
    }

    /// Mean call duration, or zero when no calls have been recorded yet.
    #[must_use]
    pub fn average_duration(&self) -> Duration {
        if self.execution_count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / u32::try_from(self.execution_count.min(u64::from(u32::MAX))).unwrap_or(u32::MAX)
        }
    }

    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.error_count_by_kind.values().sum()
    }
}

/// One row of `ExportMetricsCSV` input: a tool's definition fields paired
/// with its cumulative metrics.
pub struct ToolMetricsRow<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub enabled: bool,
    pub metrics: &'a ToolMetrics,
    pub description: &'a str,
}

/// Render the registry's tools as CSV with spec §4.1 `ExportMetricsCSV`'s
/// exact "deterministic column order: name, version, enabled,
/// execution_count, average_duration, last_execution, description".
#[must_use]
pub fn to_csv(rows: &[ToolMetricsRow<'_>]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "name",
            "version",
            "enabled",
            "execution_count",
            "average_duration",
            "last_execution",
            "description",
        ])
        .expect("writing a static header never fails");
    for row in rows {
        writer
            .write_record([
                row.name,
                row.version,
                &row.enabled.to_string(),
                &row.metrics.execution_count.to_string(),
                &row.metrics.average_duration().as_millis().to_string(),
                &row.metrics
                    .last_execution_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                row.description,
            ])
            .expect("writing primitive fields never fails");
    }
    String::from_utf8(writer.into_inner().expect("in-memory writer never errors on flush"))
        .expect("csv writer only emits valid UTF-8 for UTF-8 input")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_duration_matches_invariant() {
        let mut metrics = ToolMetrics::default();
        metrics.record(Duration::from_millis(100), None);
        metrics.record(Duration::from_millis(300), Some(ErrorKind::Timeout));
        assert_eq!(metrics.execution_count, 2);
        assert_eq!(metrics.average_duration(), Duration::from_millis(200));
        assert_eq!(metrics.error_count(), 1);
    }

    #[test]
    fn average_duration_is_zero_with_no_calls() {
        assert_eq!(ToolMetrics::default().average_duration(), Duration::ZERO);
    }

    #[test]
    fn csv_export_includes_header_and_rows() {
        let mut metrics = ToolMetrics::default();
        metrics.record(Duration::from_millis(50), None);
        let csv = to_csv(&[ToolMetricsRow {
            name: "echo",
            version: "1.0.0",
            enabled: true,
            metrics: &metrics,
            description: "echoes input",
        }]);
        assert!(csv.starts_with("name,version,enabled,execution_count,average_duration,last_execution,description"));
        assert!(csv.contains("echo,1.0.0,true,1,50"));
        assert!(csv.contains("echoes input"));
    }
}
