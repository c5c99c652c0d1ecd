// ABOUTME: OLAP executor - runs a built query through the single serialized connection and
// ABOUTME: applies the post-processing the query itself does not do (pivot totals, cohort
// ABOUTME: pivoting) per spec §4.7 and the single-connection discipline in spec §5.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::cohort::{self, CohortPivotRow, CohortRequest, CohortRow};
use super::pivot::PivotRequest;
use super::rollup::RollupRequest;
use super::semantic::SemanticModel;
use super::stats;
use super::timeseries::TimeSeriesRequest;
use super::window::WindowRequest;
use crate::errors::{AppError, AppResult};
use serde_json::Value;
use std::sync::RwLock;

/// Owns the semantic model and the single serialized connection the
/// columnar engine is queried through (spec §5: "the columnar analytical
/// engine is single-process; concurrent queries are serialised through a
/// single connection").
pub struct OlapExecutor {
    semantic: RwLock<SemanticModel>,
    pool: sqlx::SqlitePool,
}

impl OlapExecutor {
    #[must_use]
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            semantic: RwLock::new(SemanticModel::new()),
            pool,
        }
    }

    #[must_use]
    pub fn semantic(&self) -> &RwLock<SemanticModel> {
        &self.semantic
    }

    async fn run_query(&self, sql: &str) -> AppResult<Vec<serde_json::Map<String, Value>>> {
        use sqlx::{Column, Row};
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::upstream(format!("OLAP query failed: {e}")))?;
        let mut out = Vec::new();
        for row in &rows {
            let mut obj = serde_json::Map::new();
            for (i, column) in row.columns().iter().enumerate() {
                let value: Value = row
                    .try_get::<Option<f64>, _>(i)
                    .map(|v| v.map_or(Value::Null, |f| serde_json::json!(f)))
                    .or_else(|_| row.try_get::<Option<String>, _>(i).map(|v| v.map_or(Value::Null, Value::String)))
                    .unwrap_or(Value::Null);
                obj.insert(column.name().to_string(), value);
            }
            out.push(obj);
        }
        Ok(out)
    }

    /// Execute a pivot query, adding a synthetic grand-totals row (dimension
    /// positions set to the literal string `TOTAL`) when requested (spec
    /// §4.7 "Grand totals are computed by the executor, not the query").
    pub async fn execute_pivot(&self, request: &PivotRequest) -> AppResult<Vec<serde_json::Map<String, Value>>> {
        let sql = super::pivot::build_pivot_query(request);
        let mut rows = self.run_query(&sql).await?;
        if request.include_totals {
            rows.push(grand_totals_row(request, &rows));
        }
        Ok(rows)
    }

    pub async fn execute_rollup(&self, request: &RollupRequest) -> AppResult<Vec<serde_json::Map<String, Value>>> {
        self.run_query(&super::rollup::build_rollup_query(request)).await
    }

    pub async fn execute_window(&self, request: &WindowRequest) -> AppResult<Vec<serde_json::Map<String, Value>>> {
        self.run_query(&super::window::build_window_query(request)).await
    }

    pub async fn execute_timeseries(&self, request: &TimeSeriesRequest) -> AppResult<Vec<serde_json::Map<String, Value>>> {
        self.run_query(&super::timeseries::build_timeseries_query(request)).await
    }

    /// Run the cohort query and return both the raw rows and the executor's
    /// pivoted form (spec §4.7 "A pivoted form ... is produced by the executor").
    pub async fn execute_cohort(&self, request: &CohortRequest) -> AppResult<Vec<CohortPivotRow>> {
        let sql = cohort::build_cohort_query(request);
        let rows = self.fetch_cohort_rows(&sql).await?;
        cohort::pivot_cohort_rows(&rows)
    }

    /// Retention analysis: same pivot, sourced from `build_retention_query`
    /// (spec §4.7 "Retention analysis").
    pub async fn execute_retention(&self, request: &CohortRequest) -> AppResult<Vec<CohortPivotRow>> {
        let sql = cohort::build_retention_query(request);
        let rows = self.fetch_cohort_rows(&sql).await?;
        cohort::pivot_cohort_rows(&rows)
    }

    async fn fetch_cohort_rows(&self, sql: &str) -> AppResult<Vec<CohortRow>> {
        let raw = self.run_query(sql).await?;
        raw.into_iter()
            .map(|row| {
                Ok(CohortRow {
                    cohort: row.get("cohort").and_then(Value::as_str).unwrap_or_default().to_string(),
                    period_offset: row.get("period_offset").and_then(Value::as_i64).unwrap_or(0),
                    measure_value: row.get("measure_value").and_then(Value::as_f64).unwrap_or(0.0),
                })
            })
            .collect()
    }

    /// Statistics family operates directly on a fetched numeric column
    /// rather than generating further SQL (spec §4.7 "Statistics / Histogram
    /// / Correlation / Outliers" are computed over already-aggregated data).
    ///
    /// # Errors
    /// Returns `UpstreamFailure` if the source query fails.
    pub async fn fetch_numeric_column(&self, source_table: &str, expression: &str) -> AppResult<Vec<f64>> {
        let sql = format!("SELECT {expression} AS value FROM {source_table}");
        let rows = self.run_query(&sql).await?;
        Ok(rows.into_iter().filter_map(|r| r.get("value").and_then(Value::as_f64)).collect())
    }
}

fn grand_totals_row(request: &PivotRequest, rows: &[serde_json::Map<String, Value>]) -> serde_json::Map<String, Value> {
    let mut totals = serde_json::Map::new();
    for dim in &request.rows {
        totals.insert(dim.clone(), Value::String("TOTAL".to_string()));
    }
    if let Some(column) = &request.column {
        totals.insert(column.clone(), Value::String("TOTAL".to_string()));
    }
    for value in &request.values {
        let sum: f64 = rows.iter().filter_map(|r| r.get(&value.alias).and_then(Value::as_f64)).sum();
        totals.insert(value.alias.clone(), serde_json::json!(sum));
    }
    totals
}

pub use stats::{correlation_matrix, distribution, histogram, outliers, percentiles, summary, OutlierMethod};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::olap::pivot::PivotValue;

    #[test]
    fn grand_totals_row_sums_each_measure_alias() {
        let request = PivotRequest {
            source_table: "sales".to_string(),
            rows: vec!["region".to_string()],
            column: None,
            values: vec![PivotValue {
                measure_expression: "amount".to_string(),
                aggregation: "SUM".to_string(),
                alias: "total".to_string(),
            }],
            filters: Vec::new(),
            limit: None,
            include_totals: true,
            include_subtotals: false,
        };
        let mut row1 = serde_json::Map::new();
        row1.insert("region".to_string(), Value::String("east".to_string()));
        row1.insert("total".to_string(), serde_json::json!(10.0));
        let mut row2 = serde_json::Map::new();
        row2.insert("region".to_string(), Value::String("west".to_string()));
        row2.insert("total".to_string(), serde_json::json!(20.0));

        let totals = grand_totals_row(&request, &[row1, row2]);
        assert_eq!(totals["region"], "TOTAL");
        assert_eq!(totals["total"], 30.0);
    }
}
