// ABOUTME: Cohort/Retention query builder and executor-side pivot (spec §4.7 "Cohort / Retention"),
// ABOUTME: period offsets computed with SQLite's strftime/julianday arithmetic.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::filter::{render_where_clause, Filter};
use super::timeseries::Grain;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortAggregation {
    CountDistinct,
    Sum,
    Avg,
}

impl CohortAggregation {
    fn render(self, expression: &str) -> String {
        match self {
            Self::CountDistinct => format!("COUNT(DISTINCT {expression})"),
            Self::Sum => format!("SUM({expression})"),
            Self::Avg => format!("AVG({expression})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortRequest {
    pub source_table: String,
    pub cohort_dimension: String,
    pub time_dimension: String,
    pub entity_dimension: String,
    pub measure_expression: String,
    pub aggregation: CohortAggregation,
    pub grain: Grain,
    #[serde(default = "default_period_horizon")]
    pub period_horizon: u32,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

fn default_period_horizon() -> u32 {
    12
}

/// Number of whole `grain` units between `activity` and `cohort`, using only
/// SQLite date functions (no `EXTRACT`/`age` in SQLite's grammar).
fn period_offset_expr(grain: Grain, activity: &str, cohort: &str) -> String {
    match grain {
        Grain::Year => format!(
            "(CAST(strftime('%Y', {activity}) AS INTEGER) - CAST(strftime('%Y', {cohort}) AS INTEGER))"
        ),
        Grain::Quarter => format!(
            "(((CAST(strftime('%Y', {activity}) AS INTEGER) - CAST(strftime('%Y', {cohort}) AS INTEGER)) * 12 + \
              (CAST(strftime('%m', {activity}) AS INTEGER) - CAST(strftime('%m', {cohort}) AS INTEGER))) / 3)"
        ),
        Grain::Month => format!(
            "((CAST(strftime('%Y', {activity}) AS INTEGER) - CAST(strftime('%Y', {cohort}) AS INTEGER)) * 12 + \
              (CAST(strftime('%m', {activity}) AS INTEGER) - CAST(strftime('%m', {cohort}) AS INTEGER)))"
        ),
        Grain::Week => format!("CAST((julianday({activity}) - julianday({cohort})) / 7 AS INTEGER)"),
        Grain::Day => format!("CAST(julianday({activity}) - julianday({cohort}) AS INTEGER)"),
        Grain::Hour => format!("CAST((julianday({activity}) - julianday({cohort})) * 24 AS INTEGER)"),
    }
}

/// Build the SQL producing one row per `(cohort, period_offset)` with the
/// raw aggregated measure (spec §4.7 "Cohort"). Retention percentage
/// relative to period 0 is computed by `pivot_cohort_rows`, not the query.
#[must_use]
pub fn build_cohort_query(request: &CohortRequest) -> String {
    let where_clause = render_where_clause(&request.filters).map(|c| format!(" WHERE {c}")).unwrap_or_default();
    let measure_expr = format!("CAST({} AS REAL)", request.aggregation.render(&request.measure_expression));
    let offset_expr = period_offset_expr(request.grain, "activity_period", "cohort");
    format!(
        "WITH base AS (SELECT {cohort} AS cohort, {time} AS activity_period, {entity}, {measure_col} \
         FROM {table}{where_clause}) \
         SELECT cohort, \
                {offset_expr} AS period_offset, \
                {measure} AS measure_value \
         FROM base \
         GROUP BY cohort, period_offset \
         HAVING {offset_expr} <= {horizon} AND {offset_expr} >= 0 \
         ORDER BY cohort, period_offset",
        cohort = request.cohort_dimension,
        time = request.time_dimension,
        entity = request.entity_dimension,
        measure_col = request.measure_expression,
        table = request.source_table,
        measure = measure_expr,
        horizon = request.period_horizon,
    )
}

/// Retention analysis is the cohort specialisation where the entity's
/// *first activity* is taken as its cohort, and the measure is
/// distinct-entity count (spec §4.7 "Retention analysis").
#[must_use]
pub fn build_retention_query(request: &CohortRequest) -> String {
    let where_clause = render_where_clause(&request.filters).map(|c| format!(" WHERE {c}")).unwrap_or_default();
    let offset_expr = period_offset_expr(request.grain, "activity.activity_period", "first_activity.cohort");
    format!(
        "WITH activity AS (SELECT {entity}, {time} AS activity_period FROM {table}{where_clause}), \
         first_activity AS (SELECT {entity}, MIN(activity_period) AS cohort FROM activity GROUP BY {entity}) \
         SELECT first_activity.cohort AS cohort, \
                {offset_expr} AS period_offset, \
                CAST(COUNT(DISTINCT activity.{entity}) AS REAL) AS measure_value \
         FROM activity \
         JOIN first_activity ON activity.{entity} = first_activity.{entity} \
         GROUP BY cohort, period_offset \
         HAVING {offset_expr} <= {horizon} AND {offset_expr} >= 0 \
         ORDER BY cohort, period_offset",
        entity = request.entity_dimension,
        time = request.time_dimension,
        table = request.source_table,
        horizon = request.period_horizon,
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortRow {
    pub cohort: String,
    pub period_offset: i64,
    pub measure_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CohortPivotRow {
    pub cohort: String,
    pub cohort_size: f64,
    /// `period_offset -> (raw_measure, retention_percentage)`, percentage
    /// relative to `cohort_size` (the cohort's period-0 value).
    pub periods: BTreeMap<i64, (f64, f64)>,
}

/// Pivot raw `(cohort, period_offset, measure_value)` rows into one row per
/// cohort carrying every period offset's raw value and retention percentage
/// relative to period 0 (spec §4.7: "A pivoted form ... is produced by the
/// executor").
///
/// # Errors
/// Returns `InvalidArgument` if a cohort has no period-0 row to normalise against.
pub fn pivot_cohort_rows(rows: &[CohortRow]) -> AppResult<Vec<CohortPivotRow>> {
    let mut by_cohort: BTreeMap<String, BTreeMap<i64, f64>> = BTreeMap::new();
    for row in rows {
        by_cohort.entry(row.cohort.clone()).or_default().insert(row.period_offset, row.measure_value);
    }

    let mut pivoted = Vec::new();
    for (cohort, periods) in by_cohort {
        let cohort_size = *periods
            .get(&0)
            .ok_or_else(|| AppError::invalid_argument(format!("cohort '{cohort}' has no period-0 row"), vec!["cohort".to_string()]))?;
        let mut out_periods = BTreeMap::new();
        for (offset, value) in periods {
            let retention_pct = if cohort_size == 0.0 { 0.0 } else { 100.0 * value / cohort_size };
            out_periods.insert(offset, (value, retention_pct));
        }
        pivoted.push(CohortPivotRow {
            cohort,
            cohort_size,
            periods: out_periods,
        });
    }
    Ok(pivoted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_computes_retention_relative_to_period_zero() {
        let rows = vec![
            CohortRow { cohort: "2026-01".to_string(), period_offset: 0, measure_value: 100.0 },
            CohortRow { cohort: "2026-01".to_string(), period_offset: 1, measure_value: 40.0 },
        ];
        let pivoted = pivot_cohort_rows(&rows).unwrap();
        assert_eq!(pivoted.len(), 1);
        assert_eq!(pivoted[0].cohort_size, 100.0);
        assert_eq!(pivoted[0].periods[&1].1, 40.0);
    }

    #[test]
    fn pivot_errors_when_period_zero_missing() {
        let rows = vec![CohortRow { cohort: "2026-01".to_string(), period_offset: 1, measure_value: 40.0 }];
        let err = pivot_cohort_rows(&rows).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::InvalidArgument);
    }

    fn request() -> CohortRequest {
        CohortRequest {
            source_table: "events".to_string(),
            cohort_dimension: "signup_month".to_string(),
            time_dimension: "event_month".to_string(),
            entity_dimension: "user_id".to_string(),
            measure_expression: "user_id".to_string(),
            aggregation: CohortAggregation::CountDistinct,
            grain: Grain::Month,
            period_horizon: 12,
            filters: Vec::new(),
        }
    }

    #[test]
    fn retention_query_derives_cohort_from_first_activity() {
        let sql = build_retention_query(&request());
        assert!(sql.contains("first_activity"));
        assert!(sql.contains("MIN(activity_period)"));
        assert!(!sql.to_uppercase().contains("EXTRACT"));
        assert!(!sql.contains("age("));
    }

    #[test]
    fn cohort_query_uses_strftime_not_extract_age() {
        let sql = build_cohort_query(&request());
        assert!(sql.contains("strftime('%Y'"));
        assert!(!sql.to_uppercase().contains("EXTRACT"));
        assert!(!sql.contains("age("));
    }

    #[tokio::test]
    async fn cohort_query_executes_and_period_zero_equals_cohort_size() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE events (signup_month TEXT, event_month TEXT, user_id TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        let rows_data = [
            ("2024-01-01", "2024-01-15", "u1"),
            ("2024-01-01", "2024-01-20", "u2"),
            ("2024-01-01", "2024-01-25", "u3"),
            ("2024-01-01", "2024-02-10", "u1"),
        ];
        for (signup, event, user) in rows_data {
            sqlx::query("INSERT INTO events (signup_month, event_month, user_id) VALUES (?, ?, ?)")
                .bind(signup)
                .bind(event)
                .bind(user)
                .execute(&pool)
                .await
                .unwrap();
        }

        let sql = build_cohort_query(&request());
        let raw_rows = sqlx::query(&sql).fetch_all(&pool).await.unwrap();
        use sqlx::Row;
        let cohort_rows: Vec<CohortRow> = raw_rows
            .iter()
            .map(|r| CohortRow {
                cohort: r.get::<String, _>("cohort"),
                period_offset: r.get::<i64, _>("period_offset"),
                measure_value: r.get::<f64, _>("measure_value"),
            })
            .collect();
        let pivoted = pivot_cohort_rows(&cohort_rows).unwrap();
        assert_eq!(pivoted.len(), 1);
        assert_eq!(pivoted[0].cohort_size, 3.0);
        assert!((pivoted[0].periods[&1].1 - (100.0 / 3.0)).abs() < 1e-9);
    }
}
