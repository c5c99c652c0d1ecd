// ABOUTME: Window function query builder - one base CTE plus an outer SELECT of window
// ABOUTME: expressions, one per requested calculation (spec §4.7 "Window").
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::filter::{render_where_clause, Filter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowCalc {
    RunningTotal { measure: String, alias: String },
    RunningAverage { measure: String, alias: String },
    RunningMin { measure: String, alias: String },
    RunningMax { measure: String, alias: String },
    RunningCount { measure: String, alias: String },
    MovingAverage { measure: String, window_size: u32, alias: String },
    MovingSum { measure: String, window_size: u32, alias: String },
    Rank { alias: String },
    DenseRank { alias: String },
    RowNumber { alias: String },
    PercentRank { alias: String },
    Ntile { buckets: u32, alias: String },
    CumeDist { alias: String },
    Lag { measure: String, offset: Option<u32>, default: Option<serde_json::Value>, alias: String },
    Lead { measure: String, offset: Option<u32>, default: Option<serde_json::Value>, alias: String },
    FirstValue { measure: String, alias: String },
    LastValue { measure: String, alias: String },
    PercentOfTotal { measure: String, alias: String },
    PercentOfPartition { measure: String, alias: String },
    DifferenceFromPrevious { measure: String, alias: String },
    PercentChange { measure: String, alias: String },
    DifferenceFromFirst { measure: String, alias: String },
    DifferenceFromAverage { measure: String, alias: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRequest {
    pub source_table: String,
    pub dimensions: Vec<String>,
    pub measures: Vec<(String, String, String)>, // (expression, aggregation, alias)
    pub partition_by: Vec<String>,
    pub order_by: Vec<String>,
    pub calcs: Vec<WindowCalc>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

fn partition_clause(partition_by: &[String], order_by: &[String], frame: &str) -> String {
    let partition = if partition_by.is_empty() {
        String::new()
    } else {
        format!("PARTITION BY {} ", partition_by.join(", "))
    };
    let order = if order_by.is_empty() {
        String::new()
    } else {
        format!("ORDER BY {} ", order_by.join(", "))
    };
    format!("OVER ({partition}{order}{frame})").replace("  ", " ")
}

fn render_calc(calc: &WindowCalc, partition_by: &[String], order_by: &[String]) -> (String, String) {
    let unbounded = partition_clause(partition_by, order_by, "ROWS UNBOUNDED PRECEDING");
    let full_partition = partition_clause(partition_by, &[], "");
    match calc {
        WindowCalc::RunningTotal { measure, alias } => (format!("SUM({measure}) {unbounded}"), alias.clone()),
        WindowCalc::RunningAverage { measure, alias } => (format!("AVG({measure}) {unbounded}"), alias.clone()),
        WindowCalc::RunningMin { measure, alias } => (format!("MIN({measure}) {unbounded}"), alias.clone()),
        WindowCalc::RunningMax { measure, alias } => (format!("MAX({measure}) {unbounded}"), alias.clone()),
        WindowCalc::RunningCount { measure, alias } => (format!("COUNT({measure}) {unbounded}"), alias.clone()),
        WindowCalc::MovingAverage { measure, window_size, alias } => {
            let frame = partition_clause(partition_by, order_by, &format!("ROWS {} PRECEDING", window_size.saturating_sub(1)));
            (format!("AVG({measure}) {frame}"), alias.clone())
        }
        WindowCalc::MovingSum { measure, window_size, alias } => {
            let frame = partition_clause(partition_by, order_by, &format!("ROWS {} PRECEDING", window_size.saturating_sub(1)));
            (format!("SUM({measure}) {frame}"), alias.clone())
        }
        WindowCalc::Rank { alias } => (format!("RANK() {}", partition_clause(partition_by, order_by, "")), alias.clone()),
        WindowCalc::DenseRank { alias } => (format!("DENSE_RANK() {}", partition_clause(partition_by, order_by, "")), alias.clone()),
        WindowCalc::RowNumber { alias } => (format!("ROW_NUMBER() {}", partition_clause(partition_by, order_by, "")), alias.clone()),
        WindowCalc::PercentRank { alias } => (format!("PERCENT_RANK() {}", partition_clause(partition_by, order_by, "")), alias.clone()),
        WindowCalc::Ntile { buckets, alias } => (format!("NTILE({buckets}) {}", partition_clause(partition_by, order_by, "")), alias.clone()),
        WindowCalc::CumeDist { alias } => (format!("CUME_DIST() {}", partition_clause(partition_by, order_by, "")), alias.clone()),
        WindowCalc::Lag { measure, offset, default, alias } => {
            let offset = offset.unwrap_or(1);
            let default = default.as_ref().map(super::filter::format_value).unwrap_or_else(|| "NULL".to_string());
            (
                format!("LAG({measure}, {offset}, {default}) {}", partition_clause(partition_by, order_by, "")),
                alias.clone(),
            )
        }
        WindowCalc::Lead { measure, offset, default, alias } => {
            let offset = offset.unwrap_or(1);
            let default = default.as_ref().map(super::filter::format_value).unwrap_or_else(|| "NULL".to_string());
            (
                format!("LEAD({measure}, {offset}, {default}) {}", partition_clause(partition_by, order_by, "")),
                alias.clone(),
            )
        }
        WindowCalc::FirstValue { measure, alias } => (format!("FIRST_VALUE({measure}) {unbounded}"), alias.clone()),
        WindowCalc::LastValue { measure, alias } => (format!("LAST_VALUE({measure}) {full_partition}"), alias.clone()),
        WindowCalc::PercentOfTotal { measure, alias } => {
            (format!("100.0 * {measure} / NULLIF(SUM({measure}) OVER (), 0)"), alias.clone())
        }
        WindowCalc::PercentOfPartition { measure, alias } => (
            format!("100.0 * {measure} / NULLIF(SUM({measure}) {full_partition}, 0)"),
            alias.clone(),
        ),
        WindowCalc::DifferenceFromPrevious { measure, alias } => (
            format!(
                "{measure} - LAG({measure}, 1) {}",
                partition_clause(partition_by, order_by, "")
            ),
            alias.clone(),
        ),
        WindowCalc::PercentChange { measure, alias } => {
            let lag = format!("LAG({measure}, 1) {}", partition_clause(partition_by, order_by, ""));
            (
                format!("100.0 * ({measure} - ({lag})) / NULLIF(({lag}), 0)"),
                alias.clone(),
            )
        }
        WindowCalc::DifferenceFromFirst { measure, alias } => (
            format!("{measure} - FIRST_VALUE({measure}) {unbounded}"),
            alias.clone(),
        ),
        WindowCalc::DifferenceFromAverage { measure, alias } => (
            format!("{measure} - AVG({measure}) {full_partition}"),
            alias.clone(),
        ),
    }
}

/// Build the SQL for a window-function query (spec §4.7 "Window"): one CTE
/// aggregates base dimensions and measures; the outer SELECT adds all
/// window expressions.
#[must_use]
pub fn build_window_query(request: &WindowRequest) -> String {
    let where_clause = render_where_clause(&request.filters).map(|c| format!(" WHERE {c}")).unwrap_or_default();
    let group_by = request.dimensions.join(", ");
    let measure_selects: Vec<String> = request
        .measures
        .iter()
        .map(|(expr, agg, alias)| format!("{agg}({expr}) AS {alias}"))
        .collect();

    let base = format!(
        "SELECT {group_by}, {measures} FROM {table}{where_clause} GROUP BY {group_by}",
        measures = measure_selects.join(", "),
        table = request.source_table,
    );

    let window_selects: Vec<String> = request
        .calcs
        .iter()
        .map(|calc| {
            let (expr, alias) = render_calc(calc, &request.partition_by, &request.order_by);
            format!("{expr} AS {alias}")
        })
        .collect();

    let outer_dims = request.dimensions.join(", ");
    let outer_measures: Vec<String> = request.measures.iter().map(|(_, _, alias)| alias.clone()).collect();

    format!(
        "WITH base AS ({base}) SELECT {outer_dims}, {outer_measures}, {window_selects} FROM base",
        outer_measures = outer_measures.join(", "),
        window_selects = window_selects.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_total_uses_unbounded_preceding_frame() {
        let request = WindowRequest {
            source_table: "sales".to_string(),
            dimensions: vec!["month".to_string()],
            measures: vec![("amount".to_string(), "SUM".to_string(), "total".to_string())],
            partition_by: Vec::new(),
            order_by: vec!["month".to_string()],
            calcs: vec![WindowCalc::RunningTotal {
                measure: "total".to_string(),
                alias: "running_total".to_string(),
            }],
            filters: Vec::new(),
        };
        let sql = build_window_query(&request);
        assert!(sql.contains("ROWS UNBOUNDED PRECEDING"));
        assert!(sql.contains("AS running_total"));
    }

    #[test]
    fn moving_average_window_size_controls_preceding_rows() {
        let request = WindowRequest {
            source_table: "sales".to_string(),
            dimensions: vec!["month".to_string()],
            measures: vec![("amount".to_string(), "SUM".to_string(), "total".to_string())],
            partition_by: Vec::new(),
            order_by: vec!["month".to_string()],
            calcs: vec![WindowCalc::MovingAverage {
                measure: "total".to_string(),
                window_size: 3,
                alias: "ma3".to_string(),
            }],
            filters: Vec::new(),
        };
        let sql = build_window_query(&request);
        assert!(sql.contains("ROWS 2 PRECEDING"));
    }
}
