// ABOUTME: Pivot query builder - rows x optional column dimension x aggregated values (spec §4.7).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::filter::{render_where_clause, Filter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotValue {
    pub measure_expression: String,
    pub aggregation: String,
    pub alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotRequest {
    pub source_table: String,
    pub rows: Vec<String>,
    pub column: Option<String>,
    pub values: Vec<PivotValue>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub include_totals: bool,
    #[serde(default)]
    pub include_subtotals: bool,
}

/// Build the SQL for a pivot query (spec §4.7 "Pivot"). With a `column`
/// dimension this emits a CTE chain (base -> distinct column values ->
/// aggregated by rows x column); without one it reduces to a plain
/// `GROUP BY rows`.
#[must_use]
pub fn build_pivot_query(request: &PivotRequest) -> String {
    let where_clause = render_where_clause(&request.filters).map(|c| format!(" WHERE {c}")).unwrap_or_default();
    let base = format!("SELECT * FROM {}{}", request.source_table, where_clause);

    match &request.column {
        None => {
            let group_by = request.rows.join(", ");
            let selected_values: Vec<String> = request
                .values
                .iter()
                .map(|v| format!("{}({}) AS {}", v.aggregation, v.measure_expression, v.alias))
                .collect();
            let mut sql = format!(
                "WITH base AS ({base}) SELECT {group_by}, {values} FROM base GROUP BY {group_by}",
                values = selected_values.join(", "),
            );
            if let Some(limit) = request.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            sql
        }
        Some(column) => {
            let group_by = request.rows.join(", ");
            let selected_values: Vec<String> = request
                .values
                .iter()
                .map(|v| format!("{}({}) AS {}", v.aggregation, v.measure_expression, v.alias))
                .collect();
            let mut sql = format!(
                "WITH base AS ({base}), \
                 distinct_columns AS (SELECT DISTINCT {column} FROM base), \
                 aggregated AS (SELECT {group_by}, {column}, {values} FROM base GROUP BY {group_by}, {column}) \
                 SELECT * FROM aggregated",
                values = selected_values.join(", "),
            );
            if let Some(limit) = request.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            sql
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request(column: Option<&str>) -> PivotRequest {
        PivotRequest {
            source_table: "sales".to_string(),
            rows: vec!["region".to_string()],
            column: column.map(str::to_string),
            values: vec![PivotValue {
                measure_expression: "amount".to_string(),
                aggregation: "SUM".to_string(),
                alias: "total_amount".to_string(),
            }],
            filters: Vec::new(),
            limit: None,
            include_totals: true,
            include_subtotals: false,
        }
    }

    #[test]
    fn without_column_reduces_to_group_by_rows() {
        let sql = build_pivot_query(&sample_request(None));
        assert!(sql.contains("GROUP BY region"));
        assert!(!sql.contains("distinct_columns"));
    }

    #[test]
    fn with_column_emits_cte_chain() {
        let sql = build_pivot_query(&sample_request(Some("quarter")));
        assert!(sql.contains("distinct_columns"));
        assert!(sql.contains("GROUP BY region, quarter"));
    }
}
