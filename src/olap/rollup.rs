// ABOUTME: Rollup/Cube query builder - enumerates each grouping combination as its own
// ABOUTME: SELECT, unioned together with self-describing subtotal markers (spec §4.7 "Rollup / Cube").
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::filter::{render_where_clause, Filter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RollupOperation {
    Rollup,
    Cube,
    GroupingSets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupMeasure {
    pub expression: String,
    pub aggregation: String,
    pub alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupRequest {
    pub source_table: String,
    pub dimensions: Vec<String>,
    pub measures: Vec<RollupMeasure>,
    pub operation: RollupOperation,
    pub grouping_sets: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

/// Enumerate the index sets (into `request.dimensions`) that must each
/// become their own `GROUP BY` branch. SQLite has no `ROLLUP`/`CUBE`/
/// `GROUPING SETS` syntax, so every grouping combination is materialised
/// as a separate `SELECT` and the branches are combined with `UNION ALL`.
fn grouping_sets(request: &RollupRequest) -> Vec<Vec<usize>> {
    let n = request.dimensions.len();
    match request.operation {
        RollupOperation::Rollup => (0..=n).rev().map(|i| (0..i).collect()).collect(),
        RollupOperation::Cube => (0..(1u32 << n))
            .map(|mask| (0..n).filter(|i| mask & (1 << i) != 0).collect())
            .collect(),
        RollupOperation::GroupingSets => request
            .grouping_sets
            .as_ref()
            .map(|sets| {
                sets.iter()
                    .map(|set| {
                        set.iter()
                            .filter_map(|name| request.dimensions.iter().position(|d| d == name))
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_else(|| vec![Vec::new()]),
    }
}

/// Build one grouping branch: dimensions inside `set` are selected as
/// themselves, dimensions outside it are replaced by the literal
/// `'[TOTAL]'` and flagged `1` in their `is_<dim>_total` column (spec §4.7:
/// "`GROUPING()` indicators aliased `is_<dim>_total`" and "a
/// `COALESCE(dim, '[TOTAL]')` wrapper so subtotal rows are self-describing").
fn build_branch(request: &RollupRequest, where_clause: &str, set: &[usize]) -> String {
    let dim_selects: Vec<String> = request
        .dimensions
        .iter()
        .enumerate()
        .map(|(i, d)| {
            if set.contains(&i) {
                format!("CAST({d} AS TEXT) AS {d}")
            } else {
                format!("'[TOTAL]' AS {d}")
            }
        })
        .collect();
    let grouping_selects: Vec<String> = request
        .dimensions
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let flag = u8::from(!set.contains(&i));
            format!("{flag} AS is_{d}_total")
        })
        .collect();
    let measure_selects: Vec<String> = request
        .measures
        .iter()
        .map(|m| format!("{}({}) AS {}", m.aggregation, m.expression, m.alias))
        .collect();
    let grouping_sum = request.dimensions.len() - set.len();
    let group_by_cols: Vec<String> = set.iter().map(|&i| request.dimensions[i].clone()).collect();
    let group_by = if group_by_cols.is_empty() {
        String::new()
    } else {
        format!(" GROUP BY {}", group_by_cols.join(", "))
    };

    format!(
        "SELECT {dims}, {grouping}, {grouping_sum} AS grouping_sum, {measures} FROM {table}{where_clause}{group_by}",
        dims = dim_selects.join(", "),
        grouping = grouping_selects.join(", "),
        measures = measure_selects.join(", "),
        table = request.source_table,
    )
}

/// Build the SQL for a rollup/cube/grouping-sets query (spec §4.7 "Rollup /
/// Cube"). Default sort: grouping-level ascending (detail rows first,
/// grand total last), then by dimension values.
#[must_use]
pub fn build_rollup_query(request: &RollupRequest) -> String {
    let where_clause = render_where_clause(&request.filters).map(|c| format!(" WHERE {c}")).unwrap_or_default();
    let sets = grouping_sets(request);
    let branches: Vec<String> = sets.iter().map(|set| build_branch(request, &where_clause, set)).collect();
    let order_values = request.dimensions.join(", ");
    format!(
        "WITH combined AS ({union}) SELECT * FROM combined ORDER BY grouping_sum ASC, {order_values}",
        union = branches.join(" UNION ALL "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(operation: RollupOperation, grouping_sets: Option<Vec<Vec<String>>>) -> RollupRequest {
        RollupRequest {
            source_table: "sales".to_string(),
            dimensions: vec!["region".to_string(), "product".to_string()],
            measures: vec![RollupMeasure {
                expression: "amount".to_string(),
                aggregation: "SUM".to_string(),
                alias: "total".to_string(),
            }],
            operation,
            grouping_sets,
            filters: Vec::new(),
        }
    }

    #[test]
    fn rollup_enumerates_prefix_branches_with_union_all() {
        let sql = build_rollup_query(&request(RollupOperation::Rollup, None));
        assert!(sql.contains("UNION ALL"));
        assert!(sql.contains("GROUP BY region, product"));
        assert!(sql.contains("GROUP BY region"));
        assert!(sql.contains("is_region_total"));
        assert!(sql.contains("'[TOTAL]' AS product"));
        assert!(!sql.to_uppercase().contains("ROLLUP ("));
    }

    #[test]
    fn cube_enumerates_every_subset() {
        let sql = build_rollup_query(&request(RollupOperation::Cube, None));
        // 2^2 = 4 branches for two dimensions.
        assert_eq!(sql.matches("UNION ALL").count(), 3);
        assert!(!sql.to_uppercase().contains("CUBE ("));
    }

    #[test]
    fn grouping_sets_uses_only_explicit_sets() {
        let sql = build_rollup_query(&request(
            RollupOperation::GroupingSets,
            Some(vec![vec!["region".to_string()], Vec::new()]),
        ));
        assert_eq!(sql.matches("UNION ALL").count(), 1);
        assert!(sql.contains("GROUP BY region"));
        assert!(!sql.to_uppercase().contains("GROUPING SETS"));
    }

    #[tokio::test]
    async fn rollup_query_executes_against_sqlite_and_totals_match() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE sales (region TEXT, product TEXT, amount REAL)")
            .execute(&pool)
            .await
            .unwrap();
        for (region, product, amount) in [("east", "a", 10.0), ("east", "b", 20.0), ("west", "a", 5.0)] {
            sqlx::query("INSERT INTO sales (region, product, amount) VALUES (?, ?, ?)")
                .bind(region)
                .bind(product)
                .bind(amount)
                .execute(&pool)
                .await
                .unwrap();
        }

        let sql = build_rollup_query(&request(RollupOperation::Rollup, None));
        let rows = sqlx::query(&sql).fetch_all(&pool).await.unwrap();
        use sqlx::Row;
        let grand_total = rows
            .iter()
            .find(|r| r.get::<i64, _>("grouping_sum") == 2)
            .expect("a fully-totalled row must exist");
        let total: f64 = grand_total.get("total");
        assert!((total - 35.0).abs() < 1e-9);
        assert_eq!(grand_total.get::<String, _>("region"), "[TOTAL]");
    }
}
