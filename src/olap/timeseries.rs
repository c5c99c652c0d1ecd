// ABOUTME: Time series query builder - grain truncation, gap-filling date spine, period-over-
// ABOUTME: period comparison joins (spec §4.7 "Time series"), all SQLite-native.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use super::filter::{render_where_clause, Filter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grain {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
}

impl Grain {
    /// Truncate `column` down to the start of this grain's bucket using
    /// SQLite's `strftime`/`date` date-and-time functions (no `date_trunc`
    /// in SQLite's grammar).
    fn trunc_expr(self, column: &str) -> String {
        match self {
            Self::Year => format!("strftime('%Y-01-01', {column})"),
            Self::Quarter => format!(
                "(strftime('%Y', {column}) || '-' || \
                  printf('%02d', ((CAST(strftime('%m', {column}) AS INTEGER) - 1) / 3) * 3 + 1) || '-01')"
            ),
            Self::Month => format!("strftime('%Y-%m-01', {column})"),
            Self::Week => format!(
                "date({column}, '-' || ((CAST(strftime('%w', {column}) AS INTEGER) + 6) % 7) || ' days')"
            ),
            Self::Day => format!("date({column})"),
            Self::Hour => format!("strftime('%Y-%m-%d %H:00:00', {column})"),
        }
    }

    /// The SQLite date function used to step a bucket forward/backward one
    /// grain unit: `datetime()` preserves the time-of-day component `hour`
    /// buckets carry, `date()` is sufficient for every coarser grain.
    fn step_function(self) -> &'static str {
        match self {
            Self::Hour => "datetime",
            _ => "date",
        }
    }

    /// The modifier passed to `step_function` to advance one bucket.
    fn step_modifier(self) -> &'static str {
        match self {
            Self::Year => "+1 year",
            Self::Quarter => "+3 months",
            Self::Month => "+1 month",
            Self::Week => "+7 days",
            Self::Day => "+1 day",
            Self::Hour => "+1 hour",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Yoy,
    Mom,
    Wow,
    Qoq,
    Dod,
}

impl Comparison {
    /// The modifier that steps a bucket *back* to its prior-period
    /// counterpart for this comparison kind.
    fn offset_modifier(self) -> &'static str {
        match self {
            Self::Yoy => "-1 year",
            Self::Mom => "-1 month",
            Self::Wow => "-7 days",
            Self::Qoq => "-3 months",
            Self::Dod => "-1 day",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesRequest {
    pub source_table: String,
    pub time_dimension: String,
    pub grain: Grain,
    pub measures: Vec<(String, String, String)>, // (expression, aggregation, alias)
    #[serde(default)]
    pub additional_dimensions: Vec<String>,
    pub comparison: Option<Comparison>,
    #[serde(default)]
    pub fill_gaps: bool,
    pub fill_value: Option<serde_json::Value>,
    pub date_range: Option<(String, String)>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

/// Build the SQL for a time-series query (spec §4.7 "Time series"). When
/// `fill_gaps` is set and no additional dimensions are present, a date spine
/// is generated via a `WITH RECURSIVE` CTE stepping by one grain unit over
/// `[min, max]` and left-joined against the aggregated data. A `comparison`
/// joins the result to itself shifted by one unit of the comparison kind.
#[must_use]
pub fn build_timeseries_query(request: &TimeSeriesRequest) -> String {
    let mut filters = request.filters.clone();
    if let Some((from, to)) = &request.date_range {
        filters.push(Filter {
            expression: request.time_dimension.clone(),
            operator: super::filter::FilterOperator::Between,
            value: serde_json::json!([from, to]),
        });
    }
    let where_clause = render_where_clause(&filters).map(|c| format!(" WHERE {c}")).unwrap_or_default();

    let trunc_expr = request.grain.trunc_expr(&request.time_dimension);
    let group_dims: Vec<String> = std::iter::once("bucket".to_string()).chain(request.additional_dimensions.iter().cloned()).collect();
    let measure_selects: Vec<String> = request
        .measures
        .iter()
        .map(|(expr, agg, alias)| format!("{agg}({expr}) AS {alias}"))
        .collect();
    let extra_dims = request.additional_dimensions.join(", ");
    let extra_dims_select = if extra_dims.is_empty() { String::new() } else { format!("{extra_dims}, ") };

    let aggregated = format!(
        "SELECT {trunc_expr} AS bucket, {extra_dims_select}{measures} FROM {table}{where_clause} GROUP BY {group_dims}",
        measures = measure_selects.join(", "),
        table = request.source_table,
        group_dims = group_dims.join(", "),
    );

    let fills_gaps = request.fill_gaps && request.additional_dimensions.is_empty();
    let recursive_keyword = if fills_gaps { "RECURSIVE " } else { "" };

    let base_cte = if fills_gaps {
        let fill_value = request.fill_value.clone().unwrap_or(serde_json::json!(0));
        let fill_literal = super::filter::format_value(&fill_value);
        let measure_fills: Vec<String> = request
            .measures
            .iter()
            .map(|(_, _, alias)| format!("COALESCE(aggregated.{alias}, {fill_literal}) AS {alias}"))
            .collect();
        let step_fn = request.grain.step_function();
        let step_mod = request.grain.step_modifier();
        format!(
            "aggregated AS ({aggregated}), \
             spine(bucket) AS ( \
                 SELECT (SELECT MIN(bucket) FROM aggregated) \
                 UNION ALL \
                 SELECT {step_fn}(bucket, '{step_mod}') FROM spine WHERE bucket < (SELECT MAX(bucket) FROM aggregated) \
             ), \
             filled AS (SELECT spine.bucket, {measure_fills} FROM spine LEFT JOIN aggregated ON spine.bucket = aggregated.bucket)",
            measure_fills = measure_fills.join(", "),
        )
    } else {
        format!("aggregated AS ({aggregated}), filled AS (SELECT * FROM aggregated)")
    };

    match request.comparison {
        None => with_limit(format!("WITH {recursive_keyword}{base_cte} SELECT * FROM filled"), request.limit),
        Some(comparison) => {
            let step_fn = request.grain.step_function();
            let offset_modifier = comparison.offset_modifier();
            let measure_columns: Vec<String> = request.measures.iter().map(|(_, _, alias)| alias.clone()).collect();
            let comparison_selects: Vec<String> = measure_columns
                .iter()
                .map(|alias| {
                    format!(
                        "(current.{alias} - prior.{alias}) AS {alias}_change, \
                         CASE WHEN prior.{alias} = 0 OR prior.{alias} IS NULL THEN NULL \
                              ELSE 100.0 * (current.{alias} - prior.{alias}) / prior.{alias} END AS {alias}_pct_change"
                    )
                })
                .collect();
            let sql = format!(
                "WITH {recursive_keyword}{base_cte}, current AS (SELECT * FROM filled) \
                 SELECT current.*, {comparisons} \
                 FROM current \
                 LEFT JOIN filled AS prior ON prior.bucket = {step_fn}(current.bucket, '{offset_modifier}')",
                comparisons = comparison_selects.join(", "),
            );
            with_limit(sql, request.limit)
        }
    }
}

fn with_limit(mut sql: String, limit: Option<u64>) -> String {
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}
