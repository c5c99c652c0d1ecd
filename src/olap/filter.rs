// ABOUTME: Filter operator formatting, shared by every query builder (spec §4.7 "Query builders").
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Like,
    NotLike,
    Between,
    IsNull,
    IsNotNull,
    Contains,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub expression: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

/// Format one JSON value as a SQL literal: strings are single-quote
/// escaped, lists become comma-separated literals (spec §4.7).
#[must_use]
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        Value::Array(items) => items.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => format!("'{}'", value.to_string().replace('\'', "''")),
    }
}

/// Render one filter as a single SQL boolean expression. Operator
/// formatting is centralised here so every builder shares the same rules
/// (spec §4.7: "Operator formatting is parameterised in a single place").
#[must_use]
pub fn render(filter: &Filter) -> String {
    let expr = &filter.expression;
    match filter.operator {
        FilterOperator::Eq => format!("{expr} = {}", format_value(&filter.value)),
        FilterOperator::Ne => format!("{expr} != {}", format_value(&filter.value)),
        FilterOperator::Lt => format!("{expr} < {}", format_value(&filter.value)),
        FilterOperator::Lte => format!("{expr} <= {}", format_value(&filter.value)),
        FilterOperator::Gt => format!("{expr} > {}", format_value(&filter.value)),
        FilterOperator::Gte => format!("{expr} >= {}", format_value(&filter.value)),
        FilterOperator::In => format!("{expr} IN ({})", format_value(&filter.value)),
        FilterOperator::NotIn => format!("{expr} NOT IN ({})", format_value(&filter.value)),
        FilterOperator::Like => format!("{expr} LIKE {}", format_value(&filter.value)),
        FilterOperator::NotLike => format!("{expr} NOT LIKE {}", format_value(&filter.value)),
        FilterOperator::Between => {
            let bounds = filter.value.as_array().cloned().unwrap_or_default();
            let lo = bounds.first().cloned().unwrap_or(Value::Null);
            let hi = bounds.get(1).cloned().unwrap_or(Value::Null);
            format!("{expr} BETWEEN {} AND {}", format_value(&lo), format_value(&hi))
        }
        FilterOperator::IsNull => format!("{expr} IS NULL"),
        FilterOperator::IsNotNull => format!("{expr} IS NOT NULL"),
        FilterOperator::Contains => format!("{expr} LIKE {}", format_value(&Value::String(format!("%{}%", filter.value.as_str().unwrap_or_default())))),
    }
}

/// Join a set of rendered filters with `AND`, or `None` if there are no
/// filters at all (spec §4.7 base query template: `[WHERE ...]` is optional).
#[must_use]
pub fn render_where_clause(filters: &[Filter]) -> Option<String> {
    if filters.is_empty() {
        return None;
    }
    Some(filters.iter().map(render).collect::<Vec<_>>().join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_operator_renders_comma_separated_list() {
        let filter = Filter {
            expression: "region".to_string(),
            operator: FilterOperator::In,
            value: serde_json::json!(["east", "west"]),
        };
        assert_eq!(render(&filter), "region IN ('east', 'west')");
    }

    #[test]
    fn between_operator_uses_both_bounds() {
        let filter = Filter {
            expression: "amount".to_string(),
            operator: FilterOperator::Between,
            value: serde_json::json!([10, 20]),
        };
        assert_eq!(render(&filter), "amount BETWEEN 10 AND 20");
    }

    #[test]
    fn string_values_escape_single_quotes() {
        let filter = Filter {
            expression: "name".to_string(),
            operator: FilterOperator::Eq,
            value: serde_json::json!("O'Brien"),
        };
        assert_eq!(render(&filter), "name = 'O''Brien'");
    }

    #[test]
    fn where_clause_is_none_when_no_filters() {
        assert!(render_where_clause(&[]).is_none());
    }
}
