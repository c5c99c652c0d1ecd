// ABOUTME: Semantic layer - datasets, dimensions, measures and their resolution rules (spec §4.7).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub alias: String,
    pub on: String,
}

/// A queryable source table plus its join graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub source_table: String,
    #[serde(default)]
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyLevel {
    pub level: String,
    pub expression: String,
}

/// A dimension, optionally drillable through a named hierarchy of levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub dataset: String,
    pub column_expression: String,
    #[serde(default)]
    pub hierarchies: HashMap<String, Vec<HierarchyLevel>>,
}

impl Dimension {
    /// Resolve a plain reference, or a `(hierarchy, level)` pair when both
    /// exist, to its SQL expression (spec §4.7 "Dimension resolution").
    #[must_use]
    pub fn resolve(&self, hierarchy_level: Option<(&str, &str)>) -> &str {
        if let Some((hierarchy, level)) = hierarchy_level {
            if let Some(levels) = self.hierarchies.get(hierarchy) {
                if let Some(found) = levels.iter().find(|l| l.level == level) {
                    return &found.expression;
                }
            }
        }
        &self.column_expression
    }
}

/// A measure, carrying its stored aggregation expression (e.g. `SUM(amount)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub dataset: String,
    pub column: String,
    pub default_aggregation: String,
}

impl Measure {
    /// Resolve to a full aggregation expression. An explicit
    /// `aggregation_override` re-wraps the stored column with the new
    /// aggregation function rather than reusing the stored expression
    /// verbatim (spec §4.7 "Measure resolution").
    #[must_use]
    pub fn resolve(&self, aggregation_override: Option<&str>) -> String {
        let aggregation = aggregation_override.unwrap_or(&self.default_aggregation);
        format!("{}({})", aggregation, self.column)
    }
}

/// In-memory semantic model: the three tables the engine resolves references
/// against (spec §4.7 "Owns three tables: datasets, measures, dimensions").
#[derive(Debug, Default)]
pub struct SemanticModel {
    datasets: HashMap<String, Dataset>,
    dimensions: HashMap<String, Dimension>,
    measures: HashMap<String, Measure>,
}

impl SemanticModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_dataset(&mut self, dataset: Dataset) {
        self.datasets.insert(dataset.name.clone(), dataset);
    }

    pub fn register_dimension(&mut self, dimension: Dimension) {
        self.dimensions.insert(dimension.name.clone(), dimension);
    }

    pub fn register_measure(&mut self, measure: Measure) {
        self.measures.insert(measure.name.clone(), measure);
    }

    /// # Errors
    /// Returns `InvalidArgument` if no such dataset is registered.
    pub fn dataset(&self, name: &str) -> AppResult<&Dataset> {
        self.datasets
            .get(name)
            .ok_or_else(|| AppError::invalid_argument(format!("unknown dataset '{name}'"), vec!["dataset".to_string()]))
    }

    /// # Errors
    /// Returns `InvalidArgument` if no such dimension is registered.
    pub fn dimension(&self, name: &str) -> AppResult<&Dimension> {
        self.dimensions
            .get(name)
            .ok_or_else(|| AppError::invalid_argument(format!("unknown dimension '{name}'"), vec!["dimension".to_string()]))
    }

    /// # Errors
    /// Returns `InvalidArgument` if no such measure is registered.
    pub fn measure(&self, name: &str) -> AppResult<&Measure> {
        self.measures
            .get(name)
            .ok_or_else(|| AppError::invalid_argument(format!("unknown measure '{name}'"), vec!["measure".to_string()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_resolves_hierarchy_level_when_present() {
        let mut dim = Dimension {
            name: "date".to_string(),
            dataset: "sales".to_string(),
            column_expression: "sale_date".to_string(),
            hierarchies: HashMap::new(),
        };
        dim.hierarchies.insert(
            "calendar".to_string(),
            vec![HierarchyLevel {
                level: "quarter".to_string(),
                expression: "date_trunc('quarter', sale_date)".to_string(),
            }],
        );
        assert_eq!(dim.resolve(Some(("calendar", "quarter"))), "date_trunc('quarter', sale_date)");
        assert_eq!(dim.resolve(Some(("calendar", "missing_level"))), "sale_date");
        assert_eq!(dim.resolve(None), "sale_date");
    }

    #[test]
    fn measure_override_rewraps_column_not_stored_expression() {
        let measure = Measure {
            name: "revenue".to_string(),
            dataset: "sales".to_string(),
            column: "amount".to_string(),
            default_aggregation: "SUM".to_string(),
        };
        assert_eq!(measure.resolve(None), "SUM(amount)");
        assert_eq!(measure.resolve(Some("AVG")), "AVG(amount)");
    }
}
