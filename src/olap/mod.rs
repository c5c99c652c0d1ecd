// ABOUTME: OLAP Analytical Engine - semantic layer plus pivot/rollup/window/timeseries/stats/
// ABOUTME: cohort query builders and a single-connection executor (spec §4.7).
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

pub mod cohort;
pub mod executor;
pub mod filter;
pub mod pivot;
pub mod rollup;
pub mod semantic;
pub mod stats;
pub mod timeseries;
pub mod window;

pub use executor::OlapExecutor;
pub use semantic::{Dataset, Dimension, Join, Measure, SemanticModel};
