// ABOUTME: Statistics/Histogram/Correlation/Outliers - executor-side numeric analysis over
// ABOUTME: already-fetched measure columns (spec §4.7 "Statistics / Histogram / Correlation / Outliers").
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::errors::{AppError, AppResult};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub distinct_count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub sample_stddev: f64,
    pub sample_variance: f64,
}

/// `count, distinct-count, sum, mean, min, max, sample-stddev, sample-variance` (spec §4.7).
#[must_use]
pub fn summary(values: &[f64]) -> SummaryStats {
    let count = values.len();
    if count == 0 {
        return SummaryStats {
            count: 0,
            distinct_count: 0,
            sum: 0.0,
            mean: 0.0,
            min: 0.0,
            max: 0.0,
            sample_stddev: 0.0,
            sample_variance: 0.0,
        };
    }
    let sum: f64 = values.iter().sum();
    let mean = sum / count as f64;
    let variance = if count > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count as f64 - 1.0)
    } else {
        0.0
    };
    let mut distinct: Vec<f64> = values.to_vec();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    distinct.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);

    SummaryStats {
        count,
        distinct_count: distinct.len(),
        sum,
        mean,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        sample_stddev: variance.sqrt(),
        sample_variance: variance,
    }
}

/// Continuous percentile (linear interpolation between closest ranks), per
/// caller-supplied fraction in `[0, 1]`.
#[must_use]
pub fn percentiles(values: &[f64], fractions: &[f64]) -> Vec<(f64, f64)> {
    if values.is_empty() {
        return fractions.iter().map(|f| (*f, 0.0)).collect();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    fractions.iter().map(|f| (*f, percentile_of_sorted(&sorted, *f))).collect()
}

fn percentile_of_sorted(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = fraction.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    pub median: f64,
    pub mode: f64,
    pub iqr: f64,
}

/// `median, mode, IQR` (spec §4.7 "distribution").
#[must_use]
pub fn distribution(values: &[f64]) -> Distribution {
    let median = percentile_of_sorted(&sorted(values), 0.5);
    let q1 = percentile_of_sorted(&sorted(values), 0.25);
    let q3 = percentile_of_sorted(&sorted(values), 0.75);
    let mode = mode_of(values);
    Distribution { median, mode, iqr: q3 - q1 }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return vec![0.0];
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

fn mode_of(values: &[f64]) -> f64 {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values {
        let key = v.to_bits();
        let entry = counts.entry(key).or_insert((v, 0));
        entry.1 += 1;
    }
    counts
        .values()
        .max_by_key(|(_, count)| *count)
        .map(|(v, _)| *v)
        .unwrap_or(0.0)
}

/// Upper-triangular Pearson correlation matrix, diagonal included (spec
/// §4.7 "correlation"). `columns` maps column name to its values; all
/// columns must have equal length.
///
/// # Errors
/// Returns `InvalidArgument` if columns have mismatched lengths.
pub fn correlation_matrix(columns: &[(String, Vec<f64>)]) -> AppResult<Vec<(String, String, f64)>> {
    let len = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
    if columns.iter().any(|(_, v)| v.len() != len) {
        return Err(AppError::invalid_argument("all correlation columns must have equal length", vec!["columns".to_string()]));
    }
    let mut out = Vec::new();
    for i in 0..columns.len() {
        for j in i..columns.len() {
            out.push((columns[i].0.clone(), columns[j].0.clone(), pearson(&columns[i].1, &columns[j].1)));
        }
    }
    Ok(out)
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    if a.is_empty() {
        return 0.0;
    }
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - mean_a) * (y - mean_b)).sum();
    let var_a: f64 = a.iter().map(|x| (x - mean_a).powi(2)).sum();
    let var_b: f64 = b.iter().map(|y| (y - mean_b).powi(2)).sum();
    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        cov / denom
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub frequency: usize,
    pub percentage: f64,
    pub cumulative_freq: usize,
    pub cumulative_pct: f64,
}

/// Compute histogram bins from observed (or caller-supplied) bounds, with
/// the last bin floor-clamped so the maximum value lands inside it (spec
/// §4.7 "histogram").
#[must_use]
pub fn histogram(values: &[f64], bins: usize, bounds: Option<(f64, f64)>) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let (min, max) = bounds.unwrap_or_else(|| {
        (
            values.iter().copied().fold(f64::INFINITY, f64::min),
            values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    });
    let width = if (max - min).abs() < f64::EPSILON { 1.0 } else { (max - min) / bins as f64 };

    let mut frequencies = vec![0usize; bins];
    for &v in values {
        let mut idx = ((v - min) / width).floor() as i64;
        idx = idx.clamp(0, bins as i64 - 1);
        frequencies[idx as usize] += 1;
    }

    let total = values.len() as f64;
    let mut cumulative = 0usize;
    frequencies
        .into_iter()
        .enumerate()
        .map(|(i, freq)| {
            cumulative += freq;
            HistogramBin {
                bin_start: min + width * i as f64,
                bin_end: min + width * (i as f64 + 1.0),
                frequency: freq,
                percentage: 100.0 * freq as f64 / total,
                cumulative_freq: cumulative,
                cumulative_pct: 100.0 * cumulative as f64 / total,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Iqr,
    ZScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierClass {
    Normal,
    Outlier,
    Extreme,
}

/// Classify each value as normal/outlier/extreme (spec §4.7 "outliers"):
/// IQR method flags values outside `[Q1-1.5*IQR, Q3+1.5*IQR]`; z-score
/// method flags `|z|>2` as outlier and `|z|>3` as extreme.
#[must_use]
pub fn outliers(values: &[f64], method: OutlierMethod) -> Vec<(f64, OutlierClass)> {
    match method {
        OutlierMethod::Iqr => {
            let sorted_values = sorted(values);
            let q1 = percentile_of_sorted(&sorted_values, 0.25);
            let q3 = percentile_of_sorted(&sorted_values, 0.75);
            let iqr = q3 - q1;
            let lower = q1 - 1.5 * iqr;
            let upper = q3 + 1.5 * iqr;
            values
                .iter()
                .map(|&v| {
                    let class = if v < lower || v > upper { OutlierClass::Outlier } else { OutlierClass::Normal };
                    (v, class)
                })
                .collect()
        }
        OutlierMethod::ZScore => {
            let stats = summary(values);
            values
                .iter()
                .map(|&v| {
                    let z = if stats.sample_stddev == 0.0 { 0.0 } else { (v - stats.mean) / stats.sample_stddev };
                    let class = if z.abs() > 3.0 {
                        OutlierClass::Extreme
                    } else if z.abs() > 2.0 {
                        OutlierClass::Outlier
                    } else {
                        OutlierClass::Normal
                    };
                    (v, class)
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_matches_known_values() {
        let stats = summary(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.sum, 15.0);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.sample_variance - 2.5).abs() < 1e-9);
    }

    #[test]
    fn median_percentile_matches_manual_calc() {
        let percentiles = percentiles(&[1.0, 2.0, 3.0, 4.0], &[0.5]);
        assert!((percentiles[0].1 - 2.5).abs() < 1e-9);
    }

    #[test]
    fn histogram_clamps_maximum_into_last_bin() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0, 10.0], 5, Some((0.0, 10.0)));
        assert_eq!(bins.len(), 5);
        let total_freq: usize = bins.iter().map(|b| b.frequency).sum();
        assert_eq!(total_freq, 6);
        assert_eq!(bins.last().unwrap().cumulative_freq, 6);
    }

    #[test]
    fn iqr_outliers_flag_values_outside_fences() {
        let classes = outliers(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0], OutlierMethod::Iqr);
        assert_eq!(classes.last().unwrap().1, OutlierClass::Outlier);
        assert_eq!(classes[0].1, OutlierClass::Normal);
    }

    #[test]
    fn correlation_matrix_is_upper_triangular_with_diagonal_one() {
        let columns = vec![
            ("a".to_string(), vec![1.0, 2.0, 3.0]),
            ("b".to_string(), vec![1.0, 2.0, 3.0]),
        ];
        let matrix = correlation_matrix(&columns).unwrap();
        assert_eq!(matrix.len(), 3);
        let self_corr = matrix.iter().find(|(a, b, _)| a == "a" && b == "a").unwrap();
        assert!((self_corr.2 - 1.0).abs() < 1e-9);
    }
}
