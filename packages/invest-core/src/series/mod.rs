//! Time series helpers shared by the metrics, aggregation and stress modules.
//!
//! - **Percent change**: lazy period-over-period returns
//! - **Alignment**: intersect two date-keyed series
//! - **Cumulative product**: compound a return sequence
//! - **Windows**: inclusive date-range slices and rebasing

use crate::types::PricePoint;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Lazy iterator over `v[i] / v[i-1] - 1`.
///
/// Yields 0 for a step whose previous value is not positive.
#[derive(Debug, Clone)]
pub struct PercentChange<'a> {
    values: &'a [f64],
    idx: usize,
}

impl Iterator for PercentChange<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.idx >= self.values.len() {
            return None;
        }

        let prev = self.values[self.idx - 1];
        let curr = self.values[self.idx];
        self.idx += 1;

        Some(if prev > 0.0 { curr / prev - 1.0 } else { 0.0 })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.values.len().saturating_sub(self.idx);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PercentChange<'_> {}

/// Period-over-period returns of a value sequence.
///
/// Fails with [`Error::InsufficientData`] for fewer than two values; callers
/// generally treat that as a zero return.
pub fn percent_change(values: &[f64]) -> Result<PercentChange<'_>> {
    if values.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "Need at least 2 values for percent change, got {}",
            values.len()
        )));
    }

    Ok(PercentChange { values, idx: 1 })
}

/// Percent changes collected into a vector, empty on insufficient data.
pub fn returns_or_empty(values: &[f64]) -> Vec<f64> {
    percent_change(values)
        .map(|it| it.collect())
        .unwrap_or_default()
}

/// Date-keyed daily returns of a price history, keyed by the later date.
pub fn daily_returns(points: &[PricePoint]) -> Vec<(NaiveDate, f64)> {
    points
        .windows(2)
        .map(|w| {
            let r = if w[0].close > 0.0 {
                w[1].close / w[0].close - 1.0
            } else {
                0.0
            };
            (w[1].date, r)
        })
        .collect()
}

/// Keep only the dates present in both series.
///
/// Output is ordered by the dates of `a`. An empty intersection returns an
/// empty vector.
pub fn align_by_date(a: &[(NaiveDate, f64)], b: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64, f64)> {
    let lookup: HashMap<NaiveDate, f64> = b.iter().copied().collect();

    a.iter()
        .filter_map(|(date, va)| lookup.get(date).map(|vb| (*date, *va, *vb)))
        .collect()
}

/// Running product of `1 + r`.
pub fn cumulative_product(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

/// Inclusive date-range slice of a sorted price history.
pub fn slice_window(points: &[PricePoint], start: NaiveDate, end: NaiveDate) -> &[PricePoint] {
    let lo = points.partition_point(|p| p.date < start);
    let hi = points.partition_point(|p| p.date <= end);
    if lo >= hi {
        return &[];
    }
    &points[lo..hi]
}

/// Rebase a series so its first value equals `base`.
///
/// Returns an empty vector when the series is empty or starts at zero.
pub fn normalize_to_base(values: &[f64], base: f64) -> Vec<f64> {
    match values.first() {
        Some(&first) if first != 0.0 => values.iter().map(|v| v / first * base).collect(),
        _ => Vec::new(),
    }
}

/// Arithmetic mean, 0 for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for an empty slice.
pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
