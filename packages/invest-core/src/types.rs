//! Core data types for the analytics engine.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that a weight set sums to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-4;

/// A single closing price observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    /// Calendar day of the observation
    pub date: NaiveDate,
    /// Closing price
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Price history of one asset over a lookback window.
///
/// Points are kept sorted by date with no duplicate dates. The series may be
/// empty when no data was available. Deserialized series go through
/// [`AssetSeries::new`] so the ordering holds for them too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(from = "RawAssetSeries")]
pub struct AssetSeries {
    /// Asset identifier (ticker)
    pub asset_id: String,
    /// Ordered price points
    pub points: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct RawAssetSeries {
    asset_id: String,
    #[serde(default)]
    points: Vec<PricePoint>,
}

impl From<RawAssetSeries> for AssetSeries {
    fn from(raw: RawAssetSeries) -> Self {
        Self::new(&raw.asset_id, raw.points)
    }
}

impl AssetSeries {
    /// Create a series, sorting points by date and keeping the last point for
    /// any repeated date.
    pub fn new(asset_id: &str, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);

        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        Self {
            asset_id: asset_id.to_uppercase(),
            points: deduped,
        }
    }

    /// Create an empty series for an asset with no available data.
    pub fn empty(asset_id: &str) -> Self {
        Self::new(asset_id, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Closing prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Closing price on an exact date, if present.
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].close)
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

/// Normalized portfolio weights.
///
/// Every weight lies in `[0, 1]` and the set sums to 1 within
/// [`WEIGHT_TOLERANCE`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Weights(Vec<f64>);

impl Weights {
    /// Normalize raw weights.
    ///
    /// Inputs whose sum deviates from 1 by more than the tolerance are
    /// re-scaled by their sum. An all-zero set becomes equal weights.
    pub fn normalize(raw: &[f64]) -> Result<Self> {
        if let Some(bad) = raw.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(Error::InvalidOperation(format!(
                "Weights must be finite and non-negative, got {}",
                bad
            )));
        }

        if raw.is_empty() {
            return Ok(Self(Vec::new()));
        }

        let sum: f64 = raw.iter().sum();
        if sum <= 0.0 {
            let equal = 1.0 / raw.len() as f64;
            return Ok(Self(vec![equal; raw.len()]));
        }

        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            Ok(Self(raw.iter().map(|w| w / sum).collect()))
        } else {
            Ok(Self(raw.to_vec()))
        }
    }

    /// Equal weights for `n` assets.
    pub fn equal(n: usize) -> Self {
        if n == 0 {
            return Self(Vec::new());
        }
        Self(vec![1.0 / n as f64; n])
    }

    /// Weights proportional to current market values, equal when the total is zero.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        Self::normalize(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// Aggregate portfolio value over time, derived from weighted asset histories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PortfolioValueSeries {
    pub points: Vec<(NaiveDate, f64)>,
}

impl PortfolioValueSeries {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|(d, _)| *d).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Span between first and last date, in years.
    pub fn span_years(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some((first, _)), Some((last, _))) => (*last - *first).num_days() as f64 / 365.25,
            _ => 0.0,
        }
    }
}

/// Ledger transaction direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Buy,
    Sell,
}

/// A recorded buy or sell of an asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Trade date
    pub date: NaiveDate,
    /// Buy or Sell
    pub kind: TransactionKind,
    /// Number of shares (always positive)
    pub shares: f64,
    /// Price per share
    pub price: f64,
    /// Broker commission, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<f64>,
}

impl Transaction {
    pub fn buy(date: NaiveDate, shares: f64, price: f64) -> Self {
        Self {
            date,
            kind: TransactionKind::Buy,
            shares,
            price,
            commission: None,
        }
    }

    pub fn sell(date: NaiveDate, shares: f64, price: f64) -> Self {
        Self {
            date,
            kind: TransactionKind::Sell,
            shares,
            price,
            commission: None,
        }
    }

    pub fn with_commission(mut self, commission: f64) -> Self {
        self.commission = Some(commission);
        self
    }

    /// Gross trade value (shares * price).
    pub fn value(&self) -> f64 {
        self.shares * self.price
    }
}

/// API response wrapper for success cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_asset_series_sorted_and_deduped() {
        let series = AssetSeries::new(
            "vwce",
            vec![
                PricePoint::new(day(3), 103.0),
                PricePoint::new(day(1), 100.0),
                PricePoint::new(day(3), 104.0),
                PricePoint::new(day(2), 101.0),
            ],
        );

        assert_eq!(series.asset_id, "VWCE");
        assert_eq!(series.closes(), vec![100.0, 101.0, 104.0]);
        assert_eq!(series.price_on(day(2)), Some(101.0));
        assert_eq!(series.price_on(day(4)), None);
    }

    #[test]
    fn test_weights_rescaled() {
        let weights = Weights::normalize(&[2.0, 2.0]).unwrap();
        assert_eq!(weights.as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn test_weights_within_tolerance_untouched() {
        let weights = Weights::normalize(&[0.33333, 0.33333, 0.33333]).unwrap();
        assert_eq!(weights.as_slice(), &[0.33333, 0.33333, 0.33333]);
    }

    #[test]
    fn test_weights_all_zero_become_equal() {
        let weights = Weights::normalize(&[0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(weights.as_slice(), &[0.25; 4]);
    }

    #[test]
    fn test_weights_reject_negative() {
        let result = Weights::normalize(&[0.5, -0.5]);
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_span_years() {
        let series = PortfolioValueSeries {
            points: vec![
                (NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 1.0),
                (NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), 2.0),
            ],
        };
        assert!((series.span_years() - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_asset_series_deserialize_sorts_and_dedups() {
        let json = r#"{
            "asset_id": "vwce",
            "points": [
                {"date": "2024-01-03", "close": 12.0},
                {"date": "2024-01-01", "close": 10.0},
                {"date": "2024-01-03", "close": 13.0}
            ]
        }"#;

        let series: AssetSeries = serde_json::from_str(json).unwrap();
        assert_eq!(series.asset_id, "VWCE");
        assert_eq!(series.len(), 2);
        assert_eq!(series.price_on(day(1)), Some(10.0));
        assert_eq!(series.price_on(day(3)), Some(13.0));
    }

    #[test]
    fn test_transaction_serde_kind() {
        let tx = Transaction::buy(day(1), 10.0, 50.0).with_commission(1.5);
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"BUY\""));
        assert_eq!(tx.value(), 500.0);
    }

    #[test]
    fn test_api_response() {
        let response: ApiResponse<String> = ApiResponse::ok("test".to_string());
        assert!(response.ok);
        assert_eq!(response.data, Some("test".to_string()));

        let err_response: ApiResponse<String> = ApiResponse::err("error");
        assert!(!err_response.ok);
        assert_eq!(err_response.error, Some("error".to_string()));
    }
}
