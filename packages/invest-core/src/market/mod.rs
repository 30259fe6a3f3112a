//! Market data and ledger collaborators.
//!
//! The analytics engine never fetches anything itself. Price histories and
//! quotes come through [`PriceSource`], transactions through [`Ledger`], and
//! current prices are memoized by an injected [`PriceCache`].

mod cache;
mod memory;

pub use cache::{CachedPrice, PriceCache, PriceOrigin, PriceQuote, DEFAULT_PRICE_TTL_SECS};
pub use memory::{InMemoryLedger, InMemoryPriceSource};

use crate::types::{AssetSeries, PricePoint, Transaction};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A price provider failed to return data for an asset.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Data unavailable for {asset_id}: {reason}")]
pub struct DataUnavailable {
    pub asset_id: String,
    pub reason: String,
}

impl DataUnavailable {
    pub fn new(asset_id: &str, reason: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Lookback window for a history request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Lookback {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "max")]
    Max,
}

impl Lookback {
    /// Window length in months, `None` for the full history.
    pub fn months(&self) -> Option<u32> {
        match self {
            Lookback::OneMonth => Some(1),
            Lookback::ThreeMonths => Some(3),
            Lookback::SixMonths => Some(6),
            Lookback::OneYear => Some(12),
            Lookback::TwoYears => Some(24),
            Lookback::FiveYears => Some(60),
            Lookback::TenYears => Some(120),
            Lookback::Max => None,
        }
    }

    /// First date included in a window ending at `end`.
    pub fn start_from(&self, end: NaiveDate) -> Option<NaiveDate> {
        self.months()
            .and_then(|m| end.checked_sub_months(Months::new(m)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lookback::OneMonth => "1mo",
            Lookback::ThreeMonths => "3mo",
            Lookback::SixMonths => "6mo",
            Lookback::OneYear => "1y",
            Lookback::TwoYears => "2y",
            Lookback::FiveYears => "5y",
            Lookback::TenYears => "10y",
            Lookback::Max => "max",
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lookback {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1mo" => Ok(Lookback::OneMonth),
            "3mo" => Ok(Lookback::ThreeMonths),
            "6mo" => Ok(Lookback::SixMonths),
            "1y" => Ok(Lookback::OneYear),
            "2y" => Ok(Lookback::TwoYears),
            "5y" => Ok(Lookback::FiveYears),
            "10y" => Ok(Lookback::TenYears),
            "max" => Ok(Lookback::Max),
            other => Err(crate::Error::InvalidOperation(format!(
                "Unknown lookback period: {}",
                other
            ))),
        }
    }
}

/// Source of price histories and current quotes.
pub trait PriceSource {
    /// Ordered daily closes for an asset over the lookback window. May be empty.
    fn history(&self, asset_id: &str, lookback: Lookback)
        -> Result<Vec<PricePoint>, DataUnavailable>;

    /// Latest price for an asset.
    fn current_price(&self, asset_id: &str) -> Result<f64, DataUnavailable>;
}

/// Source of recorded transactions.
pub trait Ledger {
    /// Transactions for an asset in date order.
    fn transactions(&self, asset_id: &str) -> Vec<Transaction>;
}

/// Fetch a history, treating a provider failure as an empty series.
pub fn fetch_series(source: &dyn PriceSource, asset_id: &str, lookback: Lookback) -> AssetSeries {
    match source.history(asset_id, lookback) {
        Ok(points) => AssetSeries::new(asset_id, points),
        Err(e) => {
            tracing::warn!("History unavailable, using empty series: {}", e);
            AssetSeries::empty(asset_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookback_parse() {
        assert_eq!("1y".parse::<Lookback>().unwrap(), Lookback::OneYear);
        assert_eq!("MAX".parse::<Lookback>().unwrap(), Lookback::Max);
        assert!("7w".parse::<Lookback>().is_err());
    }

    #[test]
    fn test_lookback_serde_matches_display() {
        for lookback in [Lookback::OneMonth, Lookback::FiveYears, Lookback::Max] {
            let json = serde_json::to_string(&lookback).unwrap();
            assert_eq!(json, format!("\"{}\"", lookback));
        }
    }

    #[test]
    fn test_lookback_start_from() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            Lookback::OneMonth.start_from(end),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            Lookback::FiveYears.start_from(end),
            NaiveDate::from_ymd_opt(2019, 3, 31)
        );
        assert_eq!(Lookback::Max.start_from(end), None);
    }

    #[test]
    fn test_fetch_series_swallows_failure() {
        let source = InMemoryPriceSource::new().with_failure("BROKEN");
        let series = fetch_series(&source, "BROKEN", Lookback::OneYear);
        assert!(series.is_empty());
        assert_eq!(series.asset_id, "BROKEN");
    }
}
