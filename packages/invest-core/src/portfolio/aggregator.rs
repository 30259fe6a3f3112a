//! Portfolio value series from weighted asset histories.
//!
//! The reference timeline is the calendar of the first asset with data; other
//! assets contribute only on dates they share with it. Gaps are not
//! interpolated.

use super::holdings::HoldingsSummary;
use super::performance::{cagr, time_weighted_return};
use super::risk::drawdowns;
use crate::market::{fetch_series, Ledger, Lookback, PriceCache, PriceSource};
use crate::series::{normalize_to_base, returns_or_empty};
use crate::types::{AssetSeries, PortfolioValueSeries, Weights};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum span, in years, before CAGR is reported.
const MIN_CAGR_YEARS: f64 = 1.0;

/// Performance of an aggregated portfolio series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPerformance {
    /// Aggregate value per reference date
    pub series: PortfolioValueSeries,
    /// Period-over-period returns of the series
    pub returns: Vec<f64>,
    /// Time-weighted return, in percent
    pub twr: f64,
    /// Drawdown per date, in percent
    pub drawdowns: Vec<f64>,
    /// Worst drawdown, in percent (non-positive)
    pub max_drawdown: f64,
    /// CAGR in percent, present when the series spans at least a year
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cagr: Option<f64>,
}

impl PortfolioPerformance {
    /// Derive metrics from a value series.
    pub fn from_series(series: PortfolioValueSeries) -> Self {
        let values = series.values();
        let returns = returns_or_empty(&values);
        let twr = time_weighted_return(&values);
        let dd = drawdowns(&values);

        let years = series.span_years();
        let growth = match (values.first(), values.last()) {
            (Some(first), Some(last)) if years >= MIN_CAGR_YEARS => Some(cagr(*first, *last, years)),
            _ => None,
        };

        Self {
            series,
            returns,
            twr,
            drawdowns: dd.series,
            max_drawdown: dd.max_drawdown,
            cagr: growth,
        }
    }

    /// Values rebased so the first point is 100, for side-by-side comparison.
    pub fn normalized(&self) -> Vec<f64> {
        normalize_to_base(&self.series.values(), 100.0)
    }

    /// Returns keyed by the later date of each step.
    pub fn dated_returns(&self) -> Vec<(NaiveDate, f64)> {
        self.series
            .points
            .iter()
            .skip(1)
            .map(|(d, _)| *d)
            .zip(self.returns.iter().copied())
            .collect()
    }
}

/// Combine weighted asset histories on the first non-empty asset's calendar.
///
/// Weights are normalized first, so `[2, 2]` is treated as `[0.5, 0.5]`.
/// Returns `None` when no asset has any data.
pub fn aggregate(inputs: &[(AssetSeries, f64)]) -> Result<Option<PortfolioPerformance>> {
    let raw: Vec<f64> = inputs.iter().map(|(_, w)| *w).collect();
    let weights = Weights::normalize(&raw)?;

    let Some((reference, _)) = inputs.iter().find(|(series, _)| !series.is_empty()) else {
        tracing::debug!("No asset history available for aggregation");
        return Ok(None);
    };

    let points: Vec<(NaiveDate, f64)> = reference
        .points
        .iter()
        .map(|p| {
            let total = inputs
                .iter()
                .zip(weights.as_slice())
                .filter_map(|((series, _), w)| series.price_on(p.date).map(|price| price * w))
                .sum::<f64>();
            (p.date, total)
        })
        .collect();

    tracing::debug!(
        "Aggregated {} assets over {} reference dates of {}",
        inputs.len(),
        points.len(),
        reference.asset_id
    );

    Ok(Some(PortfolioPerformance::from_series(PortfolioValueSeries {
        points,
    })))
}

/// Sum weighted closes over the union of all asset calendars.
///
/// Dashboard variant: every date any asset traded appears, with only the
/// assets priced that day contributing.
pub fn aggregate_union(inputs: &[(AssetSeries, f64)]) -> Result<PortfolioValueSeries> {
    let raw: Vec<f64> = inputs.iter().map(|(_, w)| *w).collect();
    let weights = Weights::normalize(&raw)?;

    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for ((series, _), w) in inputs.iter().zip(weights.as_slice()) {
        for p in &series.points {
            *daily.entry(p.date).or_insert(0.0) += p.close * w;
        }
    }

    Ok(PortfolioValueSeries {
        points: daily.into_iter().collect(),
    })
}

/// Aggregation bound to its collaborators.
pub struct Aggregator<'a> {
    source: &'a dyn PriceSource,
    ledger: &'a dyn Ledger,
    cache: &'a PriceCache,
}

impl<'a> Aggregator<'a> {
    pub fn new(source: &'a dyn PriceSource, ledger: &'a dyn Ledger, cache: &'a PriceCache) -> Self {
        Self {
            source,
            ledger,
            cache,
        }
    }

    /// Current holdings valued through the price cache.
    pub fn holdings(&self, asset_ids: &[String], now: DateTime<Utc>) -> HoldingsSummary {
        HoldingsSummary::build(asset_ids, self.ledger, self.source, self.cache, now)
    }

    /// Fetch histories and pair each with its current value weight.
    pub fn weighted_histories(
        &self,
        holdings: &HoldingsSummary,
        lookback: Lookback,
    ) -> Result<Vec<(AssetSeries, f64)>> {
        let weights = holdings.weights()?;
        Ok(holdings
            .holdings
            .iter()
            .zip(weights.as_slice())
            .map(|(h, w)| (fetch_series(self.source, &h.asset_id, lookback), *w))
            .collect())
    }

    /// Portfolio performance over a lookback window.
    pub fn performance(
        &self,
        asset_ids: &[String],
        lookback: Lookback,
        now: DateTime<Utc>,
    ) -> Result<Option<PortfolioPerformance>> {
        let holdings = self.holdings(asset_ids, now);
        let inputs = self.weighted_histories(&holdings, lookback)?;
        aggregate(&inputs)
    }

    /// Union-calendar value series for a dashboard chart.
    pub fn dashboard_series(
        &self,
        asset_ids: &[String],
        lookback: Lookback,
        now: DateTime<Utc>,
    ) -> Result<PortfolioValueSeries> {
        let holdings = self.holdings(asset_ids, now);
        let inputs = self.weighted_histories(&holdings, lookback)?;
        aggregate_union(&inputs)
    }
}
