//! Scenario replay over a weighted set of asset histories.

use super::monte_carlo::{self, MonteCarloConfig, MonteCarloResult, SimulationBudget};
use super::scenarios::{get_scenario, Scenario, SCENARIOS};
use crate::market::{fetch_series, Lookback, PriceSource};
use crate::portfolio::HoldingsSummary;
use crate::series::slice_window;
use crate::types::{AssetSeries, PricePoint, Weights};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default market proxy used when an asset has no data for a window.
pub const DEFAULT_PROXY_SYMBOL: &str = "^GSPC";

/// Which fallback tier produced a return.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReturnSource {
    /// The asset's own history
    Asset,
    /// The market proxy history
    Proxy,
    /// No data anywhere; contributes 0
    Zero,
}

/// Total return of a history over a scenario window.
///
/// `None` when the window holds no points or starts at a non-positive price.
pub fn window_return(points: &[PricePoint], scenario: &Scenario) -> Option<f64> {
    let window = slice_window(points, scenario.start_date, scenario.end_date);
    let (first, last) = (window.first()?, window.last()?);
    if first.close <= 0.0 {
        return None;
    }
    Some(last.close / first.close - 1.0)
}

/// Resolve an asset's scenario return through the fallback chain.
///
/// asset window, then proxy window, then `(0.0, ReturnSource::Zero)`.
pub fn resolve_return(
    asset: &[PricePoint],
    proxy: &[PricePoint],
    scenario: &Scenario,
) -> (f64, ReturnSource) {
    if let Some(r) = window_return(asset, scenario) {
        return (r, ReturnSource::Asset);
    }
    if let Some(r) = window_return(proxy, scenario) {
        return (r, ReturnSource::Proxy);
    }
    (0.0, ReturnSource::Zero)
}

/// Scenario return of one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetScenarioReturn {
    pub asset_id: String,
    /// Total return over the window, in percent
    pub return_percent: f64,
    pub source: ReturnSource,
}

/// Outcome of replaying one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    /// Weighted portfolio return, in percent
    pub portfolio_return: f64,
    pub asset_returns: Vec<AssetScenarioReturn>,
    /// Current total value times the portfolio return
    pub value_impact: f64,
}

/// Stress test over a fixed set of weighted assets.
#[derive(Debug, Clone)]
pub struct StressTest {
    assets: Vec<AssetSeries>,
    weights: Weights,
    total_value: f64,
    proxy: AssetSeries,
}

impl StressTest {
    /// Create a stress test from full histories and raw weights.
    ///
    /// Weights are normalized; their count must match the assets.
    pub fn new(assets: Vec<AssetSeries>, weights: &[f64], total_value: f64) -> Result<Self> {
        if assets.len() != weights.len() {
            return Err(Error::InvalidOperation(format!(
                "Got {} weights for {} assets",
                weights.len(),
                assets.len()
            )));
        }

        Ok(Self {
            assets,
            weights: Weights::normalize(weights)?,
            total_value,
            proxy: AssetSeries::empty(DEFAULT_PROXY_SYMBOL),
        })
    }

    /// Use a market proxy series for assets without data.
    pub fn with_proxy(mut self, proxy: AssetSeries) -> Self {
        self.proxy = proxy;
        self
    }

    /// Build from current holdings, fetching full histories from a source.
    ///
    /// Weights are the holdings' value weights; fetch failures become empty
    /// series and fall through to the proxy.
    pub fn from_source(
        source: &dyn PriceSource,
        holdings: &HoldingsSummary,
        proxy_symbol: &str,
    ) -> Result<Self> {
        let assets: Vec<AssetSeries> = holdings
            .asset_ids()
            .iter()
            .map(|id| fetch_series(source, id, Lookback::Max))
            .collect();
        let weights = holdings.weights()?;
        let proxy = fetch_series(source, proxy_symbol, Lookback::Max);

        Ok(Self::new(assets, weights.as_slice(), holdings.total_value)?.with_proxy(proxy))
    }

    pub fn assets(&self) -> &[AssetSeries] {
        &self.assets
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    pub fn proxy(&self) -> &AssetSeries {
        &self.proxy
    }

    /// Replay a catalog scenario.
    pub fn run_scenario(&self, key: &str) -> Result<ScenarioResult> {
        let scenario =
            get_scenario(key).ok_or_else(|| Error::UnknownScenario(key.to_string()))?;
        self.replay(scenario)
    }

    /// Replay an arbitrary window.
    pub fn replay(&self, scenario: Scenario) -> Result<ScenarioResult> {
        let asset_returns: Vec<AssetScenarioReturn> = self
            .assets
            .iter()
            .map(|asset| {
                let (r, source) = resolve_return(&asset.points, &self.proxy.points, &scenario);
                if source != ReturnSource::Asset {
                    tracing::debug!(
                        "{}: no data in {}, using {:?} return",
                        asset.asset_id,
                        scenario.key,
                        source
                    );
                }
                AssetScenarioReturn {
                    asset_id: asset.asset_id.clone(),
                    return_percent: r * 100.0,
                    source,
                }
            })
            .collect();

        let portfolio_return: f64 = asset_returns
            .iter()
            .zip(self.weights.as_slice())
            .map(|(a, w)| a.return_percent / 100.0 * w)
            .sum();
        let value_impact = self.total_value * portfolio_return;

        if !portfolio_return.is_finite() || !value_impact.is_finite() {
            return Err(Error::InvalidOperation(format!(
                "Scenario {} produced a non-finite result",
                scenario.key
            )));
        }

        Ok(ScenarioResult {
            scenario,
            portfolio_return: portfolio_return * 100.0,
            asset_returns,
            value_impact,
        })
    }

    /// Replay every catalog scenario; a failing scenario is recorded as `None`.
    pub fn run_all_scenarios(&self) -> BTreeMap<String, Option<ScenarioResult>> {
        SCENARIOS
            .keys()
            .map(|key| {
                let result = match self.run_scenario(key) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        tracing::warn!("Scenario {} failed: {}", key, e);
                        None
                    }
                };
                (key.clone(), result)
            })
            .collect()
    }

    /// Correlated Monte Carlo projection of the portfolio.
    pub fn monte_carlo_simulation(&self, config: &MonteCarloConfig) -> Result<MonteCarloResult> {
        self.monte_carlo_with_budget(config, &SimulationBudget::unlimited())
    }

    /// Monte Carlo projection that stops when the budget runs out.
    pub fn monte_carlo_with_budget(
        &self,
        config: &MonteCarloConfig,
        budget: &SimulationBudget,
    ) -> Result<MonteCarloResult> {
        monte_carlo::simulate(&self.assets, &self.proxy, &self.weights, config, budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{InMemoryLedger, InMemoryPriceSource, PriceCache};
    use crate::types::Transaction;
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Prices at the covid crash window edges plus one point outside it.
    fn covid_series(id: &str, start: f64, end: f64) -> AssetSeries {
        AssetSeries::new(
            id,
            vec![
                PricePoint::new(date(2020, 1, 2), start * 1.1),
                PricePoint::new(date(2020, 2, 19), start),
                PricePoint::new(date(2020, 3, 2), (start + end) / 2.0),
                PricePoint::new(date(2020, 3, 23), end),
            ],
        )
    }

    #[test]
    fn test_resolve_return_tiers() {
        let scenario = get_scenario("covid_crash").unwrap();
        let asset = covid_series("A", 100.0, 70.0);
        let proxy = covid_series("^GSPC", 200.0, 150.0);

        let (r, source) = resolve_return(&asset.points, &proxy.points, &scenario);
        assert_eq!(source, ReturnSource::Asset);
        assert_relative_eq!(r, -0.30, epsilon = 1e-12);

        let (r, source) = resolve_return(&[], &proxy.points, &scenario);
        assert_eq!(source, ReturnSource::Proxy);
        assert_relative_eq!(r, -0.25, epsilon = 1e-12);

        assert_eq!(resolve_return(&[], &[], &scenario), (0.0, ReturnSource::Zero));
    }

    #[test]
    fn test_resolve_return_ignores_data_outside_window() {
        let scenario = get_scenario("financial_crisis").unwrap();
        let asset = covid_series("A", 100.0, 70.0);
        let (_, source) = resolve_return(&asset.points, &[], &scenario);
        assert_eq!(source, ReturnSource::Zero);
    }

    #[test]
    fn test_run_scenario_weighted() {
        let stress = StressTest::new(
            vec![covid_series("A", 100.0, 70.0), AssetSeries::empty("B")],
            &[3.0, 1.0],
            10_000.0,
        )
        .unwrap()
        .with_proxy(covid_series("^GSPC", 100.0, 90.0));

        let result = stress.run_scenario("covid_crash").unwrap();
        // 0.75 * -30% + 0.25 * -10%
        assert_relative_eq!(result.portfolio_return, -25.0, epsilon = 1e-9);
        assert_relative_eq!(result.value_impact, -2_500.0, epsilon = 1e-6);
        assert_eq!(result.asset_returns[0].source, ReturnSource::Asset);
        assert_eq!(result.asset_returns[1].source, ReturnSource::Proxy);
    }

    #[test]
    fn test_run_scenario_without_any_data_is_zero() {
        let stress = StressTest::new(
            vec![AssetSeries::empty("A"), AssetSeries::empty("B")],
            &[0.5, 0.5],
            5_000.0,
        )
        .unwrap();

        let result = stress.run_scenario("dot_com_crash").unwrap();
        assert_eq!(result.portfolio_return, 0.0);
        assert_eq!(result.value_impact, 0.0);
        assert!(result
            .asset_returns
            .iter()
            .all(|a| a.source == ReturnSource::Zero));
    }

    #[test]
    fn test_unknown_scenario() {
        let stress = StressTest::new(vec![], &[], 0.0).unwrap();
        assert!(matches!(
            stress.run_scenario("tulip_mania"),
            Err(Error::UnknownScenario(_))
        ));
    }

    #[test]
    fn test_weight_count_mismatch() {
        let result = StressTest::new(vec![AssetSeries::empty("A")], &[0.5, 0.5], 0.0);
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_run_all_scenarios_records_failures() {
        // An infinite portfolio value makes any non-zero impact non-finite
        let stress = StressTest::new(vec![covid_series("A", 100.0, 70.0)], &[1.0], f64::INFINITY)
            .unwrap();

        let results = stress.run_all_scenarios();
        assert_eq!(results.len(), 5);
        assert!(results["covid_crash"].is_none());
        // Zero return times an infinite value is NaN
        assert!(results["dot_com_crash"].is_none());
    }

    #[test]
    fn test_run_all_scenarios_success() {
        let stress = StressTest::new(vec![covid_series("A", 100.0, 70.0)], &[1.0], 1_000.0)
            .unwrap();

        let results = stress.run_all_scenarios();
        assert!(results.values().all(|r| r.is_some()));
        let covid = results["covid_crash"].as_ref().unwrap();
        assert_relative_eq!(covid.value_impact, -300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_from_source() {
        let day = date(2020, 2, 19);
        let ledger = InMemoryLedger::new()
            .with_transaction("AAA", Transaction::buy(day, 10.0, 100.0))
            .with_transaction("BBB", Transaction::buy(day, 10.0, 100.0));
        let source = InMemoryPriceSource::new()
            .with_history("AAA", covid_series("AAA", 100.0, 80.0).points)
            .with_history("^GSPC", covid_series("^GSPC", 100.0, 60.0).points)
            .with_current_price("AAA", 100.0)
            .with_current_price("BBB", 100.0)
            .with_failure("BBB");
        let cache = PriceCache::default();
        cache.insert("BBB", 100.0, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap();

        let holdings = HoldingsSummary::build(
            &["AAA".to_string(), "BBB".to_string()],
            &ledger,
            &source,
            &cache,
            now,
        );
        let stress = StressTest::from_source(&source, &holdings, DEFAULT_PROXY_SYMBOL).unwrap();

        assert_eq!(stress.total_value(), 2_000.0);
        let result = stress.run_scenario("covid_crash").unwrap();
        // AAA uses its own data, BBB's history fetch fails and falls to the proxy
        assert_eq!(result.asset_returns[1].source, ReturnSource::Proxy);
        assert_relative_eq!(result.portfolio_return, -30.0, epsilon = 1e-9);
    }
}
