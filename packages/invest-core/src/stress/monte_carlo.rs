//! Correlated Monte Carlo projection of portfolio value.
//!
//! Per-asset daily return statistics are estimated over a trailing window,
//! correlated shocks come from the Cholesky factor of the empirical
//! correlation matrix, and every path compounds from 1.0. Paths are seeded
//! independently (`seed + path_index`) so results do not depend on the number
//! of worker threads.

use super::engine::ReturnSource;
use crate::market::Lookback;
use crate::portfolio::{correlation_matrix, TRADING_DAYS_PER_YEAR};
use crate::series::{daily_returns, mean, population_std};
use crate::types::{AssetSeries, PricePoint, Weights};
use crate::{Error, Result};
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Smallest acceptable diagonal entry of the Cholesky factor.
const CHOLESKY_DIAGONAL_TOLERANCE: f64 = 1e-6;

/// Monte Carlo parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub n_simulations: usize,
    pub years: u32,
    /// Trailing window used to estimate return statistics
    pub lookback: Lookback,
    pub seed: u64,
    /// Trading days per simulated year
    pub trading_days: u32,
    /// Return every simulated path, not just the percentile bands
    pub keep_paths: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_simulations: 1000,
            years: 10,
            lookback: Lookback::FiveYears,
            seed: 42,
            trading_days: TRADING_DAYS_PER_YEAR as u32,
            keep_paths: false,
        }
    }
}

/// Deadline and cancellation flag checked before each path.
#[derive(Debug, Clone, Default)]
pub struct SimulationBudget {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl SimulationBudget {
    /// No deadline; only explicit cancellation stops the run.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Stop once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag; storing `true` cancels every simulation using this budget.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_exhausted(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Annualized return statistics of one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetStats {
    pub asset_id: String,
    /// Mean daily return times trading days
    pub annual_mean: f64,
    /// Daily standard deviation times sqrt(trading days)
    pub annual_std: f64,
    /// Number of daily returns behind the estimate
    pub observations: usize,
    pub source: ReturnSource,
}

/// Per-day percentile bands across simulated paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PercentileBands {
    pub lower_5: Vec<f64>,
    pub lower_25: Vec<f64>,
    pub median: Vec<f64>,
    pub upper_75: Vec<f64>,
    pub upper_95: Vec<f64>,
}

/// Monte Carlo outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub percentiles: PercentileBands,
    /// Share of paths ending below 1.0, in percent
    pub probability_of_loss: f64,
    /// Median final return, in percent
    pub expected_return: f64,
    /// Mean final return, in percent
    pub mean_return: f64,
    pub years: u32,
    pub n_simulations: usize,
    pub asset_stats: Vec<AssetStats>,
    pub correlation: Vec<Vec<f64>>,
    /// Simulated paths, present when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<Vec<f64>>>,
}

/// Trailing window of a history ending at its last point.
fn trailing(points: &[PricePoint], lookback: Lookback) -> &[PricePoint] {
    let Some(last) = points.last() else {
        return points;
    };
    match lookback.start_from(last.date) {
        Some(start) => &points[points.partition_point(|p| p.date < start)..],
        None => points,
    }
}

/// Daily returns of each asset over the lookback, falling back to the proxy.
fn estimation_inputs(
    assets: &[AssetSeries],
    proxy: &AssetSeries,
    lookback: Lookback,
) -> Vec<(Vec<(NaiveDate, f64)>, ReturnSource)> {
    let proxy_returns = daily_returns(trailing(&proxy.points, lookback));

    assets
        .iter()
        .map(|asset| {
            let returns = daily_returns(trailing(&asset.points, lookback));
            if !returns.is_empty() {
                (returns, ReturnSource::Asset)
            } else if !proxy_returns.is_empty() {
                tracing::warn!(
                    "{} has no return history, estimating from {}",
                    asset.asset_id,
                    proxy.asset_id
                );
                (proxy_returns.clone(), ReturnSource::Proxy)
            } else {
                tracing::warn!("{} has no return history and no proxy data", asset.asset_id);
                (Vec::new(), ReturnSource::Zero)
            }
        })
        .collect()
}

/// Lower Cholesky factor of a correlation matrix.
fn cholesky_factor(correlation: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let n = correlation.len();
    let matrix = DMatrix::from_fn(n, n, |i, j| correlation[i][j]);

    let l = matrix
        .cholesky()
        .map(|chol| chol.l())
        .ok_or_else(|| Error::NotPositiveDefinite("correlation matrix is not positive definite".into()))?;

    if let Some(i) = (0..n).find(|&i| l[(i, i)] < CHOLESKY_DIAGONAL_TOLERANCE) {
        return Err(Error::NotPositiveDefinite(format!(
            "asset {} is collinear with the others",
            i
        )));
    }
    Ok(l)
}

/// Value at percentile `p` (0..=100) of sorted data, linearly interpolated.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Run the simulation for weighted assets.
pub fn simulate(
    assets: &[AssetSeries],
    proxy: &AssetSeries,
    weights: &Weights,
    config: &MonteCarloConfig,
    budget: &SimulationBudget,
) -> Result<MonteCarloResult> {
    if config.n_simulations == 0 {
        return Err(Error::InvalidOperation(
            "Monte Carlo needs at least one simulation".into(),
        ));
    }
    if config.trading_days == 0 {
        return Err(Error::InvalidOperation(
            "Trading days per year must be positive".into(),
        ));
    }
    if assets.len() != weights.len() {
        return Err(Error::InvalidOperation(format!(
            "Got {} weights for {} assets",
            weights.len(),
            assets.len()
        )));
    }

    let days_per_year = config.trading_days as f64;
    let inputs = estimation_inputs(assets, proxy, config.lookback);

    let asset_stats: Vec<AssetStats> = assets
        .iter()
        .zip(&inputs)
        .map(|(asset, (returns, source))| {
            let values: Vec<f64> = returns.iter().map(|(_, r)| *r).collect();
            AssetStats {
                asset_id: asset.asset_id.clone(),
                annual_mean: mean(&values) * days_per_year,
                annual_std: population_std(&values) * days_per_year.sqrt(),
                observations: values.len(),
                source: *source,
            }
        })
        .collect();

    let dated: Vec<Vec<(NaiveDate, f64)>> = inputs.into_iter().map(|(r, _)| r).collect();
    let correlation = correlation_matrix(&dated);
    let l = cholesky_factor(&correlation)?;

    let n_assets = assets.len();
    let n_days = config.years as usize * config.trading_days as usize;
    let daily_drift: Vec<f64> = asset_stats
        .iter()
        .map(|s| s.annual_mean / days_per_year)
        .collect();
    let daily_scale: Vec<f64> = asset_stats
        .iter()
        .map(|s| s.annual_std / days_per_year.sqrt())
        .collect();
    let w = weights.as_slice();

    tracing::debug!(
        "Monte Carlo: {} paths x {} days over {} assets",
        config.n_simulations,
        n_days,
        n_assets
    );

    let simulated: Vec<Option<Vec<f64>>> = (0..config.n_simulations)
        .into_par_iter()
        .map(|sim| {
            if budget.is_exhausted() {
                return None;
            }

            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(sim as u64));
            let mut path = Vec::with_capacity(n_days + 1);
            let mut value = 1.0;
            path.push(value);

            for _ in 0..n_days {
                let z = DVector::<f64>::from_fn(n_assets, |_, _| rng.sample(StandardNormal));
                let shocks = &l * z;
                let portfolio_return: f64 = (0..n_assets)
                    .map(|i| (shocks[i] * daily_scale[i] + daily_drift[i]) * w[i])
                    .sum();
                value *= 1.0 + portfolio_return;
                path.push(value);
            }
            Some(path)
        })
        .collect();

    let completed = simulated.iter().filter(|p| p.is_some()).count();
    if completed < config.n_simulations {
        tracing::warn!(
            "Monte Carlo stopped after {} of {} paths",
            completed,
            config.n_simulations
        );
        return Err(Error::Cancelled {
            completed,
            requested: config.n_simulations,
        });
    }
    let paths: Vec<Vec<f64>> = simulated.into_iter().flatten().collect();

    let columns: Vec<[f64; 5]> = (0..=n_days)
        .into_par_iter()
        .map(|day| {
            let mut column: Vec<f64> = paths.iter().map(|p| p[day]).collect();
            column.sort_by(|a, b| a.total_cmp(b));
            [5.0, 25.0, 50.0, 75.0, 95.0].map(|p| percentile(&column, p))
        })
        .collect();

    let mut percentiles = PercentileBands::default();
    for [p5, p25, p50, p75, p95] in columns {
        percentiles.lower_5.push(p5);
        percentiles.lower_25.push(p25);
        percentiles.median.push(p50);
        percentiles.upper_75.push(p75);
        percentiles.upper_95.push(p95);
    }

    let finals: Vec<f64> = paths.iter().map(|p| p[n_days]).collect();
    let losses = finals.iter().filter(|v| **v < 1.0).count();
    let probability_of_loss = losses as f64 / config.n_simulations as f64 * 100.0;
    let median_final = percentiles.median.last().copied().unwrap_or(1.0);

    Ok(MonteCarloResult {
        probability_of_loss,
        expected_return: (median_final - 1.0) * 100.0,
        mean_return: (mean(&finals) - 1.0) * 100.0,
        percentiles,
        years: config.years,
        n_simulations: config.n_simulations,
        asset_stats,
        correlation,
        paths: config.keep_paths.then_some(paths),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stress::StressTest;
    use approx::assert_relative_eq;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    /// Deterministic zig-zag history with a given amplitude and phase.
    fn wiggle(id: &str, amplitude: f64, phase: usize) -> AssetSeries {
        let points = (0..120)
            .map(|i| {
                let bump = match (i + phase) % 3 {
                    0 => amplitude,
                    1 => -amplitude,
                    _ => 0.5 * amplitude,
                };
                PricePoint::new(day(i as i64), 100.0 + i as f64 * 0.1 + bump)
            })
            .collect();
        AssetSeries::new(id, points)
    }

    fn config(n_simulations: usize, years: u32) -> MonteCarloConfig {
        MonteCarloConfig {
            n_simulations,
            years,
            lookback: Lookback::Max,
            seed: 7,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_asset_succeeds() {
        let stress = StressTest::new(vec![wiggle("A", 1.0, 0)], &[1.0], 1000.0).unwrap();
        let result = stress.monte_carlo_simulation(&config(64, 1)).unwrap();

        assert_eq!(result.correlation, vec![vec![1.0]]);
        assert_eq!(result.percentiles.median.len(), 253);
        assert_eq!(result.percentiles.median[0], 1.0);
        for day in 0..=252 {
            assert!(result.percentiles.lower_5[day] <= result.percentiles.median[day]);
            assert!(result.percentiles.median[day] <= result.percentiles.upper_95[day]);
        }
        assert!((0.0..=100.0).contains(&result.probability_of_loss));
        assert!(result.paths.is_none());
    }

    #[test]
    fn test_zero_variance_asset_follows_drift() {
        let points = (0..50)
            .map(|i| PricePoint::new(day(i), 100.0 * 1.001f64.powi(i as i32)))
            .collect();
        let stress =
            StressTest::new(vec![AssetSeries::new("FLAT", points)], &[1.0], 1.0).unwrap();
        let result = stress.monte_carlo_simulation(&config(16, 1)).unwrap();

        // All bands collapse onto the drift path
        let last = result.percentiles.median.len() - 1;
        assert_relative_eq!(
            result.percentiles.lower_5[last],
            result.percentiles.upper_95[last],
            epsilon = 1e-6
        );
        assert_eq!(result.probability_of_loss, 0.0);
        assert!(result.expected_return > 0.0);
    }

    #[test]
    fn test_duplicated_series_is_not_positive_definite() {
        let stress = StressTest::new(
            vec![wiggle("A", 1.0, 0), wiggle("B", 1.0, 0)],
            &[0.5, 0.5],
            1000.0,
        )
        .unwrap();

        let result = stress.monte_carlo_simulation(&config(8, 1));
        assert!(matches!(result, Err(Error::NotPositiveDefinite(_))));
    }

    #[test]
    fn test_two_assets_deterministic_for_seed() {
        let stress = StressTest::new(
            vec![wiggle("A", 1.0, 0), wiggle("B", 2.0, 1)],
            &[0.6, 0.4],
            1000.0,
        )
        .unwrap();
        let cfg = MonteCarloConfig {
            keep_paths: true,
            ..config(32, 1)
        };

        let first = stress.monte_carlo_simulation(&cfg).unwrap();
        let second = stress.monte_carlo_simulation(&cfg).unwrap();

        assert_eq!(first.paths, second.paths);
        assert_eq!(first.expected_return, second.expected_return);
        let paths = first.paths.unwrap();
        assert_eq!(paths.len(), 32);
        assert_eq!(paths[0].len(), 253);
        assert!(first.correlation[0][1].abs() < 1.0);
    }

    #[test]
    fn test_proxy_fallback_and_zero_tier() {
        let stress = StressTest::new(
            vec![AssetSeries::empty("NEW"), wiggle("B", 1.0, 1)],
            &[0.5, 0.5],
            1000.0,
        )
        .unwrap()
        .with_proxy(wiggle("^GSPC", 2.0, 0));
        let result = stress.monte_carlo_simulation(&config(8, 1)).unwrap();
        assert_eq!(result.asset_stats[0].source, ReturnSource::Proxy);
        assert_eq!(result.asset_stats[1].source, ReturnSource::Asset);

        let bare = StressTest::new(vec![AssetSeries::empty("NEW")], &[1.0], 1000.0).unwrap();
        let result = bare.monte_carlo_simulation(&config(8, 1)).unwrap();
        assert_eq!(result.asset_stats[0].source, ReturnSource::Zero);
        assert_eq!(result.expected_return, 0.0);
        assert_eq!(result.probability_of_loss, 0.0);
    }

    #[test]
    fn test_cancelled_budget() {
        let stress = StressTest::new(vec![wiggle("A", 1.0, 0)], &[1.0], 1000.0).unwrap();
        let budget = SimulationBudget::unlimited();
        budget.cancel();

        let result = stress.monte_carlo_with_budget(&config(10, 1), &budget);
        assert!(matches!(
            result,
            Err(Error::Cancelled {
                completed: 0,
                requested: 10
            })
        ));
    }

    #[test]
    fn test_expired_deadline() {
        let budget = SimulationBudget::with_deadline(Instant::now());
        assert!(budget.is_exhausted());

        let handle = SimulationBudget::unlimited();
        let flag = handle.cancel_handle();
        assert!(!handle.is_exhausted());
        flag.store(true, Ordering::Relaxed);
        assert!(handle.is_exhausted());
    }

    #[test]
    fn test_timeout_budget() {
        let expired = SimulationBudget::with_timeout(Duration::ZERO);
        assert!(expired.is_exhausted());

        let generous = SimulationBudget::with_timeout(Duration::from_secs(3600));
        assert!(!generous.is_exhausted());

        let stress = StressTest::new(vec![wiggle("A", 1.0, 0)], &[1.0], 1000.0).unwrap();
        let result = stress.monte_carlo_with_budget(&config(8, 1), &generous).unwrap();
        assert_eq!(result.n_simulations, 8);

        assert!(matches!(
            stress.monte_carlo_with_budget(&config(8, 1), &expired),
            Err(Error::Cancelled { completed: 0, .. })
        ));
    }

    #[test]
    fn test_zero_simulations_rejected() {
        let stress = StressTest::new(vec![wiggle("A", 1.0, 0)], &[1.0], 1000.0).unwrap();
        assert!(matches!(
            stress.monte_carlo_simulation(&config(0, 1)),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_percentile_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 50.0), 3.0);
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 5.0);
        assert_relative_eq!(percentile(&data, 25.0), 2.0);
        assert_relative_eq!(percentile(&[0.0, 10.0], 5.0), 0.5);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
