//! Portfolio risk metrics calculation.
//!
//! Provides volatility, Sharpe ratio, drawdown, beta, alpha and correlation.
//! Degenerate inputs resolve to neutral defaults instead of errors.

use crate::series::{align_by_date, mean, population_std};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trading days per year used for annualization (assumes daily sampling).
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Default annual risk-free rate.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Relative spread below which a series counts as constant.
const FLAT_TOLERANCE: f64 = 1e-12;

/// True when `std` is rounding noise around `mean` rather than real variation.
fn is_flat(std: f64, mean: f64) -> bool {
    std <= FLAT_TOLERANCE * mean.abs().max(1.0)
}

/// Population standard deviation of returns, optionally annualized by `sqrt(252)`.
pub fn volatility(returns: &[f64], annualize: bool) -> f64 {
    let std = population_std(returns);
    if annualize {
        std * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        std
    }
}

/// Sharpe ratio: `(mean(returns) - risk_free_rate) / volatility(returns)`.
///
/// Volatility is annualized. Returns 0 when the returns do not vary.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    let avg = mean(returns);
    if is_flat(population_std(returns), avg) {
        return 0.0;
    }

    (avg - risk_free_rate) / volatility(returns, true)
}

/// Drawdown series and its worst value, both in percent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Drawdowns {
    /// Per-point decline from the running peak (non-positive)
    pub series: Vec<f64>,
    /// Most negative drawdown (0 for a non-decreasing series)
    pub max_drawdown: f64,
}

/// Calculate drawdowns from a series of values.
///
/// `dd_i = (v_i - M_i) / M_i * 100` where `M_i` is the running maximum.
/// Points with a non-positive running maximum have drawdown 0.
pub fn drawdowns(values: &[f64]) -> Drawdowns {
    if values.is_empty() {
        return Drawdowns::default();
    }

    let mut running_max = f64::NEG_INFINITY;
    let mut max_drawdown: f64 = 0.0;
    let series: Vec<f64> = values
        .iter()
        .map(|&value| {
            running_max = running_max.max(value);
            let dd = if running_max > 0.0 {
                ((value - running_max) / running_max * 100.0).min(0.0)
            } else {
                0.0
            };
            max_drawdown = max_drawdown.min(dd);
            dd
        })
        .collect();

    Drawdowns {
        series,
        max_drawdown,
    }
}

/// Maximum drawdown of a value series, in percent (non-positive).
pub fn max_drawdown(values: &[f64]) -> f64 {
    drawdowns(values).max_drawdown
}

/// OLS slope of portfolio returns regressed on benchmark returns.
///
/// Pairs are taken index by index up to the shorter series; any pair with a
/// non-finite value is dropped. Returns 1.0 with fewer than two valid pairs
/// or a benchmark with no variance.
pub fn beta(portfolio_returns: &[f64], benchmark_returns: &[f64]) -> f64 {
    let (port, bench): (Vec<f64>, Vec<f64>) = portfolio_returns
        .iter()
        .zip(benchmark_returns)
        .filter(|(p, b)| p.is_finite() && b.is_finite())
        .map(|(p, b)| (*p, *b))
        .unzip();

    ols_slope(&port, &bench).unwrap_or(1.0)
}

/// Beta over date-keyed return series, using only dates present in both.
pub fn beta_by_date(
    portfolio_returns: &[(NaiveDate, f64)],
    benchmark_returns: &[(NaiveDate, f64)],
) -> f64 {
    let aligned = align_by_date(portfolio_returns, benchmark_returns);
    let port: Vec<f64> = aligned.iter().map(|(_, p, _)| *p).collect();
    let bench: Vec<f64> = aligned.iter().map(|(_, _, b)| *b).collect();
    beta(&port, &bench)
}

fn ols_slope(y: &[f64], x: &[f64]) -> Option<f64> {
    if y.len() < 2 {
        return None;
    }

    let mean_x = mean(x);
    let mean_y = mean(y);
    let covariance: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();
    let variance_x: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();

    if variance_x <= f64::EPSILON {
        return None;
    }

    Some(covariance / variance_x)
}

/// Jensen's alpha, annualized with 252 trading days.
///
/// `mean_p * 252 - (rf + beta * (mean_b * 252 - rf))`
pub fn alpha(portfolio_returns: &[f64], benchmark_returns: &[f64], risk_free_rate: f64) -> f64 {
    let b = beta(portfolio_returns, benchmark_returns);
    let avg_portfolio = finite_mean(portfolio_returns) * TRADING_DAYS_PER_YEAR;
    let avg_benchmark = finite_mean(benchmark_returns) * TRADING_DAYS_PER_YEAR;

    avg_portfolio - (risk_free_rate + b * (avg_benchmark - risk_free_rate))
}

fn finite_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    mean(&finite)
}

/// Pearson correlation, `None` when either side has no variance or fewer
/// than two observations.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);

    let mean_a = mean(a);
    let mean_b = mean(b);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    let len = n as f64;
    if is_flat((var_a / len).sqrt(), mean_a) || is_flat((var_b / len).sqrt(), mean_b) {
        return None;
    }

    Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Pairwise correlation matrix of date-keyed return series.
///
/// Each pair is aligned by date first. Undefined pairs are 0 and the
/// diagonal is always 1.
pub fn correlation_matrix(series: &[Vec<(NaiveDate, f64)>]) -> Vec<Vec<f64>> {
    let n = series.len();
    let mut matrix = vec![vec![0.0; n]; n];

    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let aligned = align_by_date(&series[i], &series[j]);
            let a: Vec<f64> = aligned.iter().map(|(_, x, _)| *x).collect();
            let b: Vec<f64> = aligned.iter().map(|(_, _, y)| *y).collect();
            let rho = correlation(&a, &b).unwrap_or(0.0);
            matrix[i][j] = rho;
            matrix[j][i] = rho;
        }
    }

    matrix
}

/// Risk summary for a portfolio return series against a benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    /// Annualized volatility (fraction)
    pub volatility: f64,
    /// Sharpe ratio
    pub sharpe_ratio: f64,
    /// Beta against the benchmark
    pub beta: f64,
    /// Annualized Jensen's alpha (fraction)
    pub alpha: f64,
    /// Risk-free rate used
    pub risk_free_rate: f64,
    /// Number of date-aligned observations behind beta/alpha
    pub paired_observations: usize,
}

impl RiskReport {
    /// Build a report from date-keyed portfolio and benchmark returns.
    pub fn from_returns(
        portfolio_returns: &[(NaiveDate, f64)],
        benchmark_returns: &[(NaiveDate, f64)],
        risk_free_rate: f64,
    ) -> Self {
        let port: Vec<f64> = portfolio_returns.iter().map(|(_, r)| *r).collect();
        let aligned = align_by_date(portfolio_returns, benchmark_returns);
        let paired_port: Vec<f64> = aligned.iter().map(|(_, p, _)| *p).collect();
        let paired_bench: Vec<f64> = aligned.iter().map(|(_, _, b)| *b).collect();

        Self {
            volatility: volatility(&port, true),
            sharpe_ratio: sharpe_ratio(&port, risk_free_rate),
            beta: beta(&paired_port, &paired_bench),
            alpha: alpha(&paired_port, &paired_bench, risk_free_rate),
            risk_free_rate,
            paired_observations: aligned.len(),
        }
    }
}
