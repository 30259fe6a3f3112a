//! Return calculations: TWR, CAGR, holding period and money-weighted return.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Time-weighted return of a value series, in percent.
///
/// Steps whose previous value is not positive contribute no growth. Fewer
/// than two values yield 0.
pub fn time_weighted_return(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mut twr = 1.0;
    for i in 1..values.len() {
        if values[i - 1] > 0.0 {
            twr *= values[i] / values[i - 1];
        }
    }

    (twr - 1.0) * 100.0
}

/// Compound annual growth rate, in percent.
///
/// Returns 0 if `initial_value <= 0` or `years <= 0`.
pub fn cagr(initial_value: f64, final_value: f64, years: f64) -> f64 {
    if initial_value <= 0.0 || years <= 0.0 {
        return 0.0;
    }

    ((final_value / initial_value).powf(1.0 / years) - 1.0) * 100.0
}

/// Calculate holding period return, in percent.
pub fn holding_period_return(initial_value: f64, final_value: f64) -> f64 {
    if initial_value <= 0.0 {
        return 0.0;
    }
    ((final_value - initial_value) / initial_value) * 100.0
}

/// A dated external cash flow into (positive) or out of (negative) a portfolio.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: f64,
}

impl CashFlow {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

const IRR_TOLERANCE: f64 = 1e-10;
const IRR_MAX_ITERATIONS: usize = 100;
const IRR_LOWER_BOUND: f64 = -0.9999;
const IRR_UPPER_BOUND: f64 = 100.0;

/// Money-weighted return (annualized IRR), in percent.
///
/// `flows` are deposits (positive) and withdrawals (negative); the portfolio's
/// `final_value` at `as_of` closes the position as a negative flow. Returns 0
/// when there are no flows or no root can be found.
pub fn money_weighted_return(flows: &[CashFlow], final_value: f64, as_of: NaiveDate) -> f64 {
    if flows.is_empty() {
        return 0.0;
    }

    let origin = flows.iter().map(|f| f.date).min().unwrap_or(as_of);
    let mut timed: Vec<(f64, f64)> = flows
        .iter()
        .map(|f| ((f.date - origin).num_days() as f64 / 365.0, f.amount))
        .collect();
    timed.push(((as_of - origin).num_days() as f64 / 365.0, -final_value));

    match solve_irr(&timed) {
        Some(rate) => rate * 100.0,
        None => {
            tracing::debug!("IRR did not converge for {} cash flows", flows.len());
            0.0
        }
    }
}

fn npv(rate: f64, flows: &[(f64, f64)]) -> f64 {
    flows
        .iter()
        .map(|(t, amount)| amount / (1.0 + rate).powf(*t))
        .sum()
}

fn npv_derivative(rate: f64, flows: &[(f64, f64)]) -> f64 {
    flows
        .iter()
        .map(|(t, amount)| -t * amount / (1.0 + rate).powf(t + 1.0))
        .sum()
}

/// Newton-Raphson from 10%, falling back to bisection over a bracketed range.
fn solve_irr(flows: &[(f64, f64)]) -> Option<f64> {
    let mut rate = 0.1;
    for _ in 0..IRR_MAX_ITERATIONS {
        let value = npv(rate, flows);
        if value.abs() < IRR_TOLERANCE {
            return Some(rate);
        }
        let slope = npv_derivative(rate, flows);
        if slope == 0.0 || !slope.is_finite() {
            break;
        }
        let next = rate - value / slope;
        if !next.is_finite() || next <= -1.0 {
            break;
        }
        if (next - rate).abs() < IRR_TOLERANCE {
            return Some(next);
        }
        rate = next;
    }

    bisect_irr(flows)
}

fn bisect_irr(flows: &[(f64, f64)]) -> Option<f64> {
    let mut lo = IRR_LOWER_BOUND;
    let mut hi = IRR_UPPER_BOUND;
    let mut f_lo = npv(lo, flows);
    let f_hi = npv(hi, flows);

    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo.signum() == f_hi.signum() {
        return None;
    }

    for _ in 0..200 {
        let mid = (lo + hi) / 2.0;
        let f_mid = npv(mid, flows);
        if f_mid.abs() < IRR_TOLERANCE || (hi - lo) / 2.0 < IRR_TOLERANCE {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Some((lo + hi) / 2.0)
}
