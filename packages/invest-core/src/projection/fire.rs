//! Financial independence (FIRE) calculator.

use super::simulate::monthly_rate;
use serde::{Deserialize, Serialize};

/// Upper bound for the month-by-month search (100 years).
pub const MAX_SEARCH_MONTHS: u32 = 1200;

/// Inputs to the FIRE calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FireInputs {
    pub current_capital: f64,
    pub annual_expenses: f64,
    /// Safe withdrawal rate (0.04 = 4%)
    pub withdrawal_rate: f64,
    pub annual_return: f64,
    pub inflation_rate: f64,
    /// Optional monthly saving; enables the contribution-aware search
    pub monthly_contribution: Option<f64>,
}

impl Default for FireInputs {
    fn default() -> Self {
        Self {
            current_capital: 0.0,
            annual_expenses: 0.0,
            withdrawal_rate: 0.04,
            annual_return: 0.07,
            inflation_rate: 0.02,
            monthly_contribution: None,
        }
    }
}

/// Outcome of a FIRE calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireResult {
    /// Capital needed so that withdrawals cover expenses
    pub required_capital: f64,
    /// Years of pure compounding until the target; `None` when unreachable
    pub years_to_fire: Option<f64>,
    /// Years until the target with monthly contributions, if requested and
    /// reached within the search horizon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_with_contributions: Option<f64>,
    pub annual_withdrawal: f64,
    /// Real value of the required capital after 30 years of inflation
    pub purchasing_power_after_30_years: f64,
}

/// Compute required capital and the time needed to reach it.
///
/// `years_to_fire` is `ln(required / current) / ln(1 + r)` and is 0 when the
/// target is already met. It is `None` whenever the closed form is not a
/// finite non-negative number, e.g. `annual_return <= -1`, a zero return with
/// a shortfall, or `current_capital <= 0`.
pub fn fire_calculator(inputs: &FireInputs) -> FireResult {
    let required_capital = if inputs.withdrawal_rate > 0.0 {
        inputs.annual_expenses / inputs.withdrawal_rate
    } else {
        f64::INFINITY
    };

    let years_to_fire = if !required_capital.is_finite() {
        None
    } else if inputs.current_capital >= required_capital {
        Some(0.0)
    } else if inputs.current_capital <= 0.0 || inputs.annual_return <= -1.0 {
        None
    } else {
        let years =
            (required_capital / inputs.current_capital).ln() / (1.0 + inputs.annual_return).ln();
        (years.is_finite() && years >= 0.0).then_some(years)
    };

    let years_with_contributions = inputs
        .monthly_contribution
        .filter(|c| *c > 0.0 && required_capital.is_finite())
        .and_then(|c| {
            months_to_target(inputs.current_capital, required_capital, c, inputs.annual_return)
        })
        .map(|months| months as f64 / 12.0);

    let w = inputs.withdrawal_rate;
    let i = inputs.inflation_rate;
    let purchasing_power_after_30_years = if required_capital.is_finite() {
        required_capital * ((1.0 + w - i) / (1.0 + w)) * (1.0 - i).powi(30)
    } else {
        0.0
    };

    if years_to_fire.is_none() {
        tracing::debug!(
            "FIRE target {:.2} unreachable by compounding from {:.2}",
            required_capital,
            inputs.current_capital
        );
    }

    FireResult {
        required_capital,
        years_to_fire,
        years_with_contributions,
        annual_withdrawal: inputs.annual_expenses,
        purchasing_power_after_30_years,
    }
}

/// First month at which capital with contributions reaches `target`.
///
/// Linear scan capped at [`MAX_SEARCH_MONTHS`]; returns `Some(0)` when the
/// target is already met and `None` when it is not reached in time.
pub fn months_to_target(
    current_capital: f64,
    target: f64,
    monthly_contribution: f64,
    annual_return: f64,
) -> Option<u32> {
    if current_capital >= target {
        return Some(0);
    }

    let rate = monthly_rate(annual_return);
    let mut capital = current_capital;
    for month in 1..=MAX_SEARCH_MONTHS {
        capital = capital * (1.0 + rate) + monthly_contribution;
        if capital >= target {
            return Some(month);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn inputs(current: f64, expenses: f64) -> FireInputs {
        FireInputs {
            current_capital: current,
            annual_expenses: expenses,
            ..Default::default()
        }
    }

    #[test]
    fn test_already_at_required_capital() {
        let result = fire_calculator(&inputs(1_000_000.0, 40_000.0));

        assert_eq!(result.required_capital, 1_000_000.0);
        assert_eq!(result.years_to_fire, Some(0.0));
        assert_eq!(result.annual_withdrawal, 40_000.0);
    }

    #[test]
    fn test_years_to_fire_closed_form() {
        let result = fire_calculator(&FireInputs {
            annual_return: 1.0,
            ..inputs(250_000.0, 40_000.0)
        });
        // 250k doubling to 1M takes two years at 100%
        assert_relative_eq!(result.years_to_fire.unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unreachable_targets_are_none() {
        let zero_return = fire_calculator(&FireInputs {
            annual_return: 0.0,
            ..inputs(100.0, 40_000.0)
        });
        assert_eq!(zero_return.years_to_fire, None);

        let total_loss = fire_calculator(&FireInputs {
            annual_return: -1.0,
            ..inputs(100.0, 40_000.0)
        });
        assert_eq!(total_loss.years_to_fire, None);

        let no_capital = fire_calculator(&inputs(0.0, 40_000.0));
        assert_eq!(no_capital.years_to_fire, None);

        let no_withdrawal = fire_calculator(&FireInputs {
            withdrawal_rate: 0.0,
            ..inputs(100.0, 40_000.0)
        });
        assert_eq!(no_withdrawal.years_to_fire, None);
        assert_eq!(no_withdrawal.purchasing_power_after_30_years, 0.0);
    }

    #[test]
    fn test_purchasing_power() {
        let result = fire_calculator(&inputs(0.0, 40_000.0));
        let expected = 1_000_000.0 * (1.02 / 1.04) * 0.98f64.powi(30);
        assert_relative_eq!(result.purchasing_power_after_30_years, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_contributions_shorten_the_path() {
        let result = fire_calculator(&FireInputs {
            monthly_contribution: Some(2_000.0),
            ..inputs(100_000.0, 40_000.0)
        });

        let closed_form = result.years_to_fire.unwrap();
        let with_savings = result.years_with_contributions.unwrap();
        assert!(with_savings < closed_form);
    }

    #[test]
    fn test_months_to_target() {
        assert_eq!(months_to_target(500.0, 100.0, 10.0, 0.05), Some(0));
        assert_eq!(months_to_target(0.0, 1_200.0, 100.0, 0.0), Some(12));
        assert_eq!(months_to_target(0.0, 1e12, 1.0, 0.0), None);
    }
}
