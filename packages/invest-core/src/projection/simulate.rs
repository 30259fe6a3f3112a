//! Compound-growth simulator with monthly contributions.

use serde::{Deserialize, Serialize};

/// Result of a future investment simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Nominal value at each month, starting with the initial capital
    pub nominal_values: Vec<f64>,
    /// Inflation-adjusted value at each month
    pub real_values: Vec<f64>,
    pub nominal_final_value: f64,
    pub real_final_value: f64,
    /// Initial capital plus all monthly contributions
    pub total_contributions: f64,
    /// Nominal final value minus contributions
    pub interest_earned: f64,
}

/// Effective monthly rate equivalent to an annual rate.
pub fn monthly_rate(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0
}

/// Simulate an investment month by month.
///
/// # Arguments
/// * `initial_capital` - Starting value
/// * `monthly_contribution` - Amount added at the end of each month
/// * `years` - Investment horizon
/// * `annual_return` - Expected annual return (0.07 = 7%)
/// * `inflation_rate` - Expected annual inflation
///
/// # Returns
/// Trajectories of length `years * 12 + 1` and summary totals.
pub fn simulate_future_investment(
    initial_capital: f64,
    monthly_contribution: f64,
    years: u32,
    annual_return: f64,
    inflation_rate: f64,
) -> SimulationResult {
    let months = years as usize * 12;
    let monthly_return = monthly_rate(annual_return);
    let monthly_inflation = monthly_rate(inflation_rate);

    let mut nominal_values = Vec::with_capacity(months + 1);
    let mut real_values = Vec::with_capacity(months + 1);
    nominal_values.push(initial_capital);
    real_values.push(initial_capital);

    let mut nominal = initial_capital;
    let mut deflator = 1.0;
    for _ in 1..=months {
        nominal = nominal * (1.0 + monthly_return) + monthly_contribution;
        deflator *= 1.0 + monthly_inflation;
        nominal_values.push(nominal);
        real_values.push(nominal / deflator);
    }

    let total_contributions = initial_capital + monthly_contribution * months as f64;
    let nominal_final_value = nominal;
    let real_final_value = real_values.last().copied().unwrap_or(initial_capital);

    tracing::debug!(
        "Simulated {} months: nominal {:.2}, real {:.2}",
        months,
        nominal_final_value,
        real_final_value
    );

    SimulationResult {
        nominal_values,
        real_values,
        nominal_final_value,
        real_final_value,
        total_contributions,
        interest_earned: nominal_final_value - total_contributions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_no_growth_no_inflation() {
        let result = simulate_future_investment(1000.0, 0.0, 1, 0.0, 0.0);

        assert_eq!(result.nominal_final_value, 1000.0);
        assert_eq!(result.real_final_value, 1000.0);
        assert_eq!(result.total_contributions, 1000.0);
        assert_eq!(result.interest_earned, 0.0);
        assert_eq!(result.nominal_values.len(), 13);
    }

    #[test]
    fn test_annual_rate_compounds_monthly() {
        let result = simulate_future_investment(1000.0, 0.0, 1, 0.10, 0.0);
        assert_relative_eq!(result.nominal_final_value, 1100.0, epsilon = 1e-6);
        assert_relative_eq!(result.interest_earned, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_contributions_and_inflation() {
        let result = simulate_future_investment(0.0, 100.0, 2, 0.0, 0.03);

        assert_eq!(result.nominal_values.len(), 25);
        assert_relative_eq!(result.nominal_final_value, 2400.0, epsilon = 1e-9);
        assert_eq!(result.total_contributions, 2400.0);
        // Two years of 3% inflation
        assert_relative_eq!(result.real_final_value, 2400.0 / 1.03f64.powi(2), epsilon = 1e-6);
        assert!(result.real_values.iter().zip(&result.nominal_values).all(|(r, n)| r <= n));
    }

    #[test]
    fn test_zero_years() {
        let result = simulate_future_investment(500.0, 50.0, 0, 0.07, 0.02);
        assert_eq!(result.nominal_values, vec![500.0]);
        assert_eq!(result.real_final_value, 500.0);
        assert_eq!(result.total_contributions, 500.0);
    }

    #[test]
    fn test_monthly_rate() {
        assert_relative_eq!((1.0 + monthly_rate(0.07)).powi(12), 1.07, epsilon = 1e-12);
        assert_eq!(monthly_rate(0.0), 0.0);
    }
}
