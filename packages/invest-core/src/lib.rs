//! Invest Core - Portfolio analytics engine.
//!
//! This crate turns per-asset price histories into portfolio-level statistics:
//!
//! - **Time series**: percent change, date alignment, cumulative products
//! - **Return/risk metrics**: TWR, CAGR, MWR, volatility, Sharpe, drawdown, beta, alpha
//! - **Aggregation**: weighted asset histories combined into a portfolio value series
//! - **Projection**: compound-growth simulator and FIRE calculator
//! - **Stress tests**: historical scenario replay and correlated Monte Carlo
//!
//! Prices come from an external [`market::PriceSource`] and transactions from a
//! [`market::Ledger`]; everything else is a pure computation over those inputs.
//!
//! # Example
//!
//! ```rust
//! use invest_core::projection::simulate_future_investment;
//!
//! let result = simulate_future_investment(10_000.0, 500.0, 20, 0.07, 0.02);
//! println!("Nominal: {:.2}", result.nominal_final_value);
//! println!("Real:    {:.2}", result.real_final_value);
//! ```

pub mod config;
pub mod market;
pub mod portfolio;
pub mod projection;
pub mod series;
pub mod stress;
pub mod types;

// Re-export commonly used types
pub use config::{AnalyticsConfig, MonteCarloSettings};
pub use types::{
    ApiResponse, AssetSeries, PortfolioValueSeries, PricePoint, Transaction, TransactionKind,
    Weights,
};

// Re-export main functionality
pub use market::{DataUnavailable, Ledger, Lookback, PriceCache, PriceSource};
pub use portfolio::{
    aggregate, alpha, beta, cagr, drawdowns, money_weighted_return, sharpe_ratio,
    time_weighted_return, volatility, Aggregator, Drawdowns, HoldingsSummary,
    PortfolioPerformance, RiskReport,
};
pub use projection::{
    fire_calculator, simulate_future_investment, FireInputs, FireResult, SimulationResult,
};
pub use stress::{
    resolve_return, MonteCarloConfig, MonteCarloResult, ReturnSource, Scenario, ScenarioResult,
    SimulationBudget, StressTest,
};

/// Error types for invest-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Cannot simulate with current asset correlation: {0}")]
    NotPositiveDefinite(String),

    #[error("Simulation cancelled after {completed} of {requested} paths")]
    Cancelled { completed: usize, requested: usize },
}

/// Result type for invest-core operations.
pub type Result<T> = std::result::Result<T, Error>;
