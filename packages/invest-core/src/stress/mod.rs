//! Stress testing module.
//!
//! Replays historical crisis windows against the current portfolio and runs
//! correlated Monte Carlo projections.

mod engine;
mod monte_carlo;
mod scenarios;

pub use engine::{
    resolve_return, window_return, AssetScenarioReturn, ReturnSource, ScenarioResult, StressTest,
    DEFAULT_PROXY_SYMBOL,
};
pub use monte_carlo::{
    percentile, simulate, AssetStats, MonteCarloConfig, MonteCarloResult, PercentileBands,
    SimulationBudget,
};
pub use scenarios::{get_scenario, list_scenarios, scenario_keys, Scenario, SCENARIOS};
