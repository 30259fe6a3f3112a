//! Deterministic growth projections.
//!
//! - **Simulation**: month-by-month compounding with contributions, nominal and real
//! - **FIRE**: capital required to live off withdrawals and the time to reach it

mod fire;
mod simulate;

pub use fire::{fire_calculator, months_to_target, FireInputs, FireResult, MAX_SEARCH_MONTHS};
pub use simulate::{monthly_rate, simulate_future_investment, SimulationResult};
