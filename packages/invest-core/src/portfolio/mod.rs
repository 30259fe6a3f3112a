//! Portfolio analytics module.
//!
//! Provides holdings valuation, aggregation of weighted asset histories,
//! performance analytics, and risk metrics.

mod aggregator;
mod holdings;
mod performance;
mod risk;

pub use aggregator::{aggregate, aggregate_union, Aggregator, PortfolioPerformance};
pub use holdings::{
    cash_flows, current_shares, invested_capital, total_commissions, Holding, HoldingsSummary,
};
pub use performance::{
    cagr, holding_period_return, money_weighted_return, time_weighted_return, CashFlow,
};
pub use risk::{
    alpha, beta, beta_by_date, correlation, correlation_matrix, drawdowns, max_drawdown,
    sharpe_ratio, volatility, Drawdowns, RiskReport, DEFAULT_RISK_FREE_RATE,
    TRADING_DAYS_PER_YEAR,
};
