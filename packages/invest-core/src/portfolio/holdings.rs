//! Positions derived from ledger transactions and cached prices.

use super::performance::CashFlow;
use crate::market::{Ledger, PriceCache, PriceOrigin, PriceSource};
use crate::types::{Transaction, TransactionKind, Weights};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current state of one asset position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    /// Asset identifier (ticker)
    pub asset_id: String,
    /// Shares held (buys minus sells)
    pub shares: f64,
    /// Capital invested, excluding commissions
    pub invested_capital: f64,
    /// Total commissions paid
    pub commissions: f64,
    /// Price used for valuation
    pub current_price: f64,
    /// Where the valuation price came from, `None` when no price was needed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_origin: Option<PriceOrigin>,
    /// Market value (shares * price)
    pub current_value: f64,
    /// Gain relative to invested capital, in percent
    pub performance_percent: f64,
}

impl Holding {
    /// Build a holding from its transactions and a quoted price.
    pub fn from_transactions(
        asset_id: &str,
        transactions: &[Transaction],
        quote: impl FnOnce() -> (f64, PriceOrigin),
    ) -> Self {
        let shares = current_shares(transactions);
        let invested_capital = invested_capital(transactions);
        let commissions = total_commissions(transactions);

        let (current_price, price_origin) = if shares == 0.0 {
            (0.0, None)
        } else {
            let (price, origin) = quote();
            (price, Some(origin))
        };
        let current_value = shares * current_price;

        let performance_percent = if invested_capital > 0.0 {
            (current_value - invested_capital) / invested_capital * 100.0
        } else {
            0.0
        };

        Self {
            asset_id: asset_id.to_uppercase(),
            shares,
            invested_capital,
            commissions,
            current_price,
            price_origin,
            current_value,
            performance_percent,
        }
    }
}

/// Shares held after all transactions.
pub fn current_shares(transactions: &[Transaction]) -> f64 {
    transactions
        .iter()
        .map(|t| match t.kind {
            TransactionKind::Buy => t.shares,
            TransactionKind::Sell => -t.shares,
        })
        .sum()
}

/// Capital invested: buy value minus sell value, commissions excluded.
pub fn invested_capital(transactions: &[Transaction]) -> f64 {
    transactions
        .iter()
        .map(|t| match t.kind {
            TransactionKind::Buy => t.value(),
            TransactionKind::Sell => -t.value(),
        })
        .sum()
}

/// Sum of recorded commissions.
pub fn total_commissions(transactions: &[Transaction]) -> f64 {
    transactions.iter().filter_map(|t| t.commission).sum()
}

/// External cash flows implied by transactions, for money-weighted return.
///
/// Buys are deposits (value plus commission), sells are withdrawals (value
/// minus commission).
pub fn cash_flows(transactions: &[Transaction]) -> Vec<CashFlow> {
    transactions
        .iter()
        .map(|t| {
            let commission = t.commission.unwrap_or(0.0);
            let amount = match t.kind {
                TransactionKind::Buy => t.value() + commission,
                TransactionKind::Sell => -(t.value() - commission),
            };
            CashFlow::new(t.date, amount)
        })
        .collect()
}

/// Holdings across a set of assets with portfolio totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingsSummary {
    pub holdings: Vec<Holding>,
    pub total_value: f64,
    pub total_invested: f64,
    pub total_commissions: f64,
    /// Gain relative to invested capital, in percent (0 when nothing invested)
    pub total_return_percent: f64,
}

impl HoldingsSummary {
    /// Value every asset from the ledger and the price cache.
    pub fn build(
        asset_ids: &[String],
        ledger: &dyn Ledger,
        source: &dyn PriceSource,
        cache: &PriceCache,
        now: DateTime<Utc>,
    ) -> Self {
        let holdings: Vec<Holding> = asset_ids
            .iter()
            .map(|id| {
                let transactions = ledger.transactions(id);
                Holding::from_transactions(id, &transactions, || {
                    let quote = cache.current_price(source, id, now);
                    (quote.price, quote.origin)
                })
            })
            .collect();

        Self::from_holdings(holdings)
    }

    pub fn from_holdings(holdings: Vec<Holding>) -> Self {
        let total_value = holdings.iter().map(|h| h.current_value).sum();
        let total_invested = holdings.iter().map(|h| h.invested_capital).sum();
        let total_commissions = holdings.iter().map(|h| h.commissions).sum();

        let total_return_percent = if total_invested > 0.0 {
            (total_value - total_invested) / total_invested * 100.0
        } else {
            0.0
        };

        Self {
            holdings,
            total_value,
            total_invested,
            total_commissions,
            total_return_percent,
        }
    }

    /// Value weights of each holding; equal weights when nothing has value.
    pub fn weights(&self) -> Result<Weights> {
        let values: Vec<f64> = self
            .holdings
            .iter()
            .map(|h| h.current_value.max(0.0))
            .collect();
        Weights::from_values(&values)
    }

    pub fn asset_ids(&self) -> Vec<String> {
        self.holdings.iter().map(|h| h.asset_id.clone()).collect()
    }
}
