//! Map-backed price source and ledger.

use super::{DataUnavailable, Ledger, Lookback, PriceSource};
use crate::types::{AssetSeries, PricePoint, Transaction};
use std::collections::{HashMap, HashSet};

/// Price source serving preloaded histories.
///
/// Lookback windows are measured back from the last available date of each
/// series. Assets registered with [`InMemoryPriceSource::with_failure`] fail
/// every request.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceSource {
    histories: HashMap<String, AssetSeries>,
    current: HashMap<String, f64>,
    failing: HashSet<String>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, asset_id: &str, points: Vec<PricePoint>) -> Self {
        self.insert_history(asset_id, points);
        self
    }

    pub fn with_current_price(mut self, asset_id: &str, price: f64) -> Self {
        self.current.insert(asset_id.to_uppercase(), price);
        self
    }

    pub fn with_failure(mut self, asset_id: &str) -> Self {
        self.failing.insert(asset_id.to_uppercase());
        self
    }

    pub fn insert_history(&mut self, asset_id: &str, points: Vec<PricePoint>) {
        let series = AssetSeries::new(asset_id, points);
        self.histories.insert(series.asset_id.clone(), series);
    }

    fn check(&self, key: &str) -> Result<(), DataUnavailable> {
        if self.failing.contains(key) {
            return Err(DataUnavailable::new(key, "provider error"));
        }
        Ok(())
    }
}

impl PriceSource for InMemoryPriceSource {
    fn history(
        &self,
        asset_id: &str,
        lookback: Lookback,
    ) -> Result<Vec<PricePoint>, DataUnavailable> {
        let key = asset_id.to_uppercase();
        self.check(&key)?;

        let Some(series) = self.histories.get(&key) else {
            return Ok(Vec::new());
        };
        let Some(last) = series.last() else {
            return Ok(Vec::new());
        };

        let points = match lookback.start_from(last.date) {
            Some(start) => series
                .points
                .iter()
                .filter(|p| p.date >= start)
                .copied()
                .collect(),
            None => series.points.clone(),
        };
        Ok(points)
    }

    fn current_price(&self, asset_id: &str) -> Result<f64, DataUnavailable> {
        let key = asset_id.to_uppercase();
        self.check(&key)?;

        if let Some(price) = self.current.get(&key) {
            return Ok(*price);
        }

        self.histories
            .get(&key)
            .and_then(|s| s.last())
            .map(|p| p.close)
            .ok_or_else(|| DataUnavailable::new(&key, "no quote"))
    }
}

/// Ledger serving preloaded transactions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    transactions: HashMap<String, Vec<Transaction>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(mut self, asset_id: &str, transaction: Transaction) -> Self {
        self.record(asset_id, transaction);
        self
    }

    pub fn record(&mut self, asset_id: &str, transaction: Transaction) {
        let entry = self.transactions.entry(asset_id.to_uppercase()).or_default();
        entry.push(transaction);
        entry.sort_by_key(|t| t.date);
    }
}

impl Ledger for InMemoryLedger {
    fn transactions(&self, asset_id: &str) -> Vec<Transaction> {
        self.transactions
            .get(&asset_id.to_uppercase())
            .cloned()
            .unwrap_or_default()
    }
}
