//! Current-price cache with a time-to-live.
//!
//! Entries past their TTL are refreshed from the [`PriceSource`] but kept as
//! the last known price, so a failing provider still yields a stale quote.

use super::PriceSource;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Default cache lifetime for a price (1 hour).
pub const DEFAULT_PRICE_TTL_SECS: i64 = 3600;

/// A cached price and when it was fetched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CachedPrice {
    pub price: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Where a quoted price came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceOrigin {
    /// Cached entry still within its TTL
    Cache,
    /// Freshly fetched from the source
    Source,
    /// Source failed; expired cached entry used
    Stale,
    /// Source failed and nothing was cached
    Unavailable,
}

/// A price together with its origin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    pub origin: PriceOrigin,
}

/// Price cache keyed by asset id.
#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedPrice>>,
}

impl PriceCache {
    /// Create a cache with the given TTL in seconds.
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached price if it is younger than the TTL at `now`.
    pub fn get_fresh(&self, asset_id: &str, now: DateTime<Utc>) -> Option<f64> {
        self.last_known(asset_id)
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .map(|entry| entry.price)
    }

    /// Last cached entry regardless of age.
    pub fn last_known(&self, asset_id: &str) -> Option<CachedPrice> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&asset_id.to_uppercase()).copied()
    }

    /// Record a price fetched at `now`.
    pub fn insert(&self, asset_id: &str, price: f64, now: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            asset_id.to_uppercase(),
            CachedPrice {
                price,
                fetched_at: now,
            },
        );
    }

    pub fn invalidate(&self, asset_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&asset_id.to_uppercase());
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the current price of an asset.
    ///
    /// Order: fresh cache entry, then the source (refreshing the cache), then
    /// the last known cached price, then 0.
    pub fn current_price(
        &self,
        source: &dyn PriceSource,
        asset_id: &str,
        now: DateTime<Utc>,
    ) -> PriceQuote {
        if let Some(price) = self.get_fresh(asset_id, now) {
            return PriceQuote {
                price,
                origin: PriceOrigin::Cache,
            };
        }

        match source.current_price(asset_id) {
            Ok(price) => {
                self.insert(asset_id, price, now);
                PriceQuote {
                    price,
                    origin: PriceOrigin::Source,
                }
            }
            Err(e) => match self.last_known(asset_id) {
                Some(entry) => {
                    tracing::warn!(
                        "Using stale price for {} fetched at {}: {}",
                        asset_id,
                        entry.fetched_at,
                        e
                    );
                    PriceQuote {
                        price: entry.price,
                        origin: PriceOrigin::Stale,
                    }
                }
                None => {
                    tracing::warn!("No price available for {}: {}", asset_id, e);
                    PriceQuote {
                        price: 0.0,
                        origin: PriceOrigin::Unavailable,
                    }
                }
            },
        }
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(DEFAULT_PRICE_TTL_SECS)
    }
}
