//! Analytics configuration.
//!
//! Loaded from a TOML file. Every field has a default, so a missing file or
//! a partial file is valid.

use crate::market::{Lookback, DEFAULT_PRICE_TTL_SECS};
use crate::portfolio::{DEFAULT_RISK_FREE_RATE, TRADING_DAYS_PER_YEAR};
use crate::stress::{MonteCarloConfig, DEFAULT_PROXY_SYMBOL};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_FILE_ENV: &str = "INVEST_CONFIG_FILE";

/// Monte Carlo defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub simulations: usize,
    pub years: u32,
    pub lookback: Lookback,
    /// Fixed seed for reproducible runs
    pub seed: u64,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            simulations: 500,
            years: 10,
            lookback: Lookback::FiveYears,
            seed: 42,
        }
    }
}

/// Settings shared by the metrics and stress modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Annual risk-free rate for Sharpe and alpha
    pub risk_free_rate: f64,
    pub trading_days_per_year: u32,
    /// Market proxy for assets without history
    pub proxy_symbol: String,
    /// Lifetime of a cached current price
    pub price_cache_ttl_secs: i64,
    pub monte_carlo: MonteCarloSettings,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            trading_days_per_year: TRADING_DAYS_PER_YEAR as u32,
            proxy_symbol: DEFAULT_PROXY_SYMBOL.to_string(),
            price_cache_ttl_secs: DEFAULT_PRICE_TTL_SECS,
            monte_carlo: MonteCarloSettings::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var(CONFIG_FILE_ENV) {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".invest/config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Load config from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load config from a specific path; a missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Monte Carlo parameters derived from these settings.
    pub fn monte_carlo_config(&self) -> MonteCarloConfig {
        MonteCarloConfig {
            n_simulations: self.monte_carlo.simulations,
            years: self.monte_carlo.years,
            lookback: self.monte_carlo.lookback,
            seed: self.monte_carlo.seed,
            trading_days: self.trading_days_per_year,
            keep_paths: false,
        }
    }
}
