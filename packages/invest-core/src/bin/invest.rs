//! Invest CLI - Command line interface for portfolio analytics.
//!
//! Every command prints a JSON `ApiResponse` on stdout; logs go to stderr.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use invest_core::{
    market::{fetch_series, InMemoryLedger, InMemoryPriceSource, Ledger, Lookback, PriceCache},
    portfolio::{cash_flows, money_weighted_return, Aggregator, HoldingsSummary, RiskReport},
    projection::{fire_calculator, simulate_future_investment, FireInputs},
    series::daily_returns,
    stress::{list_scenarios, StressTest},
    AnalyticsConfig, ApiResponse, PricePoint, Transaction,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "invest")]
#[command(about = "Portfolio analytics: performance, projections and stress tests")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $INVEST_CONFIG_FILE or ~/.invest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project an investment with monthly contributions
    Project {
        #[arg(long, default_value = "10000")]
        initial: f64,
        #[arg(long, default_value = "0")]
        monthly: f64,
        #[arg(long, default_value = "10")]
        years: u32,
        /// Expected annual return (0.07 = 7%)
        #[arg(long, default_value = "0.07")]
        annual_return: f64,
        #[arg(long, default_value = "0.02")]
        inflation: f64,
    },
    /// Financial independence calculator
    Fire {
        #[arg(long)]
        capital: f64,
        #[arg(long)]
        expenses: f64,
        #[arg(long, default_value = "0.04")]
        withdrawal_rate: f64,
        #[arg(long, default_value = "0.07")]
        annual_return: f64,
        #[arg(long, default_value = "0.02")]
        inflation: f64,
        /// Monthly saving toward the target
        #[arg(long)]
        monthly: Option<f64>,
    },
    /// List historical stress scenarios
    Scenarios,
    /// Replay historical scenarios against a portfolio
    Stress {
        /// Portfolio data file (JSON)
        #[arg(short, long)]
        data: PathBuf,
        /// Run a single scenario instead of all
        #[arg(short, long)]
        scenario: Option<String>,
    },
    /// Correlated Monte Carlo projection of a portfolio
    MonteCarlo {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        simulations: Option<usize>,
        #[arg(long)]
        years: Option<u32>,
        #[arg(long)]
        seed: Option<u64>,
        /// Include every simulated path in the output
        #[arg(long)]
        keep_paths: bool,
    },
    /// Portfolio performance and risk metrics
    Performance {
        #[arg(short, long)]
        data: PathBuf,
        /// Lookback window (1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, max)
        #[arg(short, long, default_value = "1y")]
        lookback: String,
    },
}

/// Asset entry of a portfolio data file.
#[derive(Debug, Deserialize)]
struct AssetInput {
    asset_id: String,
    #[serde(default)]
    prices: Vec<PricePoint>,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

/// Portfolio data file: assets with histories and transactions, plus an
/// optional benchmark that also serves as the market proxy.
#[derive(Debug, Deserialize)]
struct PortfolioInput {
    assets: Vec<AssetInput>,
    #[serde(default)]
    benchmark: Option<AssetInput>,
}

struct LoadedPortfolio {
    source: InMemoryPriceSource,
    ledger: InMemoryLedger,
    asset_ids: Vec<String>,
    benchmark_id: String,
}

fn load_portfolio(path: &Path, config: &AnalyticsConfig) -> Result<LoadedPortfolio> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read portfolio data {}", path.display()))?;
    let input: PortfolioInput =
        serde_json::from_str(&content).context("Invalid portfolio data file")?;

    let mut source = InMemoryPriceSource::new();
    let mut ledger = InMemoryLedger::new();
    let mut asset_ids = Vec::with_capacity(input.assets.len());

    for asset in input.assets {
        source.insert_history(&asset.asset_id, asset.prices);
        if let Some(price) = asset.current_price {
            source = source.with_current_price(&asset.asset_id, price);
        }
        for tx in asset.transactions {
            ledger.record(&asset.asset_id, tx);
        }
        asset_ids.push(asset.asset_id.to_uppercase());
    }

    let benchmark_id = match input.benchmark {
        Some(benchmark) => {
            source.insert_history(&benchmark.asset_id, benchmark.prices);
            benchmark.asset_id.to_uppercase()
        }
        None => config.proxy_symbol.clone(),
    };

    tracing::info!("Loaded {} assets from {}", asset_ids.len(), path.display());

    Ok(LoadedPortfolio {
        source,
        ledger,
        asset_ids,
        benchmark_id,
    })
}

impl LoadedPortfolio {
    fn holdings(&self, cache: &PriceCache) -> HoldingsSummary {
        HoldingsSummary::build(&self.asset_ids, &self.ledger, &self.source, cache, Utc::now())
    }

    fn stress_test(&self, cache: &PriceCache) -> Result<StressTest> {
        let holdings = self.holdings(cache);
        Ok(StressTest::from_source(
            &self.source,
            &holdings,
            &self.benchmark_id,
        )?)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let response = match run(cli) {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => {
            tracing::error!("{:#}", e);
            ApiResponse::err(format!("{:#}", e))
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run(cli: Cli) -> Result<Value> {
    let config = match &cli.config {
        Some(path) => AnalyticsConfig::load_from_path(path)?,
        None => AnalyticsConfig::load()?,
    };

    match cli.command {
        Commands::Project {
            initial,
            monthly,
            years,
            annual_return,
            inflation,
        } => {
            let result = simulate_future_investment(initial, monthly, years, annual_return, inflation);
            Ok(serde_json::to_value(result)?)
        }
        Commands::Fire {
            capital,
            expenses,
            withdrawal_rate,
            annual_return,
            inflation,
            monthly,
        } => {
            let result = fire_calculator(&FireInputs {
                current_capital: capital,
                annual_expenses: expenses,
                withdrawal_rate,
                annual_return,
                inflation_rate: inflation,
                monthly_contribution: monthly,
            });
            Ok(serde_json::to_value(result)?)
        }
        Commands::Scenarios => Ok(json!({
            "scenarios": list_scenarios(),
        })),
        Commands::Stress { data, scenario } => handle_stress(&data, scenario, &config),
        Commands::MonteCarlo {
            data,
            simulations,
            years,
            seed,
            keep_paths,
        } => {
            let portfolio = load_portfolio(&data, &config)?;
            let cache = PriceCache::new(config.price_cache_ttl_secs);
            let stress = portfolio.stress_test(&cache)?;

            let mut mc = config.monte_carlo_config();
            mc.n_simulations = simulations.unwrap_or(mc.n_simulations);
            mc.years = years.unwrap_or(mc.years);
            mc.seed = seed.unwrap_or(mc.seed);
            mc.keep_paths = keep_paths;

            let result = stress.monte_carlo_simulation(&mc)?;
            Ok(serde_json::to_value(result)?)
        }
        Commands::Performance { data, lookback } => handle_performance(&data, &lookback, &config),
    }
}

fn handle_stress(data: &Path, scenario: Option<String>, config: &AnalyticsConfig) -> Result<Value> {
    let portfolio = load_portfolio(data, config)?;
    let cache = PriceCache::new(config.price_cache_ttl_secs);
    let stress = portfolio.stress_test(&cache)?;

    match scenario {
        Some(key) => Ok(serde_json::to_value(stress.run_scenario(&key)?)?),
        None => Ok(json!({
            "total_value": stress.total_value(),
            "results": stress.run_all_scenarios(),
        })),
    }
}

fn handle_performance(data: &Path, lookback: &str, config: &AnalyticsConfig) -> Result<Value> {
    let lookback: Lookback = lookback.parse()?;
    let portfolio = load_portfolio(data, config)?;
    let cache = PriceCache::new(config.price_cache_ttl_secs);
    let now = Utc::now();

    let aggregator = Aggregator::new(&portfolio.source, &portfolio.ledger, &cache);
    let holdings = aggregator.holdings(&portfolio.asset_ids, now);
    let performance = aggregator.performance(&portfolio.asset_ids, lookback, now)?;

    let benchmark = fetch_series(&portfolio.source, &portfolio.benchmark_id, lookback);
    let risk = performance.as_ref().map(|perf| {
        RiskReport::from_returns(
            &perf.dated_returns(),
            &daily_returns(&benchmark.points),
            config.risk_free_rate,
        )
    });

    let as_of: NaiveDate = performance
        .as_ref()
        .and_then(|perf| perf.series.points.last().map(|(d, _)| *d))
        .unwrap_or_else(|| now.date_naive());
    let flows: Vec<_> = portfolio
        .asset_ids
        .iter()
        .flat_map(|id| cash_flows(&portfolio.ledger.transactions(id)))
        .collect();
    let mwr = money_weighted_return(&flows, holdings.total_value, as_of);

    Ok(json!({
        "lookback": lookback,
        "holdings": holdings,
        "performance": performance,
        "normalized": performance.as_ref().map(|p| p.normalized()),
        "risk": risk,
        "money_weighted_return": mwr,
    }))
}
