//! Backtest runner — wires together config, data loading, simulator and evaluator.
//!
//! Three entry points:
//! - `run_single_backtest()`: loads prices, then runs. Used by the CLI.
//! - `run_backtest_on_prices()`: takes pre-loaded prices. No I/O.
//! - `run_batch()`: independent runs in parallel, one run per rayon task.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stoplab_core::data::{DataSource, PriceProvider};
use stoplab_core::performance::{compare, PerformanceError, PerformanceSummary};
use stoplab_core::simulator::{simulate, SimulationError, StepRecord, Trade};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_prices, LoadError, LoadedPrices};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
    #[error("evaluation error: {0}")]
    Performance(#[from] PerformanceError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub dataset_hash: String,
    pub data_source: DataSource,
    pub has_synthetic: bool,
    pub signal_name: String,
    pub warmup_bars: usize,
    pub config: BacktestConfig,
    pub records: Vec<StepRecord>,
    pub trades: Vec<Trade>,
    pub strategy: PerformanceSummary,
    pub buy_and_hold: PerformanceSummary,
    /// Fraction of bars spent long.
    pub exposure: f64,
    pub total_cost: f64,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.records.last().map_or(1.0, |r| r.equity_strategy)
    }

    pub fn buy_and_hold_final_equity(&self) -> f64 {
        self.records.last().map_or(1.0, |r| r.equity_buy_and_hold)
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| !t.is_open())
    }
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Validate, load prices, run.
pub fn run_single_backtest(
    config: &BacktestConfig,
    provider: Option<&dyn PriceProvider>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let loaded = load_prices(&config.data, provider)?;
    run_backtest_on_prices(config, &loaded)
}

/// Run a backtest on pre-loaded prices — no I/O.
pub fn run_backtest_on_prices(
    config: &BacktestConfig,
    loaded: &LoadedPrices,
) -> Result<BacktestResult, RunError> {
    let params = config.simulation_params()?;
    let signal_generator = config.build_signal()?;
    let prices = &loaded.prices;

    let signal = signal_generator.generate(prices);
    let sim = simulate(prices, &signal, &params)?;
    let comparison = compare(&sim, config.evaluation.trading_periods_per_year)?;

    let run_id = config.run_id();
    info!(
        run_id = &run_id[..12],
        symbol = %loaded.symbol,
        signal = signal_generator.name(),
        trades = sim.trades.len(),
        cagr = comparison.strategy.cagr,
        sharpe = comparison.strategy.sharpe,
        max_drawdown = comparison.strategy.max_drawdown,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        symbol: loaded.symbol.clone(),
        start_date: prices.first_date(),
        end_date: prices.last_date(),
        bar_count: prices.len(),
        dataset_hash: loaded.dataset_hash.clone(),
        data_source: loaded.source,
        has_synthetic: loaded.has_synthetic,
        signal_name: signal_generator.name().to_string(),
        warmup_bars: signal_generator.lookback(),
        config: config.clone(),
        exposure: sim.exposure_ratio(),
        total_cost: sim.total_cost(),
        records: sim.records,
        trades: sim.trades,
        strategy: comparison.strategy,
        buy_and_hold: comparison.buy_and_hold,
    })
}

/// Run independent configs in parallel. Results come back in input order.
pub fn run_batch(
    configs: &[BacktestConfig],
    provider: Option<&dyn PriceProvider>,
) -> Vec<Result<BacktestResult, RunError>> {
    configs
        .par_iter()
        .map(|config| run_single_backtest(config, provider))
        .collect()
}
