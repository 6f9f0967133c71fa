//! StopLab CLI — backtest, fetch and latest-signal commands.
//!
//! Commands:
//! - `run` — backtest one or more symbols from a TOML config and/or flags
//! - `fetch` — download daily closes from Yahoo Finance to CSV
//! - `signal` — latest SMA crossover snapshot for a symbol
//!
//! Log verbosity comes from `STOPLAB_LOG` (default `info`).

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use stoplab_core::data::{
    synthetic_prices, write_prices_csv, CsvProvider, PriceProvider, YahooProvider,
};
use stoplab_core::signals::{latest_snapshot, SmaCrossover};
use stoplab_runner::{
    format_pct, format_ratio, run_batch, save_artifacts, BacktestConfig, BacktestResult, SourceKind,
};

const DEFAULT_START: &str = "2022-01-01";

#[derive(Parser)]
#[command(
    name = "stoplab",
    about = "StopLab CLI — long-only stop-loss / take-profit backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one or more symbols.
    Run {
        /// Path to a TOML config file. Flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbols to test (e.g., AAPL MSFT). Several symbols run in parallel.
        #[arg(long, num_args = 1..)]
        symbol: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD). Defaults to the latest available bar.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Read closes from a CSV file or a directory of {SYMBOL}.csv files.
        #[arg(long, conflicts_with = "synthetic")]
        csv: Option<PathBuf>,

        /// Use deterministic synthetic prices (results are tagged).
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Stop-loss distance as a fraction of the entry price (e.g., 0.05).
        #[arg(long)]
        stop_loss: Option<f64>,

        /// Take-profit distance as a fraction of the entry price (e.g., 0.10).
        #[arg(long)]
        take_profit: Option<f64>,

        /// Transaction cost in basis points per unit of turnover.
        #[arg(long)]
        cost_bps: Option<f64>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only; write no files.
        #[arg(long, default_value_t = false)]
        no_artifacts: bool,

        /// Print one JSON summary line per symbol instead of the table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Download daily closes from Yahoo Finance to a `date,close` CSV.
    Fetch {
        #[arg(long)]
        symbol: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = DEFAULT_START)]
        start: NaiveDate,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Show the latest SMA crossover reading for a symbol.
    Signal {
        #[arg(long)]
        symbol: String,

        #[arg(long, default_value_t = 20)]
        fast: usize,

        #[arg(long, default_value_t = 50)]
        slow: usize,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = DEFAULT_START)]
        start: NaiveDate,

        /// Read closes from a CSV file or directory instead of Yahoo.
        #[arg(long, conflicts_with = "synthetic")]
        csv: Option<PathBuf>,

        /// Use deterministic synthetic prices.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            symbol,
            start,
            end,
            csv,
            synthetic,
            stop_loss,
            take_profit,
            cost_bps,
            output_dir,
            no_artifacts,
            json,
        } => {
            let overrides = RunOverrides {
                symbols: symbol,
                start,
                end,
                csv,
                synthetic,
                stop_loss,
                take_profit,
                cost_bps,
            };
            let output_dir = (!no_artifacts).then_some(output_dir);
            run_backtest_cmd(config, overrides, output_dir, json)
        }
        Commands::Fetch {
            symbol,
            start,
            end,
            out,
        } => run_fetch(&symbol, start, end, out),
        Commands::Signal {
            symbol,
            fast,
            slow,
            start,
            csv,
            synthetic,
        } => run_signal(&symbol, fast, slow, start, csv, synthetic),
    }
}

fn init_tracing() -> Result<()> {
    let filter = std::env::var("STOPLAB_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .context("invalid STOPLAB_LOG filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Command-line values layered on top of the config file.
struct RunOverrides {
    symbols: Vec<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    csv: Option<PathBuf>,
    synthetic: bool,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    cost_bps: Option<f64>,
}

impl RunOverrides {
    fn apply(&self, config: &mut BacktestConfig) {
        if let Some(start) = self.start {
            config.data.start = start;
        }
        if self.end.is_some() {
            config.data.end = self.end;
        }
        if let Some(path) = &self.csv {
            config.data.source = SourceKind::Csv;
            config.data.csv_path = Some(path.clone());
        }
        if self.synthetic {
            config.data.source = SourceKind::Synthetic;
        }
        if let Some(v) = self.stop_loss {
            config.risk.stop_loss_pct = v;
        }
        if let Some(v) = self.take_profit {
            config.risk.take_profit_pct = v;
        }
        if let Some(v) = self.cost_bps {
            config.risk.cost_bps = v;
        }
    }
}

fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    overrides: RunOverrides,
    output_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut base = match &config_path {
        Some(path) => BacktestConfig::from_file(path)?,
        None => BacktestConfig::default(),
    };
    overrides.apply(&mut base);
    base.validate()?;

    let configs: Vec<BacktestConfig> = if overrides.symbols.is_empty() {
        vec![base]
    } else {
        overrides.symbols.iter().map(|s| base.with_symbol(s)).collect()
    };

    let needs_network = configs.iter().any(|c| c.data.source == SourceKind::Yahoo);
    let yahoo = if needs_network {
        Some(YahooProvider::new()?)
    } else {
        None
    };
    let provider = yahoo.as_ref().map(|p| p as &dyn PriceProvider);

    let results = run_batch(&configs, provider);

    let mut failures = 0;
    for (config, result) in configs.iter().zip(results) {
        match result {
            Ok(result) => {
                if json {
                    println!("{}", summary_json(&result));
                } else {
                    print_summary(&result);
                }
                if let Some(dir) = &output_dir {
                    let run_dir = save_artifacts(&result, dir)?;
                    println!("Artifacts saved to: {}", run_dir.display());
                }
            }
            Err(e) => {
                failures += 1;
                error!(symbol = %config.data.symbol, error = %e, "backtest failed");
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} backtests failed", configs.len());
    }
    Ok(())
}

fn run_fetch(symbol: &str, start: NaiveDate, end: Option<NaiveDate>, out: PathBuf) -> Result<()> {
    let provider = YahooProvider::new()?;
    let fetched = provider
        .fetch(symbol, start, end)
        .with_context(|| format!("failed to fetch {symbol}"))?;

    let file = std::fs::File::create(&out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    write_prices_csv(file, &fetched.prices)?;

    info!(
        symbol,
        bars = fetched.prices.len(),
        path = %out.display(),
        "prices written"
    );
    println!(
        "{symbol}: {} bars ({} to {}) written to {}",
        fetched.prices.len(),
        fetched.prices.first_date(),
        fetched.prices.last_date(),
        out.display()
    );
    Ok(())
}

fn run_signal(
    symbol: &str,
    fast: usize,
    slow: usize,
    start: NaiveDate,
    csv: Option<PathBuf>,
    synthetic: bool,
) -> Result<()> {
    let crossover = SmaCrossover::new(fast, slow)?;

    let prices = if synthetic {
        synthetic_prices(symbol, start, chrono::Utc::now().date_naive())?
    } else if let Some(path) = csv {
        CsvProvider::new(path).fetch(symbol, start, None)?.prices
    } else {
        YahooProvider::new()?.fetch(symbol, start, None)?.prices
    };

    let Some(snap) = latest_snapshot(&prices, &crossover) else {
        bail!(
            "{symbol}: {} bars is not enough for a {slow}-bar SMA",
            prices.len()
        );
    };

    println!("Ticker: {symbol}");
    println!("Date: {}", snap.date);
    println!("Last close: {:.2}", snap.close);
    println!("SMA{fast}: {:.2}", snap.fast_sma);
    println!("SMA{slow}: {:.2}", snap.slow_sma);
    println!("Signal (1=BUY, 0=OUT): {}", u8::from(snap.wants_long));
    Ok(())
}

fn summary_json(result: &BacktestResult) -> serde_json::Value {
    serde_json::json!({
        "symbol": result.symbol,
        "run_id": result.run_id,
        "start_date": result.start_date,
        "end_date": result.end_date,
        "bars": result.bar_count,
        "signal": result.signal_name,
        "has_synthetic": result.has_synthetic,
        "strategy": result.strategy,
        "buy_and_hold": result.buy_and_hold,
        "final_equity": result.final_equity(),
        "buy_and_hold_final_equity": result.buy_and_hold_final_equity(),
        "trades": result.trades.len(),
        "exposure": result.exposure,
        "total_cost": result.total_cost,
    })
}

fn print_summary(result: &BacktestResult) {
    let s = &result.strategy;
    let b = &result.buy_and_hold;
    println!();
    println!(
        "=== {} ({} to {}, {} bars, {}) ===",
        result.symbol, result.start_date, result.end_date, result.bar_count, result.signal_name
    );
    if result.has_synthetic {
        println!("WARNING: synthetic data");
    }
    println!("{:<14} {:>12} {:>12}", "", "Strategy", "Buy&Hold");
    println!("{:<14} {:>12} {:>12}", "CAGR", format_pct(s.cagr), format_pct(b.cagr));
    println!("{:<14} {:>12} {:>12}", "Sharpe", format_ratio(s.sharpe), format_ratio(b.sharpe));
    println!(
        "{:<14} {:>12} {:>12}",
        "Max Drawdown",
        format_pct(s.max_drawdown),
        format_pct(b.max_drawdown)
    );
    println!(
        "{:<14} {:>12.4} {:>12.4}",
        "Final Equity",
        result.final_equity(),
        result.buy_and_hold_final_equity()
    );
    println!(
        "Trades: {} | Exposure: {:.1}% | Total cost: {:.4}",
        result.trades.len(),
        result.exposure * 100.0,
        result.total_cost
    );
}
