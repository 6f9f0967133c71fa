//! StopLab Runner — configuration, data loading, backtest orchestration, export.
//!
//! This crate builds on `stoplab-core` to provide:
//! - TOML configuration with documented defaults
//! - Price loading with provenance and synthetic fallback
//! - Single and parallel batch backtest runs
//! - JSON / CSV / Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use config::{BacktestConfig, ConfigError, DataConfig, SignalConfig, SourceKind};
pub use data_loader::{load_prices, LoadError, LoadedPrices};
pub use export::{
    export_json, export_ledger_csv, export_trades_csv, format_pct, format_ratio, generate_report,
    import_json, load_artifacts, save_artifacts,
};
pub use runner::{
    run_backtest_on_prices, run_batch, run_single_backtest, BacktestResult, RunError,
    SCHEMA_VERSION,
};
