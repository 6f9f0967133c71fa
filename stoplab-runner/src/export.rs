//! Run artifacts: `manifest.json` (the whole result), `ledger.csv`,
//! `trades.csv` and a Markdown `report.md` comparing the strategy with
//! buy-and-hold.
//!
//! Manifests carry `schema_version`; a manifest written by a newer build is
//! refused on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stoplab_core::simulator::{StepRecord, Trade};

use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON. NaN metrics become `null`.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("serializing backtest manifest")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult = serde_json::from_str(json).context("parsing backtest manifest")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (this build reads up to {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Per-bar ledger.
///
/// Columns: date, close, signal, position, entry_price, daily_return,
/// net_return, equity_strategy, equity_buy_and_hold. `entry_price` is empty
/// on flat bars.
pub fn export_ledger_csv(records: &[StepRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "close",
        "signal",
        "position",
        "entry_price",
        "daily_return",
        "net_return",
        "equity_strategy",
        "equity_buy_and_hold",
    ])?;

    for r in records {
        wtr.write_record([
            &r.date.to_string(),
            &format!("{:.6}", r.close),
            &u8::from(r.signal).to_string(),
            &r.position.as_u8().to_string(),
            &r.entry_price.map(|p| format!("{p:.6}")).unwrap_or_default(),
            &format!("{:.8}", r.daily_return),
            &format!("{:.8}", r.net_return),
            &format!("{:.8}", r.equity_strategy),
            &format!("{:.8}", r.equity_buy_and_hold),
        ])?;
    }

    finish_csv(wtr)
}

/// Trade list. Open trades have empty exit columns and status `open`.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_date",
        "entry_price",
        "exit_date",
        "exit_price",
        "exit_reason",
        "bars_held",
        "gross_return",
        "status",
    ])?;

    for t in trades {
        let (exit_date, exit_price, reason) = match &t.exit {
            Some(x) => (
                x.date.to_string(),
                format!("{:.6}", x.price),
                x.triggers.label(),
            ),
            None => (String::new(), String::new(), String::new()),
        };
        let status = if t.is_open() { "open" } else { "closed" }.to_string();
        wtr.write_record([
            &t.entry_date.to_string(),
            &format!("{:.6}", t.entry_price),
            &exit_date,
            &exit_price,
            &reason,
            &t.bars_held.to_string(),
            &format!("{:.6}", t.gross_return),
            &status,
        ])?;
    }

    finish_csv(wtr)
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("flushing CSV buffer")?;
    String::from_utf8(data).context("CSV buffer is not UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the four artifacts into `output_dir/{symbol}_{run_id[..12]}/` and
/// return that directory. The same config always maps to the same directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id: String = result.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", result.symbol, short_id));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("ledger.csv"), export_ledger_csv(&result.records)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("report.md"), generate_report(result))?;

    Ok(run_dir)
}

/// Read back the manifest written by `save_artifacts`.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Markdown report for a single run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str(&format!("# {} stop/target backtest\n\n", result.symbol));

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", result.symbol));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.start_date, result.end_date
    ));
    md.push_str(&format!(
        "| Bars | {} ({} lookback) |\n",
        result.bar_count, result.warmup_bars
    ));
    md.push_str(&format!("| Signal | {} |\n", result.signal_name));
    let risk = &result.config.risk;
    md.push_str(&format!(
        "| Stop Loss / Take Profit | {:.2}% / {:.2}% |\n",
        risk.stop_loss_pct * 100.0,
        risk.take_profit_pct * 100.0
    ));
    md.push_str(&format!("| Cost | {} bps per unit turnover |\n", risk.cost_bps));
    md.push_str(&format!("| Data Source | {} |\n", result.data_source));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    if result.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    let s = &result.strategy;
    let b = &result.buy_and_hold;
    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Strategy | Buy & Hold |\n");
    md.push_str("| --- | ---: | ---: |\n");
    md.push_str(&format!(
        "| Final Equity | {:.4} | {:.4} |\n",
        result.final_equity(),
        result.buy_and_hold_final_equity()
    ));
    md.push_str(&format!(
        "| CAGR | {} | {} |\n",
        format_pct(s.cagr),
        format_pct(b.cagr)
    ));
    md.push_str(&format!(
        "| Sharpe | {} | {} |\n",
        format_ratio(s.sharpe),
        format_ratio(b.sharpe)
    ));
    md.push_str(&format!(
        "| Max Drawdown | {} | {} |\n",
        format_pct(s.max_drawdown),
        format_pct(b.max_drawdown)
    ));
    md.push_str(&format!(
        "| Exposure | {:.1}% | 100.0% |\n",
        result.exposure * 100.0
    ));
    md.push_str(&format!("| Total Cost | {:.4} | 0.0000 |\n", result.total_cost));
    md.push('\n');

    md.push_str("## Trades\n\n");
    let closed: Vec<&Trade> = result.closed_trades().collect();
    let winners = closed.iter().filter(|t| t.is_winner()).count();
    let count = |f: fn(&Trade) -> bool| closed.iter().filter(|t| f(t)).count();
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Closed | {} |\n", closed.len()));
    md.push_str(&format!(
        "| Open at End | {} |\n",
        result.trades.len() - closed.len()
    ));
    if !closed.is_empty() {
        md.push_str(&format!(
            "| Win Rate | {:.1}% |\n",
            winners as f64 / closed.len() as f64 * 100.0
        ));
    }
    md.push_str(&format!(
        "| Stop-Loss Exits | {} |\n",
        count(|t| t.exit.as_ref().is_some_and(|x| x.triggers.stop_loss))
    ));
    md.push_str(&format!(
        "| Take-Profit Exits | {} |\n",
        count(|t| t.exit.as_ref().is_some_and(|x| x.triggers.take_profit))
    ));
    md.push_str(&format!(
        "| Signal Exits | {} |\n",
        count(|t| t.exit.as_ref().is_some_and(|x| x.triggers.signal_withdrawn))
    ));
    md.push('\n');

    md
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Fraction as a percentage with two decimals; NaN renders as `n/a`.
pub fn format_pct(v: f64) -> String {
    if v.is_nan() {
        "n/a".into()
    } else {
        format!("{:.2}%", v * 100.0)
    }
}

/// Plain number with three decimals; NaN renders as `n/a`.
pub fn format_ratio(v: f64) -> String {
    if v.is_nan() {
        "n/a".into()
    } else {
        format!("{v:.3}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stoplab_core::data::DataSource;
    use stoplab_core::domain::PriceSeries;

    use crate::config::BacktestConfig;
    use crate::data_loader::LoadedPrices;
    use crate::runner::run_backtest_on_prices;

    // ─── Test helpers ────────────────────────────────────────────────

    fn sample_result(closes: &[f64]) -> BacktestResult {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..closes.len())
            .map(|i| base + chrono::Duration::days(i as i64))
            .collect();
        let prices = PriceSeries::new(dates, closes.to_vec()).unwrap();
        let loaded = LoadedPrices::new("SPY", prices, DataSource::CsvImport);
        let config =
            BacktestConfig::from_toml("[signal]\ntype = \"always_long\"\n[risk]\ncost_bps = 0.0\n")
                .unwrap();
        run_backtest_on_prices(&config, &loaded).unwrap()
    }

    // ─── JSON ────────────────────────────────────────────────────────

    #[test]
    fn json_roundtrip() {
        let original = sample_result(&[100.0, 94.0, 101.0, 103.0]);
        let json = export_json(&original).unwrap();
        let restored = import_json(&json).unwrap();

        assert_eq!(restored.schema_version, SCHEMA_VERSION);
        assert_eq!(restored.symbol, original.symbol);
        assert_eq!(restored.records.len(), original.records.len());
        assert_eq!(restored.trades.len(), original.trades.len());
        assert_eq!(restored.config, original.config);
        for (a, b) in restored.records.iter().zip(original.records.iter()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.transition, b.transition);
            assert!((a.equity_strategy - b.equity_strategy).abs() < 1e-12);
        }
    }

    #[test]
    fn nan_metrics_serialize_as_null() {
        // Single bar: zero elapsed days → CAGR undefined.
        let result = sample_result(&[100.0]);
        assert!(result.strategy.cagr.is_nan());
        let json = export_json(&result).unwrap();
        assert!(json.contains("\"cagr\": null"));
        let restored = import_json(&json).unwrap();
        assert!(restored.strategy.cagr.is_nan());
    }

    #[test]
    fn newer_schema_rejected() {
        let mut result = sample_result(&[100.0, 101.0]);
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    // ─── CSV ─────────────────────────────────────────────────────────

    #[test]
    fn ledger_csv_layout() {
        let result = sample_result(&[100.0, 94.0, 101.0]);
        let csv = export_ledger_csv(&result.records).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "date,close,signal,position,entry_price,daily_return,net_return,equity_strategy,equity_buy_and_hold"
        );
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("2024-01-01,100.000000,1,1,100.000000,"));
        // Stop-loss bar: flat, no entry price.
        assert!(lines[2].starts_with("2024-01-02,94.000000,1,0,,"));
    }

    #[test]
    fn trades_csv_marks_open_trade() {
        let result = sample_result(&[100.0, 94.0, 101.0]);
        let csv = export_trades_csv(&result.trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("stop_loss"));
        assert!(lines[1].ends_with("closed"));
        assert!(lines[2].ends_with("open"));
    }

    // ─── Markdown ────────────────────────────────────────────────────

    #[test]
    fn report_shows_both_curves_and_na() {
        let result = sample_result(&[100.0]);
        let md = generate_report(&result);
        assert!(md.starts_with(&format!("# {} stop/target backtest", result.symbol)));
        assert!(md.contains("| Metric | Strategy | Buy & Hold |"));
        assert!(md.contains("| CAGR | n/a | n/a |"));
        assert!(!md.contains("SYNTHETIC"));
    }

    #[test]
    fn number_formatting_handles_nan() {
        assert_eq!(format_pct(-0.0625), "-6.25%");
        assert_eq!(format_pct(f64::NAN), "n/a");
        assert_eq!(format_ratio(1.23456), "1.235");
        assert_eq!(format_ratio(f64::NAN), "n/a");
    }

    #[test]
    fn report_flags_synthetic_data() {
        let mut result = sample_result(&[100.0, 101.0]);
        result.has_synthetic = true;
        assert!(generate_report(&result).contains("**SYNTHETIC**"));
    }
}
