//! Performance evaluation — pure functions over an equity curve and its returns.
//!
//! Undefined quantities (zero elapsed time, zero or undefined volatility) come
//! back as NaN rather than an error. Callers check `is_nan()` before using
//! CAGR or Sharpe downstream.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::EquityCurve;
use crate::simulator::SimulationResult;

/// Trading days per year used for annualization unless overridden.
pub const DEFAULT_TRADING_PERIODS: u32 = 252;

/// Days per calendar year used to turn an elapsed span into years.
pub const DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PerformanceError {
    #[error("equity curve is empty")]
    EmptyEquity,
}

/// CAGR, Sharpe and maximum drawdown for one equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    #[serde(with = "nan_as_null")]
    pub cagr: f64,
    #[serde(with = "nan_as_null")]
    pub sharpe: f64,
    pub max_drawdown: f64,
}

impl PerformanceSummary {
    pub fn cagr_defined(&self) -> bool {
        !self.cagr.is_nan()
    }

    pub fn sharpe_defined(&self) -> bool {
        !self.sharpe.is_nan()
    }
}

/// Strategy against the buy-and-hold benchmark on the same prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub strategy: PerformanceSummary,
    pub buy_and_hold: PerformanceSummary,
}

/// Summarize an equity curve and the per-period returns that produced it.
pub fn evaluate(
    equity: &EquityCurve,
    daily_net_returns: &[f64],
    trading_periods_per_year: u32,
) -> Result<PerformanceSummary, PerformanceError> {
    if equity.is_empty() {
        return Err(PerformanceError::EmptyEquity);
    }
    Ok(PerformanceSummary {
        cagr: cagr(equity),
        sharpe: sharpe_ratio(daily_net_returns, trading_periods_per_year),
        max_drawdown: max_drawdown(equity.values()),
    })
}

/// Evaluate both the strategy and buy-and-hold curves of a simulation.
pub fn compare(
    result: &SimulationResult,
    trading_periods_per_year: u32,
) -> Result<BenchmarkComparison, PerformanceError> {
    let strategy = evaluate(
        &result.strategy_equity(),
        &result.net_returns(),
        trading_periods_per_year,
    )?;
    let buy_and_hold = evaluate(
        &result.buy_and_hold_equity(),
        &result.daily_returns(),
        trading_periods_per_year,
    )?;
    Ok(BenchmarkComparison {
        strategy,
        buy_and_hold,
    })
}

// ─── Individual metric functions ────────────────────────────────────

/// Compound annual growth rate over the calendar span of the curve.
///
/// NaN when the span is zero days or the curve is empty.
pub fn cagr(equity: &EquityCurve) -> f64 {
    let years = equity.elapsed_days() as f64 / DAYS_PER_YEAR;
    match equity.last() {
        Some(last) if years > 0.0 => last.powf(1.0 / years) - 1.0,
        _ => f64::NAN,
    }
}

/// Sample standard deviation scaled by `sqrt(periods)`.
pub fn annualized_volatility(returns: &[f64], trading_periods_per_year: u32) -> f64 {
    sample_std_dev(returns) * f64::from(trading_periods_per_year).sqrt()
}

/// Annualized mean return over annualized volatility, with no risk-free rate.
///
/// NaN when volatility is zero or undefined.
pub fn sharpe_ratio(returns: &[f64], trading_periods_per_year: u32) -> f64 {
    let vol = annualized_volatility(returns, trading_periods_per_year);
    if vol.is_nan() || vol == 0.0 {
        return f64::NAN;
    }
    mean(returns) * f64::from(trading_periods_per_year) / vol
}

/// Deepest peak-to-trough decline as a fraction (e.g. -0.25). Always <= 0.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdown_series(equity)
        .into_iter()
        .fold(0.0_f64, f64::min)
}

/// `equity[i] / max(equity[0..=i]) - 1` for every i.
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&eq| {
            if eq > peak {
                peak = eq;
            }
            eq / peak - 1.0
        })
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n - 1) standard deviation; NaN for fewer than two values.
/// Exactly 0.0 when all values are identical; the summed mean can sit a few
/// ulps off the common value.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    if values.iter().all(|&v| v == values[0]) {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// JSON has no NaN: write it as `null`, read `null` back as NaN.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn curve(values: &[f64], step_days: i64) -> EquityCurve {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = (0..values.len())
            .map(|i| base + chrono::Duration::days(i as i64 * step_days))
            .collect();
        EquityCurve::from_values(dates, values.to_vec()).unwrap()
    }

    // ── Max drawdown ──

    #[test]
    fn max_drawdown_known() {
        let dd = max_drawdown(&[1.0, 1.2, 0.9, 1.1]);
        assert!((dd - (0.9 / 1.2 - 1.0)).abs() < 1e-12);
        assert!((dd + 0.25).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        assert_eq!(max_drawdown(&[1.0, 1.0, 1.1, 1.3]), 0.0);
    }

    #[test]
    fn max_drawdown_single_point_is_zero() {
        assert_eq!(max_drawdown(&[0.8]), 0.0);
    }

    #[test]
    fn drawdown_series_tracks_running_peak() {
        let dd = drawdown_series(&[1.0, 2.0, 1.0, 2.0, 3.0]);
        assert_eq!(dd, vec![0.0, 0.0, -0.5, 0.0, 0.0]);
    }

    // ── CAGR ──

    #[test]
    fn cagr_over_span() {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let eq = EquityCurve::from_values(
            vec![base, base + chrono::Duration::days(1461)],
            vec![1.0, 4.0],
        )
        .unwrap();
        // 1461 days = 4 years → 4^(1/4) - 1
        assert!((cagr(&eq) - (4.0_f64.powf(0.25) - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn cagr_zero_span_is_nan() {
        let eq = curve(&[1.5], 1);
        assert!(cagr(&eq).is_nan());
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_constant_returns_is_nan() {
        assert!(sharpe_ratio(&[0.001; 50], 252).is_nan());
    }

    #[test]
    fn constant_returns_have_exactly_zero_deviation() {
        assert_eq!(sample_std_dev(&[0.0005; 10]), 0.0);
        assert_eq!(annualized_volatility(&[0.001; 50], 252), 0.0);
        assert!(sharpe_ratio(&[0.0005; 10], 252).is_nan());
        assert!(sharpe_ratio(&[-0.003; 7], 252).is_nan());
    }

    #[test]
    fn sharpe_single_return_is_nan() {
        assert!(sharpe_ratio(&[0.01], 252).is_nan());
    }

    #[test]
    fn sharpe_known_value() {
        let r = [0.01, -0.01, 0.02, 0.0];
        let m = 0.005;
        let sd = ((0.005f64.powi(2) + 0.015f64.powi(2) + 0.015f64.powi(2) + 0.005f64.powi(2))
            / 3.0)
            .sqrt();
        let expected = m * 252.0 / (sd * 252.0_f64.sqrt());
        assert!((sharpe_ratio(&r, 252) - expected).abs() < 1e-9);
    }

    #[test]
    fn volatility_scales_with_sqrt_periods() {
        let r = [0.01, -0.02, 0.015, 0.0, -0.005];
        let daily = sample_std_dev(&r);
        assert!((annualized_volatility(&r, 252) - daily * 252.0_f64.sqrt()).abs() < 1e-15);
    }

    // ── Aggregate ──

    #[test]
    fn evaluate_empty_equity_errors() {
        let eq = EquityCurve::from_values(vec![], vec![]).unwrap();
        assert_eq!(evaluate(&eq, &[], 252), Err(PerformanceError::EmptyEquity));
    }

    #[test]
    fn evaluate_flat_curve() {
        let eq = curve(&[1.0, 1.0, 1.0], 1);
        let s = evaluate(&eq, &[0.0, 0.0, 0.0], 252).unwrap();
        assert_eq!(s.max_drawdown, 0.0);
        assert!((s.cagr - 0.0).abs() < 1e-12);
        assert!(!s.sharpe_defined());
    }

    #[test]
    fn summary_json_renders_nan_as_null() {
        let s = PerformanceSummary {
            cagr: f64::NAN,
            sharpe: 1.5,
            max_drawdown: -0.1,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"cagr\":null"));
        let back: PerformanceSummary = serde_json::from_str(&json).unwrap();
        assert!(back.cagr.is_nan());
        assert_eq!(back.sharpe, 1.5);
    }
}
