//! Signal generation — turns a close series into a per-date long/flat intent.
//!
//! Signals never see trade state. They describe the market, and the
//! simulator decides what to do with the intent.

pub mod rsi_threshold;
pub mod sma_crossover;

pub use rsi_threshold::RsiThreshold;
pub use sma_crossover::{latest_snapshot, SignalSnapshot, SmaCrossover};

use thiserror::Error;

use crate::domain::{PriceSeries, SignalSeries};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("{name} period must be >= 1")]
    ZeroPeriod { name: &'static str },

    #[error("fast period ({fast}) must be < slow period ({slow})")]
    PeriodOrder { fast: usize, slow: usize },

    #[error("RSI thresholds must satisfy 0 <= oversold ({oversold}) < overbought ({overbought}) <= 100")]
    ThresholdOrder { oversold: f64, overbought: f64 },
}

/// Produces a binary intent series aligned to the price dates.
pub trait SignalGenerator: Send + Sync {
    /// Human-readable name (e.g., "sma_crossover").
    fn name(&self) -> &str;

    /// Bars needed before the intent can be long.
    fn lookback(&self) -> usize;

    /// One intent per price date. Must only use closes up to each date.
    fn generate(&self, prices: &PriceSeries) -> SignalSeries;
}

/// Wants to be long on every bar. Control signal: with no stop or target hit
/// it reproduces buy-and-hold (minus the entry on the first bar).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysLong;

impl SignalGenerator for AlwaysLong {
    fn name(&self) -> &str {
        "always_long"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn generate(&self, prices: &PriceSeries) -> SignalSeries {
        let flags = vec![true; prices.len()];
        intents_for(prices, &flags)
    }
}

/// Build a series from one flag per price date.
pub(crate) fn intents_for(prices: &PriceSeries, flags: &[bool]) -> SignalSeries {
    SignalSeries::from_aligned(prices, flags)
}

#[cfg(test)]
pub(crate) fn test_prices(closes: &[f64]) -> PriceSeries {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates = (0..closes.len())
        .map(|i| base + chrono::Duration::days(i as i64))
        .collect();
    PriceSeries::new(dates, closes.to_vec()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_long_covers_every_date() {
        let prices = test_prices(&[1.0, 2.0, 3.0]);
        let s = AlwaysLong.generate(&prices);
        assert_eq!(s.align_to(&prices), vec![true, true, true]);
    }
}
