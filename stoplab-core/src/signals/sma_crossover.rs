//! SMA crossover intent — long while the fast average is above the slow one.
//!
//! Unlike an event-style crossover, this is a regime flag: it is 1 on every
//! bar where `sma_fast > sma_slow` and 0 otherwise (including warmup).

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{PriceSeries, SignalSeries};
use crate::indicators::sma;

use super::{intents_for, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct SmaCrossover {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl SmaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, SignalError> {
        if fast_period == 0 {
            return Err(SignalError::ZeroPeriod { name: "fast" });
        }
        if fast_period >= slow_period {
            return Err(SignalError::PeriodOrder {
                fast: fast_period,
                slow: slow_period,
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
        })
    }

    /// Per-bar `(fast, slow, wants_long)`.
    pub fn compute(&self, closes: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<bool>) {
        let fast = sma(closes, self.fast_period);
        let slow = sma(closes, self.slow_period);
        // NaN comparisons are false, so warmup bars come out flat.
        let flags = fast.iter().zip(slow.iter()).map(|(f, s)| f > s).collect();
        (fast, slow, flags)
    }
}

impl Default for SmaCrossover {
    fn default() -> Self {
        Self {
            fast_period: 20,
            slow_period: 50,
        }
    }
}

impl SignalGenerator for SmaCrossover {
    fn name(&self) -> &str {
        "sma_crossover"
    }

    fn lookback(&self) -> usize {
        self.slow_period.saturating_sub(1)
    }

    fn generate(&self, prices: &PriceSeries) -> SignalSeries {
        let (_, _, flags) = self.compute(prices.closes());
        intents_for(prices, &flags)
    }
}

/// Latest-bar view of the crossover, for a quick "should I be in?" check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSnapshot {
    pub date: NaiveDate,
    pub close: f64,
    pub fast_sma: f64,
    pub slow_sma: f64,
    pub wants_long: bool,
}

/// Snapshot of the last bar where both averages are defined.
///
/// `None` if the series is shorter than the slow period.
pub fn latest_snapshot(prices: &PriceSeries, crossover: &SmaCrossover) -> Option<SignalSnapshot> {
    let (fast, slow, flags) = crossover.compute(prices.closes());
    (0..prices.len())
        .rev()
        .find(|&i| !fast[i].is_nan() && !slow[i].is_nan())
        .map(|i| SignalSnapshot {
            date: prices.dates()[i],
            close: prices.closes()[i],
            fast_sma: fast[i],
            slow_sma: slow[i],
            wants_long: flags[i],
        })
}
