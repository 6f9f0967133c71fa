//! RSI threshold intent — buy oversold, release when overbought.
//!
//! Latches long when RSI drops below `oversold` and stays long until RSI
//! rises above `overbought`. Undefined RSI keeps the current latch.

use crate::domain::{PriceSeries, SignalSeries};
use crate::indicators::rsi;

use super::{intents_for, SignalError, SignalGenerator};

#[derive(Debug, Clone)]
pub struct RsiThreshold {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl RsiThreshold {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Result<Self, SignalError> {
        if period == 0 {
            return Err(SignalError::ZeroPeriod { name: "rsi" });
        }
        if !(0.0..=100.0).contains(&oversold)
            || !(0.0..=100.0).contains(&overbought)
            || oversold >= overbought
        {
            return Err(SignalError::ThresholdOrder {
                oversold,
                overbought,
            });
        }
        Ok(Self {
            period,
            oversold,
            overbought,
        })
    }

    pub fn flags(&self, closes: &[f64]) -> Vec<bool> {
        let values = rsi(closes, self.period);
        let mut long = false;
        values
            .iter()
            .map(|&v| {
                if v < self.oversold {
                    long = true;
                } else if v > self.overbought {
                    long = false;
                }
                long
            })
            .collect()
    }
}

impl Default for RsiThreshold {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl SignalGenerator for RsiThreshold {
    fn name(&self) -> &str {
        "rsi_threshold"
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn generate(&self, prices: &PriceSeries) -> SignalSeries {
        intents_for(prices, &self.flags(prices.closes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::test_prices;

    #[test]
    fn rejects_bad_thresholds() {
        assert!(RsiThreshold::new(14, 70.0, 30.0).is_err());
        assert!(RsiThreshold::new(14, -1.0, 30.0).is_err());
        assert!(RsiThreshold::new(0, 30.0, 70.0).is_err());
    }

    #[test]
    fn latches_on_oversold_and_releases_on_overbought() {
        // Three straight losses → RSI 0 (oversold), then three gains → RSI 100.
        let closes = [100.0, 99.0, 98.0, 97.0, 98.0, 99.0, 100.0, 101.0];
        let sig = RsiThreshold::new(3, 30.0, 70.0).unwrap();
        let flags = sig.flags(&closes);
        assert_eq!(&flags[..3], &[false, false, false]);
        assert!(flags[3], "RSI 0 should latch long");
        // idx4: gains 1 vs losses 2 → RSI 33.3, still latched
        assert!(flags[4]);
        // idx6: all gains in window → RSI 100 → released
        assert!(!flags[6]);
        assert!(!flags[7]);
    }

    #[test]
    fn generate_aligns_with_prices() {
        let prices = test_prices(&[100.0, 99.0, 98.0, 97.0]);
        let sig = RsiThreshold::new(3, 30.0, 70.0).unwrap();
        let s = sig.generate(&prices);
        assert_eq!(s.len(), 4);
        assert_eq!(s.align_to(&prices), vec![false, false, false, true]);
    }
}
