//! Deterministic synthetic prices for offline development.
//!
//! A random walk from 100.0 seeded by the BLAKE3 hash of the symbol, so the
//! same symbol and window always produce the same series. Results built on
//! synthetic data are tagged as such downstream.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, DataSource, FetchResult, PriceProvider};
use crate::domain::PriceSeries;

const START_PRICE: f64 = 100.0;
const MAX_DAILY_MOVE: f64 = 0.03;

/// Weekday closes over `[start, end]`.
///
/// Errors when the window holds no weekday.
pub fn synthetic_prices(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, DataError> {
    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut dates = Vec::new();
    let mut closes = Vec::new();
    let mut price = START_PRICE;

    for current in start.iter_days().take_while(|d| *d <= end) {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        let daily_return: f64 = rng.gen_range(-MAX_DAILY_MOVE..MAX_DAILY_MOVE);
        price *= 1.0 + daily_return;
        dates.push(current);
        closes.push(price);
    }

    Ok(PriceSeries::new(dates, closes)?)
}

/// Provider wrapper around [`synthetic_prices`]. Open-ended windows stop at today.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticProvider;

impl PriceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<FetchResult, DataError> {
        let end = end.unwrap_or_else(|| chrono::Utc::now().date_naive());
        Ok(FetchResult {
            symbol: symbol.to_string(),
            prices: synthetic_prices(symbol, start, end)?,
            source: DataSource::Synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn deterministic_per_symbol() {
        let a = synthetic_prices("SPY", d(1, 1), d(1, 31)).unwrap();
        let b = synthetic_prices("SPY", d(1, 1), d(1, 31)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_symbols_differ() {
        let spy = synthetic_prices("SPY", d(1, 1), d(1, 31)).unwrap();
        let qqq = synthetic_prices("QQQ", d(1, 1), d(1, 31)).unwrap();
        assert_eq!(spy.dates(), qqq.dates());
        assert_ne!(spy.closes(), qqq.closes());
    }

    #[test]
    fn weekdays_only_and_bounded_moves() {
        let s = synthetic_prices("SPY", d(1, 1), d(3, 31)).unwrap();
        assert!(s
            .dates()
            .iter()
            .all(|dt| !matches!(dt.weekday(), Weekday::Sat | Weekday::Sun)));
        for w in s.closes().windows(2) {
            assert!((w[1] / w[0] - 1.0).abs() < MAX_DAILY_MOVE + 1e-12);
        }
    }

    #[test]
    fn weekend_only_window_errors() {
        // 2024-01-06/07 is a Saturday/Sunday
        assert!(matches!(
            synthetic_prices("SPY", d(1, 6), d(1, 7)),
            Err(DataError::InvalidSeries(_))
        ));
    }

    #[test]
    fn provider_tags_source() {
        let r = SyntheticProvider.fetch("SPY", d(1, 1), Some(d(1, 10))).unwrap();
        assert!(r.source.is_synthetic());
        assert_eq!(r.prices.len(), 8);
    }
}
