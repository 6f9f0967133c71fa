//! SignalSeries — per-date binary intent (long or flat) produced upstream.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::{PriceSeries, SeriesError};

/// Binary long/flat intent keyed by date.
///
/// Dates are strictly increasing. The series does not have to cover every
/// price date: `align_to` fills gaps with "flat".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSeries {
    intents: BTreeMap<NaiveDate, bool>,
}

impl SignalSeries {
    /// Build from `(date, wants_long)` pairs in time order.
    pub fn new<I>(points: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = (NaiveDate, bool)>,
    {
        let mut intents = BTreeMap::new();
        let mut previous: Option<NaiveDate> = None;
        for (index, (date, wants_long)) in points.into_iter().enumerate() {
            if let Some(prev) = previous {
                if date <= prev {
                    return Err(SeriesError::NonMonotonicDates {
                        index,
                        previous: prev,
                        current: date,
                    });
                }
            }
            intents.insert(date, wants_long);
            previous = Some(date);
        }
        Ok(Self { intents })
    }

    /// Build from integer flags; anything other than 0 or 1 is rejected.
    pub fn from_flags<I>(points: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = (NaiveDate, i64)>,
    {
        let mut converted = Vec::new();
        for (date, value) in points {
            let wants_long = match value {
                0 => false,
                1 => true,
                _ => return Err(SeriesError::InvalidSignal { date, value }),
            };
            converted.push((date, wants_long));
        }
        Self::new(converted)
    }

    /// Pair each price date with the flags in `flags` (same length, same order).
    pub fn from_price_dates(prices: &PriceSeries, flags: &[bool]) -> Result<Self, SeriesError> {
        if flags.len() != prices.len() {
            return Err(SeriesError::LengthMismatch {
                dates: prices.len(),
                values: flags.len(),
            });
        }
        Self::new(prices.dates().iter().copied().zip(flags.iter().copied()))
    }

    /// Caller guarantees one flag per price date.
    pub(crate) fn from_aligned(prices: &PriceSeries, flags: &[bool]) -> Self {
        debug_assert_eq!(prices.len(), flags.len());
        Self {
            intents: prices
                .dates()
                .iter()
                .copied()
                .zip(flags.iter().copied())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<bool> {
        self.intents.get(&date).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, bool)> + '_ {
        self.intents.iter().map(|(&d, &v)| (d, v))
    }

    /// Number of dates with a long intent.
    pub fn long_count(&self) -> usize {
        self.intents.values().filter(|&&v| v).count()
    }

    /// Reindex onto the price dates. Missing dates default to flat.
    pub fn align_to(&self, prices: &PriceSeries) -> Vec<bool> {
        prices
            .dates()
            .iter()
            .map(|d| self.intents.get(d).copied().unwrap_or(false))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn align_fills_missing_with_flat() {
        let prices = PriceSeries::new(vec![d(2), d(3), d(4), d(5)], vec![1.0; 4]).unwrap();
        let signal = SignalSeries::new(vec![(d(2), true), (d(4), true)]).unwrap();
        assert_eq!(signal.align_to(&prices), vec![true, false, true, false]);
    }

    #[test]
    fn align_ignores_dates_outside_prices() {
        let prices = PriceSeries::new(vec![d(3), d(4)], vec![1.0; 2]).unwrap();
        let signal = SignalSeries::new(vec![(d(1), true), (d(4), true), (d(9), true)]).unwrap();
        assert_eq!(signal.align_to(&prices), vec![false, true]);
    }

    #[test]
    fn from_flags_rejects_non_binary() {
        let err = SignalSeries::from_flags(vec![(d(2), 1), (d(3), -1)]).unwrap_err();
        assert_eq!(err, SeriesError::InvalidSignal { date: d(3), value: -1 });
    }

    #[test]
    fn rejects_duplicate_dates() {
        let err = SignalSeries::new(vec![(d(2), true), (d(2), false)]).unwrap_err();
        assert!(matches!(err, SeriesError::NonMonotonicDates { .. }));
    }

    #[test]
    fn from_price_dates_checks_length() {
        let prices = PriceSeries::new(vec![d(2), d(3)], vec![1.0; 2]).unwrap();
        assert!(SignalSeries::from_price_dates(&prices, &[true]).is_err());
        let s = SignalSeries::from_price_dates(&prices, &[true, false]).unwrap();
        assert_eq!(s.long_count(), 1);
        assert_eq!(s.get(d(3)), Some(false));
    }
}
