//! EquityCurve — compounded growth of 1.0 over a return stream.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::SeriesError;

/// Cumulative compounded equity, one value per step.
///
/// `values[0] = 1 + r[0]` and `values[i] = values[i-1] * (1 + r[i])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl EquityCurve {
    /// Compound `returns` from a base of 1.0.
    pub fn compound(dates: Vec<NaiveDate>, returns: &[f64]) -> Result<Self, SeriesError> {
        if dates.len() != returns.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: returns.len(),
            });
        }
        Ok(Self {
            dates,
            values: cumulative_product(returns),
        })
    }

    /// Wrap precomputed equity values.
    pub fn from_values(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, SeriesError> {
        if dates.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        Ok(Self { dates, values })
    }

    /// Caller guarantees equal lengths.
    pub(crate) fn from_parts(dates: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        Self { dates, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Calendar days between the first and last point (0 for <2 points).
    pub fn elapsed_days(&self) -> i64 {
        match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => (*last - *first).num_days(),
            _ => 0,
        }
    }
}

/// `Π(1 + r[0..=i])` for every i.
pub fn cumulative_product(returns: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(returns.len());
    let mut acc = 1.0_f64;
    for r in returns {
        acc *= 1.0 + r;
        out.push(acc);
    }
    out
}
