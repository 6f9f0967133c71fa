//! Validation errors for price and signal series.

use chrono::NaiveDate;
use thiserror::Error;

/// Rejection reasons for malformed input series.
///
/// Raised at construction time so the simulator only ever sees clean,
/// aligned, validated data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,

    #[error("dates must be strictly increasing: {current} at index {index} follows {previous}")]
    NonMonotonicDates {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("invalid close price {price} on {date} (must be finite and > 0)")]
    InvalidPrice { date: NaiveDate, price: f64 },

    #[error("invalid signal value {value} on {date} (expected 0 or 1)")]
    InvalidSignal { date: NaiveDate, value: i64 },

    #[error("length mismatch: {dates} dates vs {values} values")]
    LengthMismatch { dates: usize, values: usize },

    #[error("no prices between {start} and {end}")]
    EmptyWindow { start: NaiveDate, end: NaiveDate },
}
