//! PriceSeries — the validated daily close series the simulator walks.

use chrono::NaiveDate;
use serde::Serialize;

use super::SeriesError;

/// A single daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Ordered daily closes.
///
/// Guaranteed non-empty, with strictly increasing dates and finite positive
/// closes. There is no public way to build one that breaks these rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Validate and build a series from parallel date/close vectors.
    pub fn new(dates: Vec<NaiveDate>, closes: Vec<f64>) -> Result<Self, SeriesError> {
        if dates.len() != closes.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: closes.len(),
            });
        }
        if dates.is_empty() {
            return Err(SeriesError::Empty);
        }

        for (i, (&date, &close)) in dates.iter().zip(closes.iter()).enumerate() {
            if !close.is_finite() || close <= 0.0 {
                return Err(SeriesError::InvalidPrice { date, price: close });
            }
            if i > 0 && date <= dates[i - 1] {
                return Err(SeriesError::NonMonotonicDates {
                    index: i,
                    previous: dates[i - 1],
                    current: date,
                });
            }
        }

        Ok(Self { dates, closes })
    }

    /// Build from `(date, close)` pairs in time order.
    pub fn from_points<I>(points: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = PricePoint>,
    {
        let (dates, closes): (Vec<_>, Vec<_>) =
            points.into_iter().map(|p| (p.date, p.close)).unzip();
        Self::new(dates, closes)
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    pub fn last_close(&self) -> f64 {
        self.closes[self.closes.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = PricePoint> + '_ {
        self.dates
            .iter()
            .zip(self.closes.iter())
            .map(|(&date, &close)| PricePoint { date, close })
    }

    /// Restrict to `[start, end]` (both inclusive, `end = None` means open-ended).
    pub fn slice_dates(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Self, SeriesError> {
        let points: Vec<PricePoint> = self
            .iter()
            .filter(|p| p.date >= start && end.map_or(true, |e| p.date <= e))
            .collect();
        if points.is_empty() {
            return Err(SeriesError::EmptyWindow {
                start,
                end: end.unwrap_or(self.last_date()),
            });
        }
        Self::from_points(points)
    }
}
