//! Domain types for StopLab.

pub mod equity;
pub mod error;
pub mod price;
pub mod signal;

pub use equity::EquityCurve;
pub use error::SeriesError;
pub use price::{PricePoint, PriceSeries};
pub use signal::SignalSeries;

/// Symbol type alias
pub type Symbol = String;
