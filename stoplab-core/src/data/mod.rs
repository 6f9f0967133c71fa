//! Price retrieval: Yahoo Finance, CSV files and deterministic synthetic data.

pub mod csv_file;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use csv_file::{read_prices_csv, write_prices_csv, CsvProvider};
pub use provider::{DataError, DataSource, FetchResult, PriceProvider};
pub use synthetic::{synthetic_prices, SyntheticProvider};
pub use yahoo::YahooProvider;
