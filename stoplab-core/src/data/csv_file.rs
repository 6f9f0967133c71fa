//! CSV import/export of daily closes.
//!
//! Format: header `date,close`, ISO dates, one row per trading day in time
//! order. Spreadsheet exports (`Date,Open,High,Low,Close,Adj Close,Volume`)
//! load without editing: extra columns are ignored and `Adj Close` wins over
//! `Close` when a row has both, as with the Yahoo provider.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::provider::{DataError, DataSource, FetchResult, PriceProvider};
use crate::domain::{PricePoint, PriceSeries};

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(default, alias = "Close")]
    close: Option<f64>,
    #[serde(default, alias = "Adj Close")]
    adj_close: Option<f64>,
}

impl PriceRow {
    fn into_point(self) -> Result<PricePoint, DataError> {
        let close = self.adj_close.or(self.close).ok_or_else(|| {
            DataError::Other(format!("{}: row has no close or adj_close value", self.date))
        })?;
        Ok(PricePoint {
            date: self.date,
            close,
        })
    }
}

#[derive(Serialize)]
struct PriceRowOut {
    date: NaiveDate,
    close: f64,
}

/// Parse a `date,close` CSV stream into a validated series.
pub fn read_prices_csv<R: Read>(reader: R) -> Result<PriceSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut points = Vec::new();
    for row in rdr.deserialize() {
        let row: PriceRow = row?;
        points.push(row.into_point()?);
    }
    Ok(PriceSeries::from_points(points)?)
}

/// Write a series as `date,close` CSV.
pub fn write_prices_csv<W: Write>(writer: W, prices: &PriceSeries) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for p in prices.iter() {
        wtr.serialize(PriceRowOut {
            date: p.date,
            close: p.close,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reads closes from disk.
///
/// `path` is either a single CSV file (used for every symbol) or a directory
/// holding one `{SYMBOL}.csv` per symbol.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_for(&self, symbol: &str) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(format!("{symbol}.csv"))
        } else {
            self.path.clone()
        }
    }
}

impl PriceProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<FetchResult, DataError> {
        let file = self.file_for(symbol);
        if !file.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let prices = read_prices_csv(std::fs::File::open(&file)?)?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            prices: prices.slice_dates(start, end)?,
            source: DataSource::CsvImport,
        })
    }
}
