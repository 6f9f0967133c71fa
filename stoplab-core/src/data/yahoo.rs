//! Yahoo Finance price provider.
//!
//! Fetches daily closes from Yahoo's v8 chart API with retries and
//! exponential backoff. Prices are dividend/split adjusted: the adjusted close
//! is used whenever Yahoo supplies one.
//!
//! The chart endpoint is unofficial and its payload shape can change without
//! notice; parse failures surface as `DataError::ResponseFormatChanged`.
//! Use the CSV provider when Yahoo is unreachable.

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::provider::{DataError, DataSource, FetchResult, PriceProvider};
use crate::domain::PriceSeries;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Chart API URL; `period2` is exclusive, so it points at midnight after `end`.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// Parse the chart response into `(date, close)` pairs, adjusted where possible.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<(NaiveDate, f64)>, DataError> {
        let Some(data) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
            return Err(chart_error(symbol, resp.chart.error));
        };

        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("chart has no quote block".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut points: Vec<(NaiveDate, f64)> = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("timestamp {ts} out of range"))
                })?;

            let adjusted = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());
            let raw = quote.close.get(i).copied().flatten();

            // Holidays and halted sessions come back as nulls.
            let Some(close) = adjusted.or(raw).filter(|c| c.is_finite() && *c > 0.0) else {
                continue;
            };

            // Yahoo occasionally repeats the live bar; keep the latest value.
            match points.last_mut() {
                Some(last) if last.0 == date => last.1 = close,
                _ => points.push((date, close)),
            }
        }

        if points.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        Ok(points)
    }

    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, DataError> {
        let url = Self::chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                warn!(symbol, attempt, ?delay, "retrying Yahoo request");
                std::thread::sleep(delay);
            }

            debug!(%url, "GET");
            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            match resp.status() {
                s if s == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after_secs = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(60);
                    last_error = Some(DataError::RateLimited { retry_after_secs });
                }
                s if s == StatusCode::NOT_FOUND => {
                    return Err(DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    });
                }
                s if s.is_server_error() => {
                    last_error = Some(DataError::Other(format!("{symbol}: server returned {s}")));
                }
                s if !s.is_success() => {
                    return Err(DataError::Other(format!("{symbol}: server returned {s}")));
                }
                _ => {
                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "{symbol}: undecodable chart payload: {e}"
                        ))
                    })?;
                    return Self::parse_response(symbol, chart);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DataError::Other(format!(
                "{symbol}: gave up after {} attempts",
                self.max_retries + 1
            ))
        }))
    }
}

/// Map the `chart.error` block of an empty response to a `DataError`.
fn chart_error(symbol: &str, error: Option<ChartError>) -> DataError {
    match error {
        Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => DataError::ResponseFormatChanged("chart result missing or empty".into()),
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<FetchResult, DataError> {
        let end = end.unwrap_or_else(|| chrono::Utc::now().date_naive());
        let points = self.fetch_with_retry(symbol, start, end)?;
        let (dates, closes): (Vec<_>, Vec<_>) = points.into_iter().unzip();
        Ok(FetchResult {
            symbol: symbol.to_string(),
            prices: PriceSeries::new(dates, closes)?,
            source: DataSource::YahooFinance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<(NaiveDate, f64)>, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response("TEST", resp)
    }

    #[test]
    fn prefers_adjusted_close() {
        // 2024-01-02 and 2024-01-03 at 14:30 UTC
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704205800,1704292200],
            "indicators":{
                "quote":[{"close":[100.0,101.0]}],
                "adjclose":[{"adjclose":[99.0,100.5]}]
            }}],"error":null}}"#;
        let points = parse(json).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(points[0].1, 99.0);
        assert_eq!(points[1].1, 100.5);
    }

    #[test]
    fn falls_back_to_raw_close_and_skips_nulls() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704205800,1704292200,1704378600],
            "indicators":{
                "quote":[{"close":[100.0,null,102.0]}]
            }}],"error":null}}"#;
        let points = parse(json).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].1, 102.0);
    }

    #[test]
    fn duplicate_trailing_bar_keeps_latest() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704205800,1704292200,1704300000],
            "indicators":{
                "quote":[{"close":[100.0,101.0,101.7]}]
            }}],"error":null}}"#;
        let points = parse(json).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].1, 101.7);
    }

    #[test]
    fn not_found_error_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        assert!(matches!(parse(json), Err(DataError::SymbolNotFound { .. })));
    }

    #[test]
    fn other_error_maps_to_format_change() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"oops"}}}"#;
        assert!(matches!(parse(json), Err(DataError::ResponseFormatChanged(_))));
    }

    #[test]
    fn url_covers_end_date() {
        let url = YahooProvider::chart_url(
            "SPY",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(url.contains("/chart/SPY?"));
        assert!(url.contains("period1=1704067200"));
        assert!(url.contains("period2=1704153600"));
    }
}
