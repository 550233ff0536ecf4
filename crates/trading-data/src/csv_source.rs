//! CSV candle source.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use trading_core::error::DataError;
use trading_core::traits::{CandleRequest, CandleSource};
use trading_core::types::Bar;

/// CSV record format. Prices are read as text so no precision is lost.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp", alias = "time")]
    date: String,
    #[serde(alias = "Instrument", alias = "symbol", alias = "Symbol", default)]
    instrument: Option<String>,
    #[serde(alias = "Open", alias = "open")]
    open: String,
    #[serde(alias = "High", alias = "high")]
    high: String,
    #[serde(alias = "Low", alias = "low")]
    low: String,
    #[serde(alias = "Close", alias = "close")]
    close: String,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: Option<String>,
}

/// Candles for one or more instruments stored in a CSV file.
///
/// Rows are expected oldest first. An optional `instrument` column filters
/// rows by the requested instrument; without it every row is assumed to
/// belong to the requested instrument.
pub struct CsvCandleSource {
    path: PathBuf,
}

impl CsvCandleSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NoDataAvailable);
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<String, DataError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DataError::ConnectionError(format!("{}: {}", self.path.display(), e)))
    }

    /// Parse rows in file order, pushing matching bars into `on_bar` until it
    /// returns false. Returns the number of bars delivered.
    fn parse(content: &str, request: &CandleRequest, mut on_bar: impl FnMut(Bar) -> bool) -> Result<usize, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut delivered = 0;
        for (line, result) in reader.deserialize::<CsvRecord>().enumerate() {
            let record = result.map_err(|e| DataError::ParseError(e.to_string()))?;
            if record
                .instrument
                .as_deref()
                .is_some_and(|i| !i.is_empty() && i != request.instrument)
            {
                continue;
            }

            let open_time = parse_timestamp(&record.date)?;
            if !request.contains(open_time) {
                continue;
            }

            let bar = Bar::new(
                request.instrument.clone(),
                request.period,
                open_time,
                parse_decimal(&record.open, "open")?,
                parse_decimal(&record.high, "high")?,
                parse_decimal(&record.low, "low")?,
                parse_decimal(&record.close, "close")?,
                match record.volume.as_deref() {
                    Some(v) if !v.is_empty() => parse_decimal(v, "volume")?,
                    _ => Decimal::ZERO,
                },
            );
            if !bar.is_well_formed() {
                return Err(DataError::ParseError(format!(
                    "row {}: inconsistent OHLC values at {}",
                    line + 2,
                    record.date
                )));
            }

            delivered += 1;
            if !on_bar(bar) {
                debug!(delivered, "Candle stream cancelled by consumer");
                break;
            }
        }
        Ok(delivered)
    }
}

#[async_trait]
impl CandleSource for CsvCandleSource {
    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<Bar>, DataError> {
        let content = self.read().await?;
        let mut bars = Vec::new();
        Self::parse(&content, request, |bar| {
            bars.push(bar);
            true
        })?;
        bars.sort_by_key(|b| b.open_time);
        Ok(bars)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, DataError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|e| DataError::ParseError(format!("{} '{}': {}", field, value, e)))
}

/// Parse the timestamp formats commonly found in exported candle files.
fn parse_timestamp(date_str: &str) -> Result<DateTime<Utc>, DataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc));
    }

    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y.%m.%d %H:%M"];
    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(dt.and_utc());
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    for format in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
            return Ok(d.and_time(chrono::NaiveTime::MIN).and_utc());
        }
    }

    // Unix timestamp; assume milliseconds if > 10 digits
    if let Ok(ts) = date_str.parse::<i64>() {
        let ms = if ts > 10_000_000_000 { ts } else { ts * 1000 };
        if let Some(dt) = Utc.timestamp_millis_opt(ms).single() {
            return Ok(dt);
        }
    }

    Err(DataError::ParseError(format!("Could not parse date: {}", date_str)))
}
