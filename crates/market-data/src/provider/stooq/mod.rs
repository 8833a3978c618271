//! Stooq price source (`stooq`).
//!
//! Stooq serves quotes as CSV:
//! - Light quote endpoint (`/q/l/`) for the current price
//! - Daily history endpoint (`/q/d/l/`) for historical closes
//!
//! Missing values are reported as `N/D` cells, and an unknown symbol on the
//! history endpoint answers with a plain `No data` body.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Quote, SourceKind};
use crate::provider::{PriceSource, SourceCapabilities};

const QUOTE_URL: &str = "https://stooq.com/q/l/";
const HISTORY_URL: &str = "https://stooq.com/q/d/l/";
const PROVIDER_ID: &str = "stooq";
const MISSING: &str = "N/D";
const HISTORY_LOOKBACK_DAYS: i64 = 7;

/// Row of the light quote CSV (`f=sd2t2ohlcv`).
#[derive(Debug, Deserialize)]
struct QuoteRow {
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Close")]
    close: String,
}

/// Row of the daily history CSV.
#[derive(Debug, Deserialize)]
struct HistoryRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Close")]
    close: String,
}

/// Stooq CSV price source.
pub struct StooqProvider {
    client: Client,
}

impl StooqProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    /// Stooq symbols are lower-case; bare US tickers need the `.us` suffix.
    fn stooq_symbol(ticker: &str) -> String {
        let symbol = ticker.trim().to_lowercase();
        if symbol.contains('.') {
            symbol
        } else {
            format!("{}.us", symbol)
        }
    }

    fn parse_decimal(s: &str) -> Option<Decimal> {
        let s = s.trim();
        if s.is_empty() || s == MISSING {
            return None;
        }
        Decimal::from_str(s).ok()
    }

    fn csv_error(e: csv::Error) -> MarketDataError {
        MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse CSV: {}", e),
        }
    }

    async fn fetch_csv(&self, url: &str, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let url = reqwest::Url::parse_with_params(url, params).map_err(|e| {
            MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!("Stooq request: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Network(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        Ok(response.text().await?)
    }

    /// Parse the light quote CSV into a price and its observation time.
    fn parse_quote_csv(
        ticker: &str,
        body: &str,
    ) -> Result<(Decimal, Option<NaiveDateTime>), MarketDataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let row: QuoteRow = reader
            .deserialize()
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(ticker.to_string()))?
            .map_err(Self::csv_error)?;

        let price = Self::parse_decimal(&row.close)
            .ok_or_else(|| MarketDataError::SymbolNotFound(row.symbol.clone()))?;
        let observed = NaiveDateTime::parse_from_str(
            &format!("{} {}", row.date, row.time),
            "%Y-%m-%d %H:%M:%S",
        )
        .ok();

        Ok((price, observed))
    }

    /// Parse the daily history CSV and pick the last close on or before `date`.
    fn parse_history_csv(
        ticker: &str,
        body: &str,
        date: NaiveDate,
    ) -> Result<Decimal, MarketDataError> {
        let no_data = || MarketDataError::NoDataForDate {
            ticker: ticker.to_string(),
            date,
        };

        if body.trim().eq_ignore_ascii_case("no data") {
            return Err(no_data());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let mut best: Option<(NaiveDate, Decimal)> = None;
        for record in reader.deserialize::<HistoryRow>() {
            let row = record.map_err(Self::csv_error)?;
            let Ok(day) = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") else {
                continue;
            };
            let Some(close) = Self::parse_decimal(&row.close) else {
                continue;
            };
            if day <= date && best.map_or(true, |(d, _)| day > d) {
                best = Some((day, close));
            }
        }

        best.map(|(_, close)| close).ok_or_else(no_data)
    }
}

impl Default for StooqProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for StooqProvider {
    fn id(&self) -> &'static str {
        SourceKind::Stooq.as_str()
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::default()
    }

    async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        let symbol = Self::stooq_symbol(ticker);
        let body = self
            .fetch_csv(
                QUOTE_URL,
                &[("s", symbol.as_str()), ("f", "sd2t2ohlcv"), ("h", ""), ("e", "csv")],
            )
            .await?;

        let (price, observed) = Self::parse_quote_csv(ticker, &body)?;
        let at = observed
            .map(|dt| Utc.from_utc_datetime(&dt))
            .unwrap_or_else(Utc::now);

        Ok(Quote::current(ticker, price, PROVIDER_ID, at))
    }

    async fn fetch_historical(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Quote, MarketDataError> {
        let symbol = Self::stooq_symbol(ticker);
        let start = (date - chrono::Duration::days(HISTORY_LOOKBACK_DAYS))
            .format("%Y%m%d")
            .to_string();
        let end = date.format("%Y%m%d").to_string();

        let body = self
            .fetch_csv(
                HISTORY_URL,
                &[
                    ("s", symbol.as_str()),
                    ("d1", start.as_str()),
                    ("d2", end.as_str()),
                    ("i", "d"),
                ],
            )
            .await?;

        let price = Self::parse_history_csv(ticker, &body, date)?;
        Ok(Quote::historical(ticker, date, price, PROVIDER_ID))
    }
}
