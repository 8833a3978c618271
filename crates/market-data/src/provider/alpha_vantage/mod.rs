//! Alpha Vantage price source (`alpha_vantage`).
//!
//! - Current prices via the GLOBAL_QUOTE endpoint
//! - Historical closes via the TIME_SERIES_DAILY endpoint (compact window)
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute, and
//! throttled responses come back as HTTP 200 with a "Note" payload.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{Quote, SourceKind};
use crate::provider::{PriceSource, SourceCapabilities};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "alpha_vantage";

/// Alpha Vantage price source.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

/// TIME_SERIES_DAILY response for equities
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyQuote>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyQuote {
    #[serde(rename = "4. close")]
    close: String,
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage source with the given API key.
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(BASE_URL, &all_params).map_err(|e| {
            MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })
    }

    /// Check for API-level errors in the response.
    fn check_api_error(
        error_message: &Option<String>,
        note: &Option<String>,
        information: &Option<String>,
    ) -> Result<(), MarketDataError> {
        if let Some(ref msg) = error_message {
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return Err(MarketDataError::SymbolNotFound(msg.clone()));
            }
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }

        // "Note" usually indicates rate limiting
        for msg in [note, information].into_iter().flatten() {
            if msg.contains("API call frequency") || msg.contains("rate limit") {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage note: {}", msg);
        }

        Ok(())
    }

    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s.trim()).ok()
    }

    fn parse_error(e: serde_json::Error) -> MarketDataError {
        MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse response: {}", e),
        }
    }

    /// Extract the price from a GLOBAL_QUOTE payload.
    fn parse_global_quote(ticker: &str, text: &str) -> Result<(Decimal, Option<NaiveDate>), MarketDataError> {
        let response: GlobalQuoteResponse = serde_json::from_str(text).map_err(Self::parse_error)?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        // Unknown symbols yield an empty "Global Quote" object
        let quote = response
            .global_quote
            .ok_or_else(|| MarketDataError::SymbolNotFound(ticker.to_string()))?;
        let price = quote
            .price
            .as_deref()
            .and_then(Self::parse_decimal)
            .ok_or_else(|| MarketDataError::SymbolNotFound(ticker.to_string()))?;
        let day = quote
            .latest_trading_day
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        Ok((price, day))
    }

    /// Extract the close on or before `date` from a TIME_SERIES_DAILY payload.
    fn parse_daily_close(
        ticker: &str,
        text: &str,
        date: NaiveDate,
    ) -> Result<Decimal, MarketDataError> {
        let response: TimeSeriesResponse = serde_json::from_str(text).map_err(Self::parse_error)?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let time_series = response.time_series.ok_or_else(|| {
            MarketDataError::SymbolNotFound(format!("No data for symbol: {}", ticker))
        })?;

        time_series
            .into_iter()
            .filter_map(|(date_str, daily)| {
                let day = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").ok()?;
                let close = Self::parse_decimal(&daily.close)?;
                (day <= date).then_some((day, close))
            })
            .max_by_key(|(day, _)| *day)
            .map(|(_, close)| close)
            .ok_or_else(|| MarketDataError::NoDataForDate {
                ticker: ticker.to_string(),
                date,
            })
    }
}

#[async_trait]
impl PriceSource for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        SourceKind::AlphaVantage.as_str()
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::default()
    }

    async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        let text = self
            .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", ticker)])
            .await?;

        let (price, day) = Self::parse_global_quote(ticker, &text)?;
        let at = day
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt))
            .unwrap_or_else(Utc::now);

        Ok(Quote::current(ticker, price, PROVIDER_ID, at))
    }

    async fn fetch_historical(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Quote, MarketDataError> {
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", ticker),
            ("outputsize", "compact"), // TIME_SERIES_DAILY: 'full' is premium-only
        ];

        let text = self.fetch(&params).await?;
        let price = Self::parse_daily_close(ticker, &text, date)?;

        Ok(Quote::historical(ticker, date, price, PROVIDER_ID))
    }
}
