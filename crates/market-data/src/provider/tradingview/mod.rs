//! TradingView price source (`tradingview`).
//!
//! Uses the unofficial scanner endpoint, filtering listings by ticker name
//! and reading the `close` column of the first match. Name matching is loose:
//! an unmatched symbol can resolve to an unrelated listing quoted in cents,
//! so this source opts into the minimum-price plausibility rule.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::models::{Quote, SourceKind};
use crate::provider::{PlausibilityCheck, PriceSource, SourceCapabilities};

const SCAN_URL: &str = "https://scanner.tradingview.com/america/scan";
const PROVIDER_ID: &str = "tradingview";
const PRICE_SCALE: u32 = 6;

// ============================================================================
// Request/response structures for the scanner API
// ============================================================================

#[derive(Debug, Serialize)]
struct ScanRequest<'a> {
    filter: [ScanFilter<'a>; 1],
    columns: [&'static str; 3],
    range: [u32; 2],
}

#[derive(Debug, Serialize)]
struct ScanFilter<'a> {
    left: &'static str,
    operation: &'static str,
    right: &'a str,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(rename = "totalCount", default)]
    total_count: u64,
    #[serde(default)]
    data: Vec<ScanRow>,
}

/// One listing: `s` is the exchange-qualified symbol, `d` the requested columns.
#[derive(Debug, Deserialize)]
struct ScanRow {
    s: String,
    d: Vec<serde_json::Value>,
}

impl ScanRow {
    /// The `close` column, first in the requested column list.
    fn close(&self) -> Option<Decimal> {
        match self.d.first()? {
            serde_json::Value::Number(n) => n
                .as_f64()
                .and_then(Decimal::from_f64_retain)
                .map(|d| d.round_dp(PRICE_SCALE)),
            _ => None,
        }
    }
}

/// TradingView scanner price source. Current prices only.
pub struct TradingViewProvider {
    client: Client,
}

impl TradingViewProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    fn build_request(ticker: &str) -> ScanRequest<'_> {
        ScanRequest {
            filter: [ScanFilter {
                left: "name",
                operation: "equal",
                right: ticker,
            }],
            columns: ["close", "name", "exchange"],
            range: [0, 1],
        }
    }

    fn parse_response(ticker: &str, body: &str) -> Result<Decimal, MarketDataError> {
        let response: ScanResponse =
            serde_json::from_str(body).map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;

        if response.total_count == 0 {
            return Err(MarketDataError::SymbolNotFound(ticker.to_string()));
        }

        let row = response
            .data
            .first()
            .ok_or_else(|| MarketDataError::SymbolNotFound(ticker.to_string()))?;

        debug!("TradingView matched {} to listing {}", ticker, row.s);

        row.close()
            .ok_or_else(|| MarketDataError::SymbolNotFound(ticker.to_string()))
    }
}

impl Default for TradingViewProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for TradingViewProvider {
    fn id(&self) -> &'static str {
        SourceKind::TradingView.as_str()
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            supports_historical: false,
            plausibility: PlausibilityCheck::MinimumPrice,
        }
    }

    async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        let ticker_upper = ticker.trim().to_uppercase();
        let response = self
            .client
            .post(SCAN_URL)
            .json(&Self::build_request(&ticker_upper))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    MarketDataError::Network(e)
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

        let body = response.text().await?;
        let price = Self::parse_response(ticker, &body)?;

        Ok(Quote::current(ticker, price, PROVIDER_ID, Utc::now()))
    }

    async fn fetch_historical(
        &self,
        _ticker: &str,
        _date: NaiveDate,
    ) -> Result<Quote, MarketDataError> {
        Err(MarketDataError::NotSupported {
            operation: "historical".to_string(),
            provider: PROVIDER_ID.to_string(),
        })
    }
}
