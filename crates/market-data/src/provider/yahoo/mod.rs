//! Yahoo Finance price source (`yfinance`).
//!
//! Current prices come from the chart API through `yahoo_finance_api`, with
//! the quoteSummary endpoint as a backup. Historical closes come from the
//! quote history of a short window ending on the requested date.

mod models;

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::header;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{Quote, SourceKind};
use crate::provider::{PriceSource, SourceCapabilities};

use models::YahooQuoteSummaryResponse;

const PROVIDER_ID: &str = "yfinance";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Days of history requested before the target date, so that weekends and
/// holidays still resolve to the previous session's close.
const HISTORY_LOOKBACK_DAYS: i64 = 7;

/// Decimal places kept when converting Yahoo's f64 prices.
const PRICE_SCALE: u32 = 6;

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

/// Yahoo authentication data for the quoteSummary endpoint
#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance price source.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    client: reqwest::Client,
    crumb: RwLock<Option<CrumbData>>,
}

impl YahooProvider {
    /// Create a new Yahoo Finance source.
    pub fn new() -> Result<Self, MarketDataError> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to initialize Yahoo connector: {}", e),
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            connector,
            client,
            crumb: RwLock::new(None),
        })
    }

    fn read_crumb(&self) -> RwLockReadGuard<'_, Option<CrumbData>> {
        self.crumb.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_crumb(&self) -> RwLockWriteGuard<'_, Option<CrumbData>> {
        self.crumb.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ensure we have a valid Yahoo authentication crumb.
    async fn ensure_crumb(&self) -> Result<CrumbData, MarketDataError> {
        let cached = self.read_crumb().clone();
        if let Some(crumb) = cached {
            return Ok(crumb);
        }

        self.fetch_crumb().await
    }

    /// Fetch a new Yahoo authentication crumb.
    async fn fetch_crumb(&self) -> Result<CrumbData, MarketDataError> {
        // Step 1: Get cookie from fc.yahoo.com
        let response = self
            .client
            .get("https://fc.yahoo.com")
            .send()
            .await
            .map_err(|e| provider_error(format!("Failed to get cookie: {}", e)))?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| provider_error("Failed to parse Yahoo cookie".to_string()))?;

        // Step 2: Get crumb using cookie
        let crumb = self
            .client
            .get("https://query1.finance.yahoo.com/v1/test/getcrumb")
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| provider_error(format!("Failed to get crumb: {}", e)))?
            .text()
            .await
            .map_err(|e| provider_error(format!("Failed to read crumb: {}", e)))?;

        let crumb_data = CrumbData { cookie, crumb };
        *self.write_crumb() = Some(crumb_data.clone());

        Ok(crumb_data)
    }

    fn clear_crumb(&self) {
        *self.write_crumb() = None;
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    fn to_offset_datetime(date: NaiveDate) -> OffsetDateTime {
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
            .unwrap_or_default();
        OffsetDateTime::from_unix_timestamp(timestamp).unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    fn to_decimal(value: f64) -> Option<Decimal> {
        Decimal::from_f64_retain(value).map(|d| d.round_dp(PRICE_SCALE))
    }

    fn quote_timestamp(yahoo_quote: &yahoo::Quote) -> Result<DateTime<Utc>, MarketDataError> {
        Utc.timestamp_opt(yahoo_quote.timestamp as i64, 0)
            .single()
            .ok_or_else(|| provider_error(format!("Invalid timestamp: {}", yahoo_quote.timestamp)))
    }

    fn map_yahoo_error(symbol: &str, e: yahoo::YahooError) -> MarketDataError {
        if matches!(e, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
            MarketDataError::SymbolNotFound(symbol.to_string())
        } else {
            provider_error(e.to_string())
        }
    }

    /// Pick the close of the last session on or before `date`.
    fn close_on_or_before(
        quotes: Vec<yahoo::Quote>,
        date: NaiveDate,
    ) -> Option<(NaiveDate, Decimal)> {
        quotes
            .into_iter()
            .filter_map(|q| {
                let day = Self::quote_timestamp(&q).ok()?.date_naive();
                let close = Self::to_decimal(q.close)?;
                (day <= date).then_some((day, close))
            })
            .max_by_key(|(day, _)| *day)
    }

    // ========================================================================
    // Quote Fetching
    // ========================================================================

    /// Fetch latest quote using primary method (library API).
    async fn fetch_current_primary(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let response = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| Self::map_yahoo_error(symbol, e))?;

        let yahoo_quote = response.last_quote().map_err(|e| {
            warn!("No quotes returned for {}: {}", symbol, e);
            MarketDataError::SymbolNotFound(symbol.to_string())
        })?;

        let timestamp = Self::quote_timestamp(&yahoo_quote)?;
        let price = Self::to_decimal(yahoo_quote.close).ok_or_else(|| {
            provider_error(format!("Failed to convert close price {}", yahoo_quote.close))
        })?;

        Ok(Quote::current(symbol, price, PROVIDER_ID, timestamp))
    }

    /// Fetch latest quote using backup method (quoteSummary API).
    async fn fetch_current_backup(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let crumb = self.ensure_crumb().await?;

        let url = reqwest::Url::parse_with_params(
            &format!(
                "https://query1.finance.yahoo.com/v10/finance/quoteSummary/{}",
                symbol
            ),
            &[("modules", "price"), ("crumb", crumb.crumb.as_str())],
        )
        .map_err(|e| provider_error(format!("Failed to build URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::COOKIE, &crumb.cookie)
            .send()
            .await
            .map_err(|e| provider_error(format!("Backup quote request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.clear_crumb();
            return Err(provider_error("Yahoo authentication expired".to_string()));
        }

        let data: YahooQuoteSummaryResponse = response.json().await.map_err(|e| {
            provider_error(format!("Failed to parse backup quote response: {}", e))
        })?;

        let price_data = data
            .quote_summary
            .result
            .into_iter()
            .next()
            .and_then(|r| r.price)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let price = price_data
            .regular_market_price
            .as_ref()
            .and_then(|p| p.raw)
            .and_then(Self::to_decimal)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let timestamp = price_data
            .regular_market_time
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        Ok(Quote::current(symbol, price, PROVIDER_ID, timestamp))
    }
}

fn provider_error(message: String) -> MarketDataError {
    MarketDataError::ProviderError {
        provider: PROVIDER_ID.to_string(),
        message,
    }
}

#[async_trait]
impl PriceSource for YahooProvider {
    fn id(&self) -> &'static str {
        SourceKind::Yahoo.as_str()
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::default()
    }

    async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        debug!("Fetching current price for {} from Yahoo", ticker);

        match self.fetch_current_primary(ticker).await {
            Ok(quote) => return Ok(quote),
            Err(e) => {
                debug!(
                    "Primary quote fetch failed for {}: {}, trying backup",
                    ticker, e
                );
            }
        }

        self.fetch_current_backup(ticker).await
    }

    async fn fetch_historical(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Quote, MarketDataError> {
        let start = date - chrono::Duration::days(HISTORY_LOOKBACK_DAYS);
        let end = date + chrono::Duration::days(1);

        debug!(
            "Fetching historical close for {} on {} from Yahoo",
            ticker,
            date.format("%Y-%m-%d")
        );

        let response = self
            .connector
            .get_quote_history(
                ticker,
                Self::to_offset_datetime(start),
                Self::to_offset_datetime(end),
            )
            .await
            .map_err(|e| Self::map_yahoo_error(ticker, e))?;

        let quotes = match response.quotes() {
            Ok(quotes) => quotes,
            Err(yahoo::YahooError::NoQuotes) => Vec::new(),
            Err(e) => return Err(provider_error(e.to_string())),
        };

        match Self::close_on_or_before(quotes, date) {
            Some((session, price)) => {
                if session != date {
                    debug!(
                        "Yahoo has no session for {} on {}, using close of {}",
                        ticker, date, session
                    );
                }
                Ok(Quote::historical(ticker, date, price, PROVIDER_ID))
            }
            None => Err(MarketDataError::NoDataForDate {
                ticker: ticker.to_string(),
                date,
            }),
        }
    }
}
