//! Market Data Service - cache-aware facade over the source registry.
//!
//! ```text
//!   get_current_price_quote(ticker, use_cache)
//!        │
//!        ├── use_cache && fresh entry ──▶ cached Quote
//!        │
//!        ▼
//!   SourceRegistry::fetch_current ──▶ first plausible Quote | unavailable
//! ```
//!
//! The service only reads the cache. Persisting results is the job's
//! responsibility.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{debug, warn};

use pricecache_market_data::{Quote, SourceRegistry};

use crate::cache::{normalize_ticker, PriceCache};

pub struct MarketDataService {
    registry: Arc<SourceRegistry>,
    cache: Arc<PriceCache>,
}

impl MarketDataService {
    pub fn new(registry: Arc<SourceRegistry>, cache: Arc<PriceCache>) -> Self {
        Self { registry, cache }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Current price for `ticker` (trimmed and upper-cased).
    ///
    /// With `use_cache`, a fresh cached entry is returned without contacting
    /// any source. A cache read failure is treated as a miss.
    pub async fn get_current_price_quote(&self, ticker: &str, use_cache: bool) -> Quote {
        let ticker = normalize_ticker(ticker);
        let ticker = ticker.as_str();
        if use_cache {
            match self.cache.get_current_price(ticker).await {
                Ok(cached) if cached.is_fresh() => {
                    if let (Some(price), Some(source)) = (cached.price, cached.source) {
                        debug!("Using cached price for {} from '{}'", ticker, source);
                        let at = cached.cached_at.unwrap_or_else(Utc::now);
                        return Quote::current(ticker, price, source, at);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Price cache read failed for {}, fetching: {}", ticker, e),
            }
        }

        self.registry.fetch_current(ticker).await
    }

    /// Close for `ticker` on `date`, walking sources in priority order.
    pub async fn get_historical_price_quote(&self, ticker: &str, date: NaiveDate) -> Quote {
        self.registry
            .fetch_historical(&normalize_ticker(ticker), date)
            .await
    }
}
