//! Typed price cache over a key-value backend.
//!
//! Key layout:
//!
//! | Key                                   | Value                     | Expiry            |
//! |---------------------------------------|---------------------------|-------------------|
//! | `price:current:{TICKER}`              | JSON `{price, source, cached_at}` | none (staleness is computed) |
//! | `price:hist:{TICKER}:{YYYY-MM-DD}`    | JSON `{price, source, cached_at}` | none              |
//! | `price:retry:{TICKER}:{date\|current}` | integer                   | optional counter TTL |
//!
//! Current entries are kept past their TTL so readers can still see the last
//! known price flagged as stale.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::backend::{CacheBackend, CacheResult};
use crate::errors::CacheError;

const CURRENT_PREFIX: &str = "price:current";
const HISTORICAL_PREFIX: &str = "price:hist";
const RETRY_PREFIX: &str = "price:retry";
const CURRENT_SCOPE: &str = "current";

// =============================================================================
// Public read models
// =============================================================================

/// Result of a current-price lookup.
///
/// A missing entry reads as `price: None, is_stale: true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPrice {
    pub price: Option<Decimal>,
    pub is_stale: bool,
    pub source: Option<String>,
    pub cached_at: Option<DateTime<Utc>>,
}

impl CurrentPrice {
    fn missing() -> Self {
        Self {
            price: None,
            is_stale: true,
            source: None,
            cached_at: None,
        }
    }

    /// A present price that is still within its TTL.
    pub fn is_fresh(&self) -> bool {
        self.price.is_some() && !self.is_stale
    }
}

/// Result of a historical-price lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricalPrice {
    pub price: Option<Decimal>,
    pub source: Option<String>,
}

// =============================================================================
// Stored entry
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PriceEntry {
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    source: String,
    cached_at: DateTime<Utc>,
}

// =============================================================================
// PriceCache
// =============================================================================

/// Owns every cached price and retry counter.
///
/// All writes are single backend commands, so concurrent writers resolve as
/// last-writer-wins and a reader never observes a partially written entry.
pub struct PriceCache {
    backend: Arc<dyn CacheBackend>,
    current_ttl: Duration,
    retry_counter_ttl: Option<Duration>,
}

impl PriceCache {
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        current_ttl: Duration,
        retry_counter_ttl: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            current_ttl,
            retry_counter_ttl,
        }
    }

    pub fn current_ttl(&self) -> Duration {
        self.current_ttl
    }

    pub async fn get_current_price(&self, ticker: &str) -> CacheResult<CurrentPrice> {
        let key = current_key(ticker);
        let Some(raw) = self.backend.get(&key).await? else {
            return Ok(CurrentPrice::missing());
        };
        let entry: PriceEntry = decode(&key, &raw)?;
        Ok(self.to_current(entry, Utc::now()))
    }

    /// Overwrites the current entry and stamps it with the current time.
    pub async fn set_current_price(
        &self,
        ticker: &str,
        price: Decimal,
        source: &str,
    ) -> CacheResult<()> {
        let key = current_key(ticker);
        let value = encode(
            &key,
            &PriceEntry {
                price,
                source: source.to_string(),
                cached_at: Utc::now(),
            },
        )?;
        self.backend.set(&key, value, None).await?;
        debug!("Cached current price for {}: {} ({})", ticker, price, source);
        Ok(())
    }

    pub async fn get_historical_price(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> CacheResult<HistoricalPrice> {
        let key = historical_key(ticker, date);
        let Some(raw) = self.backend.get(&key).await? else {
            return Ok(HistoricalPrice::default());
        };
        let entry: PriceEntry = decode(&key, &raw)?;
        Ok(HistoricalPrice {
            price: Some(entry.price),
            source: Some(entry.source),
        })
    }

    /// Overwrites the historical entry. Historical entries never expire.
    pub async fn set_historical_price(
        &self,
        ticker: &str,
        date: NaiveDate,
        price: Decimal,
        source: &str,
    ) -> CacheResult<()> {
        let key = historical_key(ticker, date);
        let value = encode(
            &key,
            &PriceEntry {
                price,
                source: source.to_string(),
                cached_at: Utc::now(),
            },
        )?;
        self.backend.set(&key, value, None).await?;
        debug!(
            "Cached historical price for {} on {}: {} ({})",
            ticker, date, price, source
        );
        Ok(())
    }

    /// Consecutive failed attempts for the key; 0 when unseen.
    pub async fn get_price_retry_count(
        &self,
        ticker: &str,
        date: Option<NaiveDate>,
    ) -> CacheResult<u32> {
        let key = retry_key(ticker, date);
        match self.backend.get(&key).await? {
            None => Ok(0),
            Some(raw) => parse_count(&key, raw.trim().parse::<i64>().ok(), &raw),
        }
    }

    /// Atomically bumps the counter and returns the new value.
    pub async fn increment_price_retry_count(
        &self,
        ticker: &str,
        date: Option<NaiveDate>,
    ) -> CacheResult<u32> {
        let key = retry_key(ticker, date);
        let value = self.backend.incr(&key, self.retry_counter_ttl).await?;
        parse_count(&key, Some(value), &value.to_string())
    }

    pub async fn reset_price_retry_count(
        &self,
        ticker: &str,
        date: Option<NaiveDate>,
    ) -> CacheResult<()> {
        self.backend.delete(&retry_key(ticker, date)).await
    }

    /// Fresh current prices for `tickers`, keyed by the ticker as given.
    ///
    /// Tickers without an entry, with a stale entry or with an undecodable
    /// entry are omitted. Backend failures are returned.
    pub async fn get_cached_prices<I, S>(&self, tickers: I) -> CacheResult<HashMap<String, Decimal>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tickers: Vec<String> = tickers
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .collect();
        if tickers.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = tickers.iter().map(|t| current_key(t)).collect();
        let values = self.backend.get_many(&keys).await?;
        let now = Utc::now();

        let mut prices = HashMap::with_capacity(tickers.len());
        for ((ticker, key), raw) in tickers.into_iter().zip(keys.iter()).zip(values) {
            let Some(raw) = raw else { continue };
            match decode::<PriceEntry>(key, &raw) {
                Ok(entry) => {
                    let current = self.to_current(entry, now);
                    if let (Some(price), false) = (current.price, current.is_stale) {
                        prices.insert(ticker, price);
                    }
                }
                Err(e) => warn!("Skipping cached price for {}: {}", ticker, e),
            }
        }
        Ok(prices)
    }

    fn to_current(&self, entry: PriceEntry, now: DateTime<Utc>) -> CurrentPrice {
        let age = now.signed_duration_since(entry.cached_at);
        let is_stale = match chrono::Duration::from_std(self.current_ttl) {
            Ok(ttl) => age >= ttl,
            Err(_) => false,
        };
        CurrentPrice {
            price: Some(entry.price),
            is_stale,
            source: Some(entry.source),
            cached_at: Some(entry.cached_at),
        }
    }
}

// =============================================================================
// Keys and encoding
// =============================================================================

/// Canonical ticker form shared by cache keys and source lookups.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

fn current_key(ticker: &str) -> String {
    format!("{}:{}", CURRENT_PREFIX, normalize_ticker(ticker))
}

fn historical_key(ticker: &str, date: NaiveDate) -> String {
    format!(
        "{}:{}:{}",
        HISTORICAL_PREFIX,
        normalize_ticker(ticker),
        date.format("%Y-%m-%d")
    )
}

fn retry_key(ticker: &str, date: Option<NaiveDate>) -> String {
    let scope = date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| CURRENT_SCOPE.to_string());
    format!("{}:{}:{}", RETRY_PREFIX, normalize_ticker(ticker), scope)
}

fn encode<T: Serialize>(key: &str, value: &T) -> CacheResult<String> {
    serde_json::to_string(value).map_err(|e| CacheError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> CacheResult<T> {
    serde_json::from_str(raw).map_err(|e| CacheError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_count(key: &str, value: Option<i64>, raw: &str) -> CacheResult<u32> {
    value
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| CacheError::Corrupt {
            key: key.to_string(),
            message: format!("invalid retry counter '{}'", raw),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use rust_decimal_macros::dec;

    fn cache_with_ttl(ttl: Duration) -> (Arc<MemoryBackend>, PriceCache) {
        let backend = Arc::new(MemoryBackend::new());
        let cache = PriceCache::new(backend.clone(), ttl, None);
        (backend, cache)
    }

    fn cache() -> PriceCache {
        cache_with_ttl(Duration::from_secs(900)).1
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(current_key(" aapl "), "price:current:AAPL");
        assert_eq!(
            historical_key("msft", date(2024, 1, 5)),
            "price:hist:MSFT:2024-01-05"
        );
        assert_eq!(retry_key("msft", None), "price:retry:MSFT:current");
        assert_eq!(
            retry_key("msft", Some(date(2024, 1, 5))),
            "price:retry:MSFT:2024-01-05"
        );
    }

    #[tokio::test]
    async fn test_missing_current_price_is_stale() {
        let cached = cache().get_current_price("AAPL").await.unwrap();
        assert_eq!(cached.price, None);
        assert_eq!(cached.source, None);
        assert!(cached.is_stale);
        assert!(!cached.is_fresh());
    }

    #[tokio::test]
    async fn test_current_price_roundtrip_is_fresh() {
        let cache = cache();
        cache
            .set_current_price("aapl", dec!(189.84), "yfinance")
            .await
            .unwrap();

        let cached = cache.get_current_price("AAPL").await.unwrap();
        assert_eq!(cached.price, Some(dec!(189.84)));
        assert_eq!(cached.source.as_deref(), Some("yfinance"));
        assert!(!cached.is_stale);
        assert!(cached.cached_at.is_some());
    }

    #[tokio::test]
    async fn test_expired_current_price_is_reported_stale() {
        let (_, cache) = cache_with_ttl(Duration::ZERO);
        cache
            .set_current_price("AAPL", dec!(10), "stooq")
            .await
            .unwrap();

        let cached = cache.get_current_price("AAPL").await.unwrap();
        assert_eq!(cached.price, Some(dec!(10)));
        assert!(cached.is_stale);
    }

    #[tokio::test]
    async fn test_set_current_price_twice_is_idempotent() {
        let (backend, cache) = cache_with_ttl(Duration::from_secs(900));
        cache
            .set_current_price("AAPL", dec!(10), "stooq")
            .await
            .unwrap();
        let once = cache.get_current_price("AAPL").await.unwrap();

        cache
            .set_current_price("AAPL", dec!(10), "stooq")
            .await
            .unwrap();
        let twice = cache.get_current_price("AAPL").await.unwrap();

        assert_eq!(once.price, twice.price);
        assert_eq!(once.source, twice.source);
        assert_eq!(once.is_stale, twice.is_stale);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_historical_price_overwrite_replaces_value() {
        let cache = cache();
        let day = date(2024, 3, 1);
        assert_eq!(
            cache.get_historical_price("AAPL", day).await.unwrap(),
            HistoricalPrice::default()
        );

        cache
            .set_historical_price("AAPL", day, dec!(179.66), "yfinance")
            .await
            .unwrap();
        cache
            .set_historical_price("AAPL", day, dec!(179.70), "stooq")
            .await
            .unwrap();

        let cached = cache.get_historical_price("aapl", day).await.unwrap();
        assert_eq!(cached.price, Some(dec!(179.70)));
        assert_eq!(cached.source.as_deref(), Some("stooq"));
        assert_eq!(
            cache
                .get_historical_price("AAPL", date(2024, 3, 4))
                .await
                .unwrap()
                .price,
            None
        );
    }

    #[tokio::test]
    async fn test_retry_counter_lifecycle() {
        let cache = cache();
        let day = Some(date(2024, 3, 1));

        assert_eq!(cache.get_price_retry_count("AAPL", None).await.unwrap(), 0);
        assert_eq!(
            cache.increment_price_retry_count("AAPL", None).await.unwrap(),
            1
        );
        assert_eq!(
            cache.increment_price_retry_count("AAPL", None).await.unwrap(),
            2
        );
        assert_eq!(cache.get_price_retry_count("AAPL", None).await.unwrap(), 2);

        // Historical counters are tracked per date.
        assert_eq!(cache.get_price_retry_count("AAPL", day).await.unwrap(), 0);

        cache.reset_price_retry_count("AAPL", None).await.unwrap();
        assert_eq!(cache.get_price_retry_count("AAPL", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_cached_prices_only_returns_valid_entries() {
        let cache = cache();
        cache
            .set_current_price("AAA", dec!(42.5), "yfinance")
            .await
            .unwrap();

        let prices = cache.get_cached_prices(["AAA", "BBB"]).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get("AAA"), Some(&dec!(42.5)));
        assert!(!prices.contains_key("BBB"));
    }

    #[tokio::test]
    async fn test_get_cached_prices_skips_stale_and_corrupt() {
        let (backend, cache) = cache_with_ttl(Duration::ZERO);
        cache
            .set_current_price("OLD", dec!(1.5), "stooq")
            .await
            .unwrap();
        backend
            .set("price:current:BAD", "not json".to_string(), None)
            .await
            .unwrap();

        let prices = cache.get_cached_prices(vec!["OLD", "BAD"]).await.unwrap();
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_current_entry_is_reported() {
        let (backend, cache) = cache_with_ttl(Duration::from_secs(60));
        backend
            .set("price:current:AAPL", "{".to_string(), None)
            .await
            .unwrap();

        let err = cache.get_current_price("AAPL").await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { ref key, .. } if key == "price:current:AAPL"));
        assert!(!err.is_fatal());
    }
}
