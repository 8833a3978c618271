//! Source registry: the ordered fallback walk.
//!
//! The registry owns the resolved, ordered list of sources and tries them
//! one at a time for a single ticker (and date):
//! 1. Skip sources that cannot answer the request (historical support)
//! 2. Call the source under a per-call timeout
//! 3. Validate the answer (plausibility for current, presence for historical)
//! 4. Return the first accepted quote, tagged with its source
//!
//! Source failures never escape the walk. When every source comes up empty
//! the result is a quote with no price and no source.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};

use super::priority::resolve_sources;
use super::PlausibilityValidator;
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{AsOf, Quote};
use crate::provider::PriceSource;

/// Default time budget for a single source call.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Ordered collection of price sources.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn PriceSource>>,
    validator: PlausibilityValidator,
    timeout: Duration,
}

impl SourceRegistry {
    /// Create a registry that walks `sources` in the given order.
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self::with_config(sources, PlausibilityValidator::new(), DEFAULT_SOURCE_TIMEOUT)
    }

    /// Create a registry with custom validation and timeout.
    pub fn with_config(
        sources: Vec<Arc<dyn PriceSource>>,
        validator: PlausibilityValidator,
        timeout: Duration,
    ) -> Self {
        Self {
            sources,
            validator,
            timeout,
        }
    }

    /// Build a registry from a configured priority list and the registered
    /// sources. See [`resolve_sources`].
    pub fn from_priority<S: AsRef<str>>(
        configured: &[S],
        registered: &[Arc<dyn PriceSource>],
        validator: PlausibilityValidator,
        timeout: Duration,
    ) -> Self {
        let sources = resolve_sources(configured, registered);
        let registry = Self::with_config(sources, validator, timeout);
        info!("Price source order: {:?}", registry.source_ids());
        registry
    }

    /// Identifiers of the sources in fallback order.
    pub fn source_ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Get the list of sources in fallback order.
    pub fn sources(&self) -> &[Arc<dyn PriceSource>] {
        &self.sources
    }

    /// Fetch the current price for `ticker`, walking sources in order.
    pub async fn fetch_current(&self, ticker: &str) -> Quote {
        for source in &self.sources {
            let result = self
                .call_with_timeout(source.as_ref(), source.fetch_current(ticker))
                .await
                .and_then(|quote| {
                    self.validator
                        .validate_current(source.as_ref(), &quote)
                        .map(|price| (price, quote))
                });

            match result {
                Ok((price, quote)) => {
                    let at = match quote.as_of {
                        AsOf::Instant(at) => at,
                        AsOf::Date(_) => Utc::now(),
                    };
                    debug!("Current price for {} from '{}': {}", ticker, source.id(), price);
                    return Quote::current(ticker, price, source.id(), at);
                }
                Err(e) => Self::log_failure(source.id(), ticker, &e),
            }
        }

        debug!("No source produced a current price for {}", ticker);
        Quote::unavailable(ticker, AsOf::Instant(Utc::now()))
    }

    /// Fetch the close for `ticker` on `date`, walking sources in order.
    pub async fn fetch_historical(&self, ticker: &str, date: NaiveDate) -> Quote {
        for source in &self.sources {
            if !source.capabilities().supports_historical {
                debug!(
                    "Source '{}' has no historical data, skipping for {}",
                    source.id(),
                    ticker
                );
                continue;
            }

            let result = self
                .call_with_timeout(source.as_ref(), source.fetch_historical(ticker, date))
                .await
                .and_then(|quote| self.validator.validate_historical(&quote));

            match result {
                Ok(price) => {
                    debug!(
                        "Close for {} on {} from '{}': {}",
                        ticker,
                        date,
                        source.id(),
                        price
                    );
                    return Quote::historical(ticker, date, price, source.id());
                }
                Err(e) => Self::log_failure(source.id(), ticker, &e),
            }
        }

        debug!("No source produced a close for {} on {}", ticker, date);
        Quote::unavailable(ticker, AsOf::Date(date))
    }

    async fn call_with_timeout<F>(
        &self,
        source: &dyn PriceSource,
        call: F,
    ) -> Result<Quote, MarketDataError>
    where
        F: Future<Output = Result<Quote, MarketDataError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout {
                provider: source.id().to_string(),
            }),
        }
    }

    fn log_failure(source_id: &str, ticker: &str, error: &MarketDataError) {
        match error.retry_class() {
            RetryClass::Transient => warn!(
                "Source '{}' failed for {}: {}, trying next source",
                source_id, ticker, error
            ),
            RetryClass::NextProvider => debug!(
                "Source '{}' has no usable price for {}: {}, trying next source",
                source_id, ticker, error
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{PlausibilityCheck, SourceCapabilities};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Price(Decimal),
        Fail,
        Hang,
    }

    struct MockSource {
        id: &'static str,
        behavior: Behavior,
        plausibility: PlausibilityCheck,
        supports_historical: bool,
        call_count: AtomicUsize,
    }

    impl MockSource {
        fn new(id: &'static str, behavior: Behavior) -> Self {
            Self {
                id,
                behavior,
                plausibility: PlausibilityCheck::Basic,
                supports_historical: true,
                call_count: AtomicUsize::new(0),
            }
        }

        fn strict(mut self) -> Self {
            self.plausibility = PlausibilityCheck::MinimumPrice;
            self
        }

        fn current_only(mut self) -> Self {
            self.supports_historical = false;
            self
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        async fn answer(&self, quote: Quote) -> Result<Quote, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Price(_) => Ok(quote),
                Behavior::Fail => Err(MarketDataError::ProviderError {
                    provider: self.id.to_string(),
                    message: "Mock failure".to_string(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(quote)
                }
            }
        }

        fn price(&self) -> Decimal {
            match self.behavior {
                Behavior::Price(p) => p,
                _ => dec!(1),
            }
        }
    }

    #[async_trait]
    impl PriceSource for MockSource {
        fn id(&self) -> &'static str {
            self.id
        }

        fn capabilities(&self) -> SourceCapabilities {
            SourceCapabilities {
                supports_historical: self.supports_historical,
                plausibility: self.plausibility,
            }
        }

        async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError> {
            let quote = Quote::current(ticker, self.price(), self.id, Utc::now());
            self.answer(quote).await
        }

        async fn fetch_historical(
            &self,
            ticker: &str,
            date: NaiveDate,
        ) -> Result<Quote, MarketDataError> {
            let quote = Quote::historical(ticker, date, self.price(), self.id);
            self.answer(quote).await
        }
    }

    fn registry(sources: &[Arc<MockSource>]) -> SourceRegistry {
        SourceRegistry::with_config(
            sources
                .iter()
                .map(|s| s.clone() as Arc<dyn PriceSource>)
                .collect(),
            PlausibilityValidator::new(),
            Duration::from_millis(50),
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    #[tokio::test]
    async fn test_first_source_wins_and_later_sources_are_not_called() {
        let a = Arc::new(MockSource::new("A", Behavior::Price(dec!(10.0))));
        let b = Arc::new(MockSource::new("B", Behavior::Price(dec!(11.0))));

        let quote = registry(&[a.clone(), b.clone()]).fetch_current("TEST").await;

        assert_eq!(quote.price, Some(dec!(10.0)));
        assert_eq!(quote.source.as_deref(), Some("A"));
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_implausible_price_falls_through_to_next_source() {
        let tv = Arc::new(MockSource::new("tradingview", Behavior::Price(dec!(0.5))).strict());
        let yf = Arc::new(MockSource::new("yfinance", Behavior::Price(dec!(12.0))));

        let quote = registry(&[tv.clone(), yf.clone()]).fetch_current("TEST").await;

        assert_eq!(quote.price, Some(dec!(12.0)));
        assert_eq!(quote.source.as_deref(), Some("yfinance"));
        assert_eq!(tv.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_source_falls_through() {
        let a = Arc::new(MockSource::new("A", Behavior::Fail));
        let b = Arc::new(MockSource::new("B", Behavior::Price(dec!(11.0))));

        let quote = registry(&[a, b]).fetch_current("TEST").await;

        assert_eq!(quote.source.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_all_sources_failing_yields_unavailable_quote() {
        let a = Arc::new(MockSource::new("A", Behavior::Fail));
        let b = Arc::new(MockSource::new("B", Behavior::Fail));

        let quote = registry(&[a.clone(), b.clone()]).fetch_current("TEST").await;

        assert!(quote.price.is_none());
        assert!(quote.source.is_none());
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_registry_yields_unavailable_quote() {
        let quote = registry(&[]).fetch_historical("TEST", date()).await;
        assert!(!quote.is_available());
        assert_eq!(quote.as_of, AsOf::Date(date()));
    }

    #[tokio::test]
    async fn test_hanging_source_times_out_and_walk_continues() {
        let slow = Arc::new(MockSource::new("slow", Behavior::Hang));
        let b = Arc::new(MockSource::new("B", Behavior::Price(dec!(11.0))));

        let quote = registry(&[slow.clone(), b]).fetch_current("TEST").await;

        assert_eq!(quote.source.as_deref(), Some("B"));
        assert_eq!(slow.calls(), 1);
    }

    #[tokio::test]
    async fn test_historical_skips_current_only_sources() {
        let tv = Arc::new(MockSource::new("tradingview", Behavior::Price(dec!(50))).current_only());
        let stooq = Arc::new(MockSource::new("stooq", Behavior::Price(dec!(48.5))));

        let quote = registry(&[tv.clone(), stooq]).fetch_historical("TEST", date()).await;

        assert_eq!(quote.price, Some(dec!(48.5)));
        assert_eq!(quote.source.as_deref(), Some("stooq"));
        assert_eq!(quote.as_of, AsOf::Date(date()));
        assert_eq!(tv.calls(), 0);
    }

    #[tokio::test]
    async fn test_historical_does_not_apply_minimum_price() {
        let tv = Arc::new(MockSource::new("strict", Behavior::Price(dec!(0.5))).strict());

        let quote = registry(&[tv]).fetch_historical("TEST", date()).await;

        assert_eq!(quote.price, Some(dec!(0.5)));
    }

    #[test]
    fn test_from_priority_orders_sources() {
        let registered: Vec<Arc<dyn PriceSource>> = vec![
            Arc::new(MockSource::new("yfinance", Behavior::Fail)),
            Arc::new(MockSource::new("stooq", Behavior::Fail)),
        ];

        let registry = SourceRegistry::from_priority(
            &["STOOQ", "unknown", "yfinance", "stooq"],
            &registered,
            PlausibilityValidator::new(),
            DEFAULT_SOURCE_TIMEOUT,
        );

        assert_eq!(registry.source_ids(), ["stooq", "yfinance"]);
    }
}
