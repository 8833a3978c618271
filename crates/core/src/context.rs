//! Explicitly constructed engine context.
//!
//! Everything a job needs is reachable from a [`PriceContext`]: there are no
//! process-wide singletons, so tests build contexts from fakes.

use std::sync::Arc;

use pricecache_market_data::{PlausibilityValidator, PriceSource, SourceRegistry};

use crate::cache::{CacheBackend, PriceCache};
use crate::quotes::MarketDataService;
use crate::settings::PriceSettings;

pub struct PriceContext {
    pub settings: PriceSettings,
    pub cache: Arc<PriceCache>,
    pub market_data: Arc<MarketDataService>,
}

impl PriceContext {
    /// Wires the cache and the market data service.
    ///
    /// `registered` is every available source; the configured priority picks
    /// and orders the ones actually used.
    pub fn new(
        settings: PriceSettings,
        backend: Arc<dyn CacheBackend>,
        registered: &[Arc<dyn PriceSource>],
    ) -> Self {
        let registry = Arc::new(SourceRegistry::from_priority(
            settings.source_priority.as_slice(),
            registered,
            PlausibilityValidator::with_min_price(settings.min_plausible_price),
            settings.source_timeout,
        ));
        let cache = Arc::new(PriceCache::new(
            backend,
            settings.current_ttl,
            settings.retry_counter_ttl,
        ));
        let market_data = Arc::new(MarketDataService::new(registry, cache.clone()));

        Self {
            settings,
            cache,
            market_data,
        }
    }
}
