//! Engine settings.

use std::time::Duration;

use rust_decimal::Decimal;

use pricecache_market_data::{DEFAULT_MIN_PLAUSIBLE_PRICE, DEFAULT_SOURCE_TIMEOUT};

/// Default number of fetch attempts per ticker before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default lifetime of a cached current price.
pub const DEFAULT_CURRENT_TTL: Duration = Duration::from_secs(15 * 60);

/// Default lifetime of a retry counter, counted from its first failure.
/// After it lapses an exhausted ticker becomes eligible for fetching again.
pub const DEFAULT_RETRY_COUNTER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Settings read by the priority resolver, the cache and the fetch job.
#[derive(Clone, Debug)]
pub struct PriceSettings {
    /// Configured source names, in fallback order. Empty means the default order.
    pub source_priority: Vec<String>,
    /// Maximum fetch attempts per ticker and key.
    pub max_attempts: u32,
    /// A current price is fresh while younger than this.
    pub current_ttl: Duration,
    /// Current prices from sources with the minimum-price rule must exceed this.
    pub min_plausible_price: Decimal,
    /// Time budget for a single source call.
    pub source_timeout: Duration,
    /// Expiry of retry counters; `None` keeps them until the next success.
    pub retry_counter_ttl: Option<Duration>,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            source_priority: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            current_ttl: DEFAULT_CURRENT_TTL,
            min_plausible_price: DEFAULT_MIN_PLAUSIBLE_PRICE,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            retry_counter_ttl: Some(DEFAULT_RETRY_COUNTER_TTL),
        }
    }
}
