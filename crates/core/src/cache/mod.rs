//! Price cache: TTL-aware current and historical prices plus retry counters.

mod backend;
mod memory;
mod price_cache;
#[cfg(feature = "redis-backend")]
mod redis_backend;

pub use backend::{CacheBackend, CacheResult};
pub use memory::MemoryBackend;
pub use price_cache::{normalize_ticker, CurrentPrice, HistoricalPrice, PriceCache};
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisBackend;
