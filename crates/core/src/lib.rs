//! Price Cache Core - price resolution, caching and background refresh.
//!
//! ```text
//!   JobQueue ──▶ PriceFetchJob ──▶ MarketDataService ──▶ SourceRegistry ──▶ PriceSource*
//!                     │                    │
//!                     ▼                    ▼ (reads)
//!                 PriceCache ◀─────────────┘
//!                     │
//!                     ▼
//!               CacheBackend (memory | redis)
//! ```
//!
//! All shared state hangs off an explicitly built [`PriceContext`].

pub mod cache;
pub mod context;
pub mod errors;
pub mod jobs;
pub mod quotes;
pub mod settings;

pub use cache::{CacheBackend, CurrentPrice, HistoricalPrice, MemoryBackend, PriceCache};
#[cfg(feature = "redis-backend")]
pub use cache::RedisBackend;
pub use context::PriceContext;
pub use jobs::{JobHandle, JobQueue, JobSnapshot, JobStatus, PriceFetchJob, PriceFetchOutcome};
pub use quotes::MarketDataService;
pub use settings::PriceSettings;

// Re-export error types
pub use errors::{CacheError, Error, Result};
