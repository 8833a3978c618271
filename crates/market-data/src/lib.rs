//! Price Cache Market Data Crate
//!
//! This crate fetches current and historical security prices from several
//! external quote sources and resolves them through an ordered fallback.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! | Source priority  |  (configured names, normalized + deduplicated)
//! +------------------+
//!          |
//!          v
//! +------------------+     +-------------------------+
//! |  SourceRegistry  | --> |  PriceSource (yfinance, |
//! |  (fallback walk) |     |  tradingview, stooq,    |
//! +------------------+     |  alpha_vantage)         |
//!          |               +-------------------------+
//!          v
//! +------------------+
//! |      Quote       |  (price + source, or unavailable)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Quote`] - A price with its provenance and as-of point
//! - [`PriceSource`] - Capability interface implemented by every source
//! - [`SourceRegistry`] - Ordered fallback over the resolved sources
//! - [`PlausibilityValidator`] - Rejects implausible current prices

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{MarketDataError, RetryClass};

pub use models::{AsOf, Quote, SourceKind};

pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::stooq::StooqProvider;
pub use provider::tradingview::TradingViewProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{build_default_sources, PlausibilityCheck, PriceSource, SourceCapabilities};

pub use registry::{
    resolve_priority, resolve_sources, PlausibilityValidator, SourcePriority, SourceRegistry,
    ValidatorConfig, DEFAULT_MIN_PLAUSIBLE_PRICE, DEFAULT_SOURCE_PRIORITY, DEFAULT_SOURCE_TIMEOUT,
};
