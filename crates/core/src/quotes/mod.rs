//! Quote resolution on top of the source registry and the price cache.

mod service;

pub use service::MarketDataService;
