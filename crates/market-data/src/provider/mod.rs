//! Price source abstractions and implementations.
//!
//! This module contains:
//! - The `PriceSource` trait that all sources implement
//! - Source capabilities (historical support, plausibility rule)
//! - Concrete sources (Yahoo, TradingView, Alpha Vantage, Stooq)
//!
//! Sources are constructed once and handed to the registry as an ordered
//! list of trait objects; nothing is looked up by name at call time.

mod capabilities;
mod traits;

pub mod alpha_vantage;
pub mod stooq;
pub mod tradingview;
pub mod yahoo;

use std::sync::Arc;

use log::warn;

pub use capabilities::{PlausibilityCheck, SourceCapabilities};
pub use traits::PriceSource;

use alpha_vantage::AlphaVantageProvider;
use stooq::StooqProvider;
use tradingview::TradingViewProvider;
use yahoo::YahooProvider;

/// Build every source that can be constructed with the given credentials.
///
/// Alpha Vantage is only registered when an API key is available; a Yahoo
/// connector that fails to initialize is logged and left out.
pub fn build_default_sources(alpha_vantage_key: Option<String>) -> Vec<Arc<dyn PriceSource>> {
    let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();

    match YahooProvider::new() {
        Ok(provider) => sources.push(Arc::new(provider)),
        Err(e) => warn!("Yahoo source unavailable: {}", e),
    }
    sources.push(Arc::new(TradingViewProvider::new()));
    sources.push(Arc::new(StooqProvider::new()));

    if let Some(key) = alpha_vantage_key.filter(|k| !k.trim().is_empty()) {
        sources.push(Arc::new(AlphaVantageProvider::new(key)));
    }

    sources
}
