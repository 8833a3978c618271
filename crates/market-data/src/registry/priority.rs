//! Source priority resolution.
//!
//! Turns the configured list of source names into the ordered list of
//! sources the registry walks. Resolution happens once, when the registry
//! is built; the walk itself never looks anything up by name.

use std::collections::HashSet;
use std::sync::Arc;

use log::warn;

use crate::provider::PriceSource;

/// Fallback order used when no source priority is configured.
pub const DEFAULT_SOURCE_PRIORITY: [&str; 4] = ["yfinance", "stooq", "tradingview", "alpha_vantage"];

/// Ordered, duplicate-free list of normalized source identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePriority(Vec<String>);

impl SourcePriority {
    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SourcePriority {
    fn default() -> Self {
        Self(DEFAULT_SOURCE_PRIORITY.iter().map(|s| s.to_string()).collect())
    }
}

/// Normalize a configured priority list.
///
/// Trims and lower-cases each name, drops empty entries and duplicates
/// (first occurrence wins). An empty result falls back to
/// [`DEFAULT_SOURCE_PRIORITY`].
pub fn resolve_priority<S: AsRef<str>>(configured: &[S]) -> SourcePriority {
    let mut seen = HashSet::new();
    let names: Vec<String> = configured
        .iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.clone()))
        .collect();

    if names.is_empty() {
        SourcePriority::default()
    } else {
        SourcePriority(names)
    }
}

/// Resolve a configured priority list against the registered sources.
///
/// Names with no registered source are logged and dropped. The result keeps
/// the configured order.
pub fn resolve_sources<S: AsRef<str>>(
    configured: &[S],
    registered: &[Arc<dyn PriceSource>],
) -> Vec<Arc<dyn PriceSource>> {
    let priority = resolve_priority(configured);

    let sources: Vec<Arc<dyn PriceSource>> = priority
        .names()
        .iter()
        .filter_map(|name| {
            let source = registered.iter().find(|s| s.id() == name.as_str());
            if source.is_none() {
                warn!("No registered price source named '{}', skipping", name);
            }
            source.cloned()
        })
        .collect();

    if sources.is_empty() {
        warn!(
            "Source priority {:?} resolved to no registered sources",
            priority.names()
        );
    }

    sources
}
