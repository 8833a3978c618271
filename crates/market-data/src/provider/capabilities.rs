//! Source capabilities.
//!
//! Describes what a price source can do and how strictly its current
//! prices must be sanity-checked.

/// Plausibility rule applied to a source's current prices.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlausibilityCheck {
    /// The price must be strictly positive.
    Basic,

    /// The price must be strictly greater than the configured minimum
    /// plausible price. Used for sources that answer unmatched or delisted
    /// symbols with near-zero values from a different listing.
    MinimumPrice,
}

/// Describes the capabilities of a price source.
#[derive(Clone, Copy, Debug)]
pub struct SourceCapabilities {
    /// Whether the source can answer historical (as-of date) requests.
    pub supports_historical: bool,

    /// Plausibility rule for current prices.
    pub plausibility: PlausibilityCheck,
}

impl Default for SourceCapabilities {
    fn default() -> Self {
        Self {
            supports_historical: true,
            plausibility: PlausibilityCheck::Basic,
        }
    }
}
