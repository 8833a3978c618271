//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The error enum returned by every price source
//! - [`RetryClass`]: Classification used to decide how a failure is logged

mod retry;

pub use retry::RetryClass;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while fetching a price from a source.
///
/// Sources are unreliable by nature, so none of these errors is surfaced to
/// callers of the registry. They are logged and the fallback walk moves on.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The symbol exists but the provider has no close for the requested date.
    #[error("No data for {ticker} on {date}")]
    NoDataForDate {
        /// The ticker that was requested
        ticker: String,
        /// The requested as-of date
        date: NaiveDate,
    },

    /// The provider rate limited the request (HTTP 429 or an API note).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider did not complete within its time budget.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred (bad status, malformed payload).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider returned a price that failed the plausibility filter.
    #[error("Implausible price from {provider}: {price}")]
    ImplausiblePrice {
        /// The provider that returned the value
        provider: String,
        /// The rejected price
        price: Decimal,
    },

    /// The provider does not implement the requested operation.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation that was attempted
        operation: String,
        /// The provider that lacks it
        provider: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricecache_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "yfinance".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Transient);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::ProviderError { .. }
            | Self::Network(_) => RetryClass::Transient,

            Self::SymbolNotFound(_)
            | Self::NoDataForDate { .. }
            | Self::ImplausiblePrice { .. }
            | Self::NotSupported { .. } => RetryClass::NextProvider,
        }
    }
}
