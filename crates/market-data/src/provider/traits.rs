//! Price source trait definitions.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::Quote;

use super::capabilities::SourceCapabilities;

/// Capability interface shared by every quote provider.
///
/// Implementations are stateless with respect to cached prices: they take a
/// ticker (and a date) and return a value, nothing more. Failures of any
/// kind are reported as `MarketDataError` and turned into "no quote from
/// this source" by the registry.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use pricecache_market_data::provider::{PriceSource, SourceCapabilities};
///
/// struct FixedSource;
///
/// #[async_trait]
/// impl PriceSource for FixedSource {
///     fn id(&self) -> &'static str {
///         "fixed"
///     }
///
///     async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError> {
///         Ok(Quote::current(ticker, dec!(10), self.id(), Utc::now()))
///     }
///
///     // ... fetch_historical
/// }
/// ```
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Unique identifier for this source, lower-case ("yfinance", "stooq").
    ///
    /// Matched against the configured source priority and recorded as the
    /// provenance of every quote the source produces.
    fn id(&self) -> &'static str;

    /// Describes what this source can do.
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::default()
    }

    /// Fetch the current price for a ticker.
    async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError>;

    /// Fetch the close for a ticker on `date`.
    ///
    /// Sources may answer with the last close on or before `date` when the
    /// date itself was not a trading day.
    async fn fetch_historical(&self, ticker: &str, date: NaiveDate)
        -> Result<Quote, MarketDataError>;
}
