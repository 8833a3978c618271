use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The point in time a quote applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AsOf {
    /// A live/current price observed at this instant.
    Instant(DateTime<Utc>),
    /// A historical close for this trading date.
    Date(NaiveDate),
}

impl AsOf {
    /// Returns the trading date for historical quotes.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            AsOf::Instant(_) => None,
            AsOf::Date(date) => Some(*date),
        }
    }
}

impl fmt::Display for AsOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsOf::Instant(at) => write!(f, "{}", at.to_rfc3339()),
            AsOf::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// A price plus its provenance.
///
/// Produced by a source adapter or by the registry after fallback
/// resolution. `price` and `source` are absent together when no source
/// produced a usable value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker as requested by the caller
    pub ticker: String,

    /// Price, absent when unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Identifier of the source that produced the price (yfinance, stooq, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Instant (current) or date (historical) the price applies to
    pub as_of: AsOf,
}

impl Quote {
    /// Create a current quote observed at `at`.
    pub fn current(
        ticker: impl Into<String>,
        price: Decimal,
        source: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            price: Some(price),
            source: Some(source.into()),
            as_of: AsOf::Instant(at),
        }
    }

    /// Create a historical close for `date`.
    pub fn historical(
        ticker: impl Into<String>,
        date: NaiveDate,
        price: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            price: Some(price),
            source: Some(source.into()),
            as_of: AsOf::Date(date),
        }
    }

    /// A quote carrying no price and no source.
    pub fn unavailable(ticker: impl Into<String>, as_of: AsOf) -> Self {
        Self {
            ticker: ticker.into(),
            price: None,
            source: None,
            as_of,
        }
    }

    /// True when a price is present.
    pub fn is_available(&self) -> bool {
        self.price.is_some()
    }
}
