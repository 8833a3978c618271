//! Core error types.
//!
//! Source failures never reach this layer (the registry absorbs them), so
//! the interesting distinction here is between cache errors that only
//! affect one ticker and cache errors that mean the backing store is gone.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the price cache engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Price cache operation failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Job queue error: {0}")]
    JobQueue(String),
}

impl Error {
    /// True when the error means the whole job cannot continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Cache(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Errors raised by a cache backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The backing store cannot be reached.
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("Corrupt cache entry '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Any other backend-reported failure.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    /// Only an unreachable backend is fatal; a corrupt entry or a rejected
    /// command affects a single key.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CacheError::Unavailable(_))
    }
}
