//! Key-value backend abstraction for the price cache.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::CacheError;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Minimal key-value store the price cache is built on.
///
/// Every write is a single atomic operation on one key. `incr` must not
/// lose updates when several workers bump the same key concurrently.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read a value. Expired keys read as `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Read several values at once, in key order.
    async fn get_many(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Write a value, replacing any previous one. `ttl` of `None` never expires.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    /// Atomically increment an integer key and return the new value.
    ///
    /// A missing key counts as zero. `ttl_on_create` is applied only when
    /// the increment creates the key.
    async fn incr(&self, key: &str, ttl_on_create: Option<Duration>) -> CacheResult<i64>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;
}
