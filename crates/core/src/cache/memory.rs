//! In-process cache backend.
//!
//! Backed by `DashMap`: reads take a shard read lock, and increments run
//! under the shard's write lock through the entry API, so concurrent
//! increments of one key never lose updates.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{CacheBackend, CacheResult};
use crate::errors::CacheError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// `DashMap`-backed cache backend with per-key expiry.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }

        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        self.entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    async fn incr(&self, key: &str, ttl_on_create: Option<Duration>) -> CacheResult<i64> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new("0".to_string(), ttl_on_create));

        if entry.is_expired(now) {
            *entry = Entry::new("0".to_string(), ttl_on_create);
        }

        let current: i64 = entry.value.parse().map_err(|_| CacheError::Corrupt {
            key: key.to_string(),
            message: format!("not an integer: '{}'", entry.value),
        })?;
        let next = current.checked_add(1).ok_or_else(|| CacheError::Corrupt {
            key: key.to_string(),
            message: "counter overflow".to_string(),
        })?;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
