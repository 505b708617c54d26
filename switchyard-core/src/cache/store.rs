//! Cache store trait and the in-memory backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::{Response, Result};

/// A cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cache key.
    pub key: String,
    /// Cached response.
    pub value: Response,
    /// When the entry was stored.
    pub inserted_at: Instant,
    /// Time-to-live.
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create an entry stored now.
    pub fn new(key: impl Into<String>, value: Response, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// Check if the entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }

    /// Time left before expiry.
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.inserted_at.elapsed())
    }
}

/// Cache store trait for different cache backends.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a cached response.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(response))` on a live hit and `Ok(None)` on a miss.
    /// An expired entry is a miss and is never returned.
    async fn get(&self, key: &str) -> Result<Option<Response>>;

    /// Store a response, replacing any previous entry under the key.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - The response to store
    /// * `ttl` - Time-to-live
    async fn set(&self, key: &str, value: Response, ttl: Duration) -> Result<()>;

    /// Delete a key. Returns `true` if an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry.
    async fn clear(&self) -> Result<()>;

    /// Number of stored entries, expired ones included until evicted.
    async fn len(&self) -> Result<usize>;
}

/// In-memory cache store.
///
/// Expired entries are evicted lazily when read. [`purge_expired`] drops
/// them eagerly.
///
/// [`purge_expired`]: InMemoryCacheStore::purge_expired
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Get the full entry for a key, if live.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Response>> {
        let hit = self.entry(key).map(|entry| entry.value);
        trace!(key, hit = hit.is_some(), "Cache lookup");
        Ok(hit)
    }

    async fn set(&self, key: &str, value: Response, ttl: Duration) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), CacheEntry::new(key, value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().len())
    }
}
