//! ResponseCache implementation with TTL expiry and bounded capacity.

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use super::config::{CacheConfigError, ResponseCacheConfig};
use super::types::{CacheKey, CacheStats, CachedEntry};

/// TTL cache for provider results.
///
/// Safe under concurrent readers and writers; all mutation happens behind a
/// single `RwLock` so the orchestration layer can share one instance
/// process-wide.
#[derive(Debug)]
pub struct ResponseCache<V> {
    /// The cache storage (fingerprint -> entry).
    entries: RwLock<HashMap<CacheKey, CachedEntry<V>>>,
    /// Cache configuration.
    config: ResponseCacheConfig,
    /// Cache statistics.
    stats: RwLock<CacheStats>,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a new cache with the given configuration.
    ///
    /// # Errors
    /// Returns `CacheConfigError` if the configuration is invalid.
    pub fn new(config: ResponseCacheConfig) -> Result<Self, CacheConfigError> {
        config.validate()?;

        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            config,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Looks up a live entry, lazily dropping it if its TTL elapsed.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let expired = {
            let entries = self.entries.read().expect("Cache lock poisoned");
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    let mut stats = self.stats.write().expect("Stats lock poisoned");
                    stats.hits += 1;
                    debug!(key = %key.as_str(), "Cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().expect("Cache lock poisoned");
            // Re-check under the write lock; another reader may have purged it.
            if entries.remove(key).is_some() {
                let mut stats = self.stats.write().expect("Stats lock poisoned");
                stats.expirations += 1;
                stats.size = entries.len();
            }
            debug!(key = %key.as_str(), "Cache entry expired");
        }

        let mut stats = self.stats.write().expect("Stats lock poisoned");
        stats.misses += 1;
        None
    }

    /// Inserts a value, evicting the oldest entry first when at capacity.
    pub fn put(&self, key: CacheKey, value: V) {
        let mut entries = self.entries.write().expect("Cache lock poisoned");

        if !entries.contains_key(&key) && entries.len() >= self.config.max_entries {
            if let Some(oldest) = Self::find_oldest_key(&entries) {
                entries.remove(&oldest);
                let mut stats = self.stats.write().expect("Stats lock poisoned");
                stats.evictions += 1;
                debug!(key = %oldest.as_str(), "Evicted oldest cache entry");
            }
        }

        entries.insert(key, CachedEntry::new(value, self.config.ttl));
        let mut stats = self.stats.write().expect("Stats lock poisoned");
        stats.size = entries.len();
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write().expect("Cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = before - entries.len();

        if removed > 0 {
            let mut stats = self.stats.write().expect("Stats lock poisoned");
            stats.expirations += removed as u64;
            stats.size = entries.len();
            debug!(removed, "Swept expired cache entries");
        }

        removed
    }

    /// Current number of stored entries (live or not yet swept).
    pub fn len(&self) -> usize {
        self.entries.read().expect("Cache lock poisoned").len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut entries = self.entries.write().expect("Cache lock poisoned");
        entries.clear();
        let mut stats = self.stats.write().expect("Stats lock poisoned");
        stats.size = 0;
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut result = *self.stats.read().expect("Stats lock poisoned");
        result.size = self.entries.read().expect("Cache lock poisoned").len();
        result
    }

    /// Get the cache configuration.
    #[must_use]
    pub fn config(&self) -> &ResponseCacheConfig {
        &self.config
    }

    /// Find the oldest entry by insertion time.
    fn find_oldest_key(entries: &HashMap<CacheKey, CachedEntry<V>>) -> Option<CacheKey> {
        entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone())
    }
}
