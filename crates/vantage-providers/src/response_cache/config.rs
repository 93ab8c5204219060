//! Response cache configuration.

use std::time::Duration;
use thiserror::Error;

/// Errors from invalid cache configuration.
#[derive(Debug, Error)]
pub enum CacheConfigError {
    /// TTL must be non-zero.
    #[error("Cache TTL must be greater than zero")]
    ZeroTtl,

    /// Capacity must be non-zero.
    #[error("Cache capacity must be greater than zero")]
    ZeroCapacity,
}

/// Configuration for the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCacheConfig {
    /// How long an entry stays live after insertion.
    pub ttl: Duration,
    /// Maximum number of entries held at once.
    pub max_entries: usize,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(300), max_entries: 1024 }
    }
}

impl ResponseCacheConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `CacheConfigError` if TTL or capacity is zero.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.ttl.is_zero() {
            return Err(CacheConfigError::ZeroTtl);
        }
        if self.max_entries == 0 {
            return Err(CacheConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
