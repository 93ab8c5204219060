//! Cache key and bookkeeping types.

use sha2::{Digest, Sha256};
use std::time::Instant;
use vantage_abstraction::GenerationParameters;

/// A stable fingerprint of a provider request.
///
/// Two requests produce the same key exactly when prompt, task classification,
/// generation parameters, and the structured-output flag all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Computes the fingerprint for a request.
    #[must_use]
    pub fn from_request(
        prompt: &str,
        classification: &str,
        parameters: Option<&GenerationParameters>,
        structured: bool,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update([0u8]);
        hasher.update(classification.as_bytes());
        hasher.update([0u8]);
        // Struct field order is fixed, so the JSON rendering is stable.
        let params_repr = parameters
            .and_then(|p| serde_json::to_string(p).ok())
            .unwrap_or_default();
        hasher.update(params_repr.as_bytes());
        hasher.update([u8::from(structured)]);

        let digest = hasher.finalize();
        Self(format!("{digest:x}"))
    }

    /// The hex-encoded digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A stored value with its lifetime bookkeeping.
#[derive(Debug, Clone)]
pub(super) struct CachedEntry<V> {
    /// The cached value.
    pub value: V,
    /// When the entry was inserted (used for oldest-first eviction).
    pub inserted_at: Instant,
    /// When the entry stops being served.
    pub expires_at: Instant,
}

impl<V> CachedEntry<V> {
    pub(super) fn new(value: V, ttl: std::time::Duration) -> Self {
        let now = Instant::now();
        Self { value, inserted_at: now, expires_at: now + ttl }
    }

    pub(super) fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of reads answered from the cache.
    pub hits: u64,
    /// Number of reads that found nothing live.
    pub misses: u64,
    /// Number of entries dropped to make room.
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expirations: u64,
    /// Current number of live entries.
    pub size: usize,
}
