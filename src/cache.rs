// 🗃️ Confidence-gated merchant cache
// normalized merchant → category id, with TTL, written only for confident
// classifier results (or unconditionally for human corrections).
//
// The cache is an accelerator, never a source of truth: every store failure
// is logged and swallowed, so an unavailable store behaves like an empty one.

use crate::config::CategorizerConfig;
use crate::error::CacheError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Key prefix shared with every other reader/writer of the store
pub const MERCHANT_CACHE_PREFIX: &str = "merchant:";

// ============================================================================
// KEY-VALUE STORE CAPABILITY
// ============================================================================

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process store with per-entry expiry
///
/// Each `set` replaces the whole value under the write lock, so concurrent
/// writers to one key resolve last-write-wins and never interleave.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, (Vec<u8>, Instant)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|(_, exp)| *exp > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CacheError::Unavailable("memory store lock poisoned".to_string()))?;

        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Unavailable("memory store lock poisoned".to_string()))?;

        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CacheError::Unavailable("memory store lock poisoned".to_string()))?;

        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// CONFIDENCE-GATED CACHE
// ============================================================================

pub struct ConfidenceGatedCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    write_threshold: f64,
}

impl ConfidenceGatedCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CategorizerConfig) -> Self {
        ConfidenceGatedCache {
            store,
            ttl: config.cache_ttl(),
            write_threshold: config.cache_write_threshold,
        }
    }

    pub fn write_threshold(&self) -> f64 {
        self.write_threshold
    }

    fn key(normalized_merchant: &str) -> String {
        format!("{}{}", MERCHANT_CACHE_PREFIX, normalized_merchant)
    }

    /// Cached category for a merchant; store failures read as a miss
    pub async fn lookup(&self, normalized_merchant: &str) -> Option<i64> {
        let key = Self::key(normalized_merchant);

        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(merchant = normalized_merchant, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match decode_category(&key, &raw) {
            Ok(category_id) => {
                debug!(merchant = normalized_merchant, category_id, "Cache hit");
                Some(category_id)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable cache entry");
                None
            }
        }
    }

    /// Cache a classifier result if it clears the confidence gate
    ///
    /// Returns `true` when a write was attempted.
    pub async fn put(&self, normalized_merchant: &str, category_id: i64, confidence: f64) -> bool {
        if confidence < self.write_threshold {
            debug!(
                merchant = normalized_merchant,
                confidence,
                threshold = self.write_threshold,
                "Confidence below cache threshold, not caching"
            );
            return false;
        }

        self.write(normalized_merchant, category_id).await;
        true
    }

    /// Unconditional write for human corrections
    pub async fn overwrite(&self, normalized_merchant: &str, category_id: i64) {
        self.write(normalized_merchant, category_id).await;
    }

    pub async fn invalidate(&self, normalized_merchant: &str) {
        let key = Self::key(normalized_merchant);
        match self.store.delete(&key).await {
            Ok(()) => debug!(merchant = normalized_merchant, "Invalidated cache entry"),
            Err(e) => warn!(merchant = normalized_merchant, error = %e, "Cache invalidation failed"),
        }
    }

    async fn write(&self, normalized_merchant: &str, category_id: i64) {
        let key = Self::key(normalized_merchant);
        let value = category_id.to_string().into_bytes();

        match self.store.set(&key, value, self.ttl).await {
            Ok(()) => debug!(merchant = normalized_merchant, category_id, "Cached merchant mapping"),
            Err(e) => warn!(merchant = normalized_merchant, error = %e, "Cache write failed"),
        }
    }
}

fn decode_category(key: &str, raw: &[u8]) -> Result<i64, CacheError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| CacheError::Corrupt {
            key: key.to_string(),
            detail: format!("{:?}", String::from_utf8_lossy(raw)),
        })
}

// ============================================================================
// TESTS
// ============================================================================
