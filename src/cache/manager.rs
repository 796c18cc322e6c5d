//! Cache manager for short-lived API responses
//!
//! Provides a `CacheManager` that stores serializable data as JSON in a shared
//! key-value store with expiry timestamps. Store failures never escape: a failed
//! read is a miss and a failed write is reported to the caller to log.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{KeyValueStore, StoreError};

/// Wrapper struct for cached data as it sits in the store
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// When the data was cached
    cached_at: DateTime<Utc>,
    /// When the cache entry expires
    expires_at: DateTime<Utc>,
}

/// Result of a fresh cache read
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
}

/// Reads and writes TTL-bound JSON entries in a [`KeyValueStore`]
///
/// The expiry is recorded twice: as the store-level TTL, and inside the entry
/// so a store that keeps the key a little longer still never serves it late.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl CacheManager {
    /// Creates a cache manager over the given store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes data to the cache with a TTL in seconds
    ///
    /// # Arguments
    /// * `key` - Cache key (e.g., "market-data")
    /// * `data` - The data to cache
    /// * `ttl_secs` - How long the entry should be considered fresh
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err` if the TTL is out of range, or encoding or the store command fails
    pub async fn write<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(StoreError::InvalidTtl(ttl_secs))?;
        let entry = CacheEntry {
            data,
            cached_at: now,
            expires_at,
        };

        let json = serde_json::to_string(&entry)?;
        self.store
            .set(key, &json, Some(StdDuration::from_secs(ttl_secs)))
            .await?;
        debug!(key, ttl_secs, "cache write");
        Ok(())
    }

    /// Reads a fresh entry from the cache
    ///
    /// Returns `None` when the entry is absent, expired, cannot be decoded as
    /// `T`, or the store itself fails.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "cache entry undecodable, treating as miss");
                return None;
            }
        };

        if Utc::now() >= entry.expires_at {
            debug!(key, "cache entry expired");
            return None;
        }

        debug!(key, "cache hit");
        Some(CachedData {
            data: entry.data,
            cached_at: entry.cached_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    /// Store whose every command fails, as if Redis were down
    struct DownStore;

    #[async_trait]
    impl KeyValueStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn set(&self, _: &str, _: &str, _: Option<StdDuration>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
        fn backend(&self) -> &'static str {
            "down"
        }
    }

    fn create_test_cache() -> (CacheManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CacheManager::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_read_returns_none_for_missing_key() {
        let (cache, _store) = create_test_cache();

        let result: Option<CachedData<TestData>> = cache.read("nonexistent_key").await;

        assert!(result.is_none(), "Should return None for missing key");
    }

    #[tokio::test]
    async fn test_write_then_read_returns_fresh_data() {
        let (cache, _store) = create_test_cache();
        let data = TestData {
            name: "fresh".to_string(),
            value: 100,
        };

        cache.write("fresh_key", &data, 600).await.expect("Write should succeed");

        let result: CachedData<TestData> = cache.read("fresh_key").await.expect("Should read fresh cache");
        assert_eq!(result.data, data);
    }

    #[tokio::test]
    async fn test_write_sets_store_level_ttl() {
        let (cache, store) = create_test_cache();
        let before = Utc::now();

        cache
            .write("ttl_key", &TestData { name: "t".into(), value: 1 }, 600)
            .await
            .expect("Write should succeed");

        let expires_at = store.expires_at("ttl_key").await.expect("Entry should carry an expiry");
        assert!(expires_at >= before + Duration::seconds(600));
        assert!(expires_at <= Utc::now() + Duration::seconds(600));
    }

    #[tokio::test]
    async fn test_zero_ttl_entry_is_never_served() {
        let (cache, _store) = create_test_cache();

        cache
            .write("expired_key", &TestData { name: "expired".into(), value: 0 }, 0)
            .await
            .expect("Write should succeed");

        let result: Option<CachedData<TestData>> = cache.read("expired_key").await;
        assert!(result.is_none(), "Cache with 0 TTL should read as a miss");
    }

    #[tokio::test]
    async fn test_cached_at_timestamp_is_recorded() {
        let (cache, _store) = create_test_cache();

        let before = Utc::now();
        cache
            .write("timestamp_key", &TestData { name: "ts".into(), value: 999 }, 600)
            .await
            .expect("Write should succeed");
        let after = Utc::now();

        let result: CachedData<TestData> = cache.read("timestamp_key").await.expect("Should read cache");
        assert!(result.cached_at >= before);
        assert!(result.cached_at <= after);
    }

    #[tokio::test]
    async fn test_undecodable_entry_reads_as_miss() {
        let (cache, store) = create_test_cache();
        store.set("garbage", "not json", None).await.unwrap();

        let result: Option<CachedData<TestData>> = cache.read("garbage").await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_miss_and_error() {
        let cache = CacheManager::new(Arc::new(DownStore));

        let read: Option<CachedData<TestData>> = cache.read("any").await;
        assert!(read.is_none());

        let write = cache.write("any", &TestData { name: "x".into(), value: 1 }, 60).await;
        assert!(write.is_err());
    }

    #[tokio::test]
    async fn test_overwrite_existing_cache() {
        let (cache, _store) = create_test_cache();
        let first = TestData { name: "first".into(), value: 1 };
        let second = TestData { name: "second".into(), value: 2 };

        cache.write("overwrite_key", &first, 600).await.unwrap();
        cache.write("overwrite_key", &second, 600).await.unwrap();

        let result: CachedData<TestData> = cache.read("overwrite_key").await.expect("Should read cache");
        assert_eq!(result.data, second, "Cache should contain latest data");
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_rejected_without_writing() {
        let (cache, store) = create_test_cache();
        let data = TestData { name: "long".into(), value: 4 };

        for ttl_secs in [1_000_000_000_000_000, i64::MAX as u64, u64::MAX] {
            let result = cache.write("long_key", &data, ttl_secs).await;
            assert!(
                matches!(result, Err(StoreError::InvalidTtl(secs)) if secs == ttl_secs),
                "ttl {} should be rejected",
                ttl_secs
            );
        }
        assert!(store.is_empty().await);
    }
}
