//! In-process key-value store
//!
//! Used when no Redis URL is configured, when Redis is unreachable at startup,
//! and throughout the test suite.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::store::{KeyValueStore, StoreError};

/// A stored value with its optional expiry timestamp
#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now >= expires_at)
    }
}

/// Map-backed store with read-time expiry
///
/// Expired entries are treated as absent on read and dropped lazily;
/// nothing sweeps them in the background.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether the store holds no live entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Expiry timestamp recorded for `key`, if the key exists and has one
    pub async fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(key).and_then(|entry| entry.expires_at)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop it so the map does not grow without bound
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = match ttl {
            Some(ttl) => {
                let expires_at = chrono::Duration::from_std(ttl)
                    .ok()
                    .and_then(|delta| Utc::now().checked_add_signed(delta))
                    .ok_or(StoreError::InvalidTtl(ttl.as_secs()))?;
                Some(expires_at)
            }
            None => None,
        };

        self.entries.write().await.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_returns_none_for_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get_returns_value() {
        let store = MemoryStore::new();
        store.set("k", "v", Some(Duration::from_secs(60))).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_entry_without_ttl_has_no_expiry() {
        let store = MemoryStore::new();
        store.set("forever", "v", None).await.unwrap();
        assert!(store.expires_at("forever").await.is_none());
        assert_eq!(store.get("forever").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent_and_is_dropped() {
        let store = MemoryStore::new();
        store.set("short", "v", Some(Duration::ZERO)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert!(store.entries.read().await.get("short").is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_expiry() {
        let store = MemoryStore::new();
        store.set("k", "first", Some(Duration::from_secs(60))).await.unwrap();
        store.set("k", "second", None).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));
        assert!(store.expires_at("k").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_key_and_tolerates_missing() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("never-there").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        let store = MemoryStore::new();

        let result = store.set("k", "v", Some(Duration::from_secs(u64::MAX))).await;

        assert!(matches!(result, Err(StoreError::InvalidTtl(u64::MAX))));
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
