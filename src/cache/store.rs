//! Key-value store abstraction shared by the cache and the fallback archive
//!
//! The store only deals in strings. Typed JSON handling lives one level up in
//! [`CacheManager`](super::CacheManager) and [`FallbackArchive`](super::FallbackArchive).

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to a key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or failed the command
    #[error("store command failed: {0}")]
    Command(#[from] redis::RedisError),

    /// The store is not reachable at all
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The expiry would fall outside the representable time range
    #[error("ttl of {0}s is out of range")]
    InvalidTtl(u64),

    /// A value could not be encoded as JSON before writing
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String get / set-with-expiry / delete over a shared store
///
/// Every operation is atomic for a single key; callers never need
/// multi-key transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`
    ///
    /// With `ttl = None` the entry never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes `key`; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Short label used in log lines ("memory", "redis")
    fn backend(&self) -> &'static str;
}
