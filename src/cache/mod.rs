//! Storage layer: key-value stores, the short-lived cache and the archive
//!
//! Two logical stores share one physical key-value store, separated by key
//! namespace. The cache holds TTL-bound entries; the archive holds the last
//! known good payload per category with no expiry. Both degrade to "miss" or
//! "no-op" when the store is down, so the fetch pipeline keeps answering.

mod archive;
mod manager;
mod memory;
mod redis_store;
mod store;

pub use archive::FallbackArchive;
pub use manager::{CacheManager, CachedData};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{KeyValueStore, StoreError};
