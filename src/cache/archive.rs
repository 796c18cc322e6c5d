//! Last-known-good archive
//!
//! One entry per category, stored without expiry under the `fallback:`
//! namespace so cache expiry can never evict it. Reads happen only when both
//! the cache and the upstream provider have failed.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::store::KeyValueStore;
use crate::data::Category;

/// KVS-backed mirror of the last successful payload per category
#[derive(Clone)]
pub struct FallbackArchive {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for FallbackArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackArchive")
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl FallbackArchive {
    /// Creates an archive over the given store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the archived payload for `category`
    ///
    /// Absent, undecodable and unreadable entries all come back as `None`.
    pub async fn get<T: DeserializeOwned>(&self, category: &Category) -> Option<T> {
        let key = category.archive_key();
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "archive read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "archive entry undecodable");
                None
            }
        }
    }

    /// Stores `payload` as the last-known-good value for `category`
    ///
    /// Best-effort: a failed write is logged and dropped, it never fails the
    /// request that triggered it.
    pub async fn set<T: Serialize>(&self, category: &Category, payload: &T) {
        let key = category.archive_key();
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "archive encode failed");
                return;
            }
        };

        match self.store.set(&key, &json, None).await {
            Ok(()) => debug!(key = %key, "archive updated"),
            Err(e) => warn!(key = %key, error = %e, "archive write failed"),
        }
    }
}
