//! Per-key single-flight guard
//!
//! Serialises upstream refreshes for the same key so a cache expiry under load
//! costs one upstream call instead of one per waiting request. Waiters re-probe
//! the cache once they get the guard, and skip upstream entirely when the
//! refresh they queued behind has failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;

/// What the last holder of a key left behind
#[derive(Debug, Default)]
struct Flight {
    failed_at: Option<Instant>,
}

type Slots = Mutex<HashMap<String, Arc<AsyncMutex<Flight>>>>;

/// Registry of in-flight keys
#[derive(Debug, Default)]
pub struct SingleFlight {
    slots: Arc<Slots>,
}

/// Held while a refresh for one key is running
///
/// Dropping it lets the next waiter through and forgets the key once nobody
/// else is waiting.
#[derive(Debug)]
pub struct FlightGuard {
    guard: Option<OwnedMutexGuard<Flight>>,
    slots: Arc<Slots>,
    key: String,
    queued_at: Instant,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other refresh for `key` is running, then claims it
    pub async fn acquire(&self, key: &str) -> FlightGuard {
        let queued_at = Instant::now();
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(Flight::default())))
                .clone()
        };

        FlightGuard {
            guard: Some(slot.lock_owned().await),
            slots: Arc::clone(&self.slots),
            key: key.to_string(),
            queued_at,
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl FlightGuard {
    /// True when a previous holder's refresh failed after this caller queued
    ///
    /// The caller should then settle for whatever the leader fell back to
    /// rather than repeat the upstream call.
    pub fn leader_failed(&self) -> bool {
        self.guard
            .as_ref()
            .and_then(|flight| flight.failed_at)
            .is_some_and(|failed_at| failed_at >= self.queued_at)
    }

    /// Records that this holder's refresh failed, for the waiters behind it
    pub fn mark_failed(&mut self) {
        if let Some(flight) = self.guard.as_mut() {
            flight.failed_at = Some(Instant::now());
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        // Release the key first so the strong count below only sees waiters
        drop(self.guard.take());

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}
