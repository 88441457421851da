//! Idempotency cache for already-seen content hashes.
//!
//! Owned by the supervisor: constructed at startup, torn down at shutdown,
//! with explicit invalidate/refresh operations — no ambient global state.
//! Entries expire after a TTL so long runs re-check the store instead of
//! trusting arbitrarily old lookups.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct SeenCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl SeenCache {
    pub fn new(ttl: Duration) -> Self {
        SeenCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let Ok(entries) = self.entries.lock() else {
            return false;
        };
        match entries.get(key) {
            Some(inserted_at) => inserted_at.elapsed() < self.ttl,
            None => false,
        }
    }

    pub fn insert(&self, key: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, Instant::now());
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    /// Drops every expired entry; returns how many were evicted. Called from
    /// the heartbeat so the map does not grow for the whole run.
    pub fn invalidate_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, inserted_at| inserted_at.elapsed() < ttl);
        before - entries.len()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
