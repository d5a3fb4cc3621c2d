//! Replay cache for accepted payment signatures

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Remembers which payment signatures this process has already served so
/// a single paid signature cannot buy two deliveries. Process-local;
/// eviction piggybacks on inserts.
#[derive(Debug)]
pub struct ReplayCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl ReplayCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Accept a signature if it has not been seen within the TTL.
    /// Returns false when the signature is a replay.
    pub fn try_accept(&self, signature: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, seen_at| now.duration_since(*seen_at) < self.ttl);
        if entries.contains_key(signature) {
            return false;
        }
        entries.insert(signature.to_string(), now);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
