// =============================================================================
// TTL Cache — expiring key/value store for upstream responses
// =============================================================================
//
// Expiry is lazy: an entry past its deadline is treated as absent and removed
// on the next lookup of that key.  There is no background sweep and no size
// bound; keys are derived from a small request shape and live seconds to
// minutes.
//
// Values are handed out by `Clone`.  Store `Arc`-backed values so every reader
// shares one allocation instead of copying the payload.
//
// The clock is `tokio::time::Instant` so tests can pause and advance time.
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe string-keyed cache with a per-entry time-to-live.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry and
    /// its deadline.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let expires_at = Instant::now() + ttl;
        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set");
        self.entries
            .lock()
            .insert(key, CacheEntry { value, expires_at });
    }

    /// Return the value for `key` if it has not expired.
    ///
    /// An entry whose deadline is at or before now is evicted and reported
    /// as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;

        if entry.expires_at <= Instant::now() {
            entries.remove(key);
            debug!(key, "cache entry expired");
            return None;
        }

        Some(entry.value.clone())
    }

    /// Drop the entry for `key`. Returns `true` if one was present.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}
