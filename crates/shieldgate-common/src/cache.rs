//! Single-slot TTL cache for the shared secret
//!
//! Both runtime handlers read one secret, so the cache holds exactly one
//! `(value, expires_at)` pair and needs no eviction policy. The slot is owned
//! by the handler that uses it rather than living in a global, which keeps
//! tests from leaking state into each other.

use parking_lot::Mutex;

/// A cached secret value and the instant (ms since epoch) it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: String,
    pub expires_at: i64,
}

/// Check whether a cache entry may still be served at time `now` (ms).
///
/// Valid iff an entry exists and `now < expires_at`.
pub fn is_cache_valid(cache: Option<&CacheEntry>, now: i64) -> bool {
    cache.is_some_and(|entry| now < entry.expires_at)
}

/// Create a cache entry for `value` fetched at `now` (ms) living `ttl_secs`.
pub fn create_cache_entry(value: impl Into<String>, ttl_secs: u64, now: i64) -> CacheEntry {
    let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
    CacheEntry {
        value: value.into(),
        expires_at: now.saturating_add(ttl_ms),
    }
}

/// Cache slot owned by a handler.
///
/// The lock is only held for reads and writes of the slot, never across the
/// fetch that refills it.
#[derive(Debug, Default)]
pub struct SecretCache {
    slot: Mutex<Option<CacheEntry>>,
}

impl SecretCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value if it is still valid at `now`
    pub fn get(&self, now: i64) -> Option<String> {
        let slot = self.slot.lock();
        if is_cache_valid(slot.as_ref(), now) {
            slot.as_ref().map(|entry| entry.value.clone())
        } else {
            None
        }
    }

    /// Return the raw entry, expired or not
    pub fn entry(&self) -> Option<CacheEntry> {
        self.slot.lock().clone()
    }

    /// Replace the cached entry
    pub fn set(&self, entry: CacheEntry) {
        *self.slot.lock() = Some(entry);
    }

    /// Drop the cached entry
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}
