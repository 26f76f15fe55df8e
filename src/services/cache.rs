//! In-process response cache with per-entry TTL and size limits.
//!
//! Uses DashMap for lock-free concurrent access. Expired entries are kept
//! until evicted so the failover path can serve stale data as a last resort.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: String,
    inserted_at: DateTime<Utc>,
    ttl_secs: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.inserted_at).num_seconds();
        age <= self.ttl_secs as i64
    }
}

/// Shared cache for serialized provider responses.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    max_size: usize,
}

impl ResponseCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_size: max_size.max(1),
        }
    }

    /// Get a value that is still within its TTL.
    pub fn get_fresh(&self, key: &str) -> Option<String> {
        let now = Utc::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.payload.clone())
    }

    /// Get a value regardless of TTL. Degraded-mode reads only.
    pub fn get_stale(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    /// Insert a value with its own TTL, evicting expired entries when full.
    pub fn put(&self, key: &str, payload: String, ttl_secs: u64) {
        if self.entries.len() >= self.max_size {
            let evicted = self.cleanup_expired();
            debug!("Response cache full, evicted {} expired entries", evicted);
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                payload,
                inserted_at: Utc::now(),
                ttl_secs,
            },
        );
    }

    /// Delete a key. Returns true if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop entries past their TTL. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn backdate(cache: &ResponseCache, key: &str, age_secs: i64) {
        let mut entry = cache.entries.get_mut(key).expect("entry should exist");
        entry.inserted_at = Utc::now() - Duration::seconds(age_secs);
    }

    #[test]
    fn test_fresh_roundtrip() {
        let cache = ResponseCache::default();
        cache.put("live_scores:NBA", "[]".to_string(), 60);

        assert_eq!(cache.get_fresh("live_scores:NBA").as_deref(), Some("[]"));
        assert_eq!(cache.get_fresh("live_scores:NFL"), None);
    }

    #[test]
    fn test_expired_entry_served_stale_only() {
        let cache = ResponseCache::default();
        cache.put("schedule:NFL", "[1]".to_string(), 60);
        backdate(&cache, "schedule:NFL", 120);

        assert_eq!(cache.get_fresh("schedule:NFL"), None);
        assert_eq!(cache.get_stale("schedule:NFL").as_deref(), Some("[1]"));
    }

    #[test]
    fn test_remove() {
        let cache = ResponseCache::default();
        cache.put("leaderboard:abc", "x".to_string(), 30);

        assert!(cache.remove("leaderboard:abc"));
        assert!(!cache.remove("leaderboard:abc"));
        assert_eq!(cache.get_stale("leaderboard:abc"), None);
    }

    #[test]
    fn test_cleanup_expired_keeps_fresh_entries() {
        let cache = ResponseCache::default();
        cache.put("old", "1".to_string(), 10);
        cache.put("new", "2".to_string(), 600);
        backdate(&cache, "old", 60);

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_fresh("new").as_deref(), Some("2"));
    }

    #[test]
    fn test_put_at_capacity_evicts_expired() {
        let cache = ResponseCache::new(2);
        cache.put("a", "1".to_string(), 10);
        cache.put("b", "2".to_string(), 600);
        backdate(&cache, "a", 60);

        cache.put("c", "3".to_string(), 600);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_fresh("a"), None);
        assert!(cache.get_fresh("c").is_some());
    }
}
