//! # Expiring Cache
//!
//! A process-wide key/value map where every entry carries its own time-to-live.
//! The orchestrator keeps one formatted schema context per user and connection
//! here, under the key produced by [`schema_cache_key`].
//!
//! Expired entries are never returned: a read that finds one removes it, and
//! [`ExpiringCache::start_cleanup_task`] can sweep the rest on an interval.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// The cache holding formatted schema contexts.
pub type SchemaCache = ExpiringCache<String>;

/// Builds the cache key for a user's connection: `schema:<userId>:<connectionId>`.
///
/// Anything that invalidates a connection's schema (edit, delete) must use this.
pub fn schema_cache_key(user_id: &str, connection_id: &str) -> String {
    format!("schema:{user_id}:{connection_id}")
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

#[derive(Debug)]
pub struct ExpiringCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> ExpiringCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores `value` under `key`, replacing any previous entry and restarting its clock.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        debug!(key = %key, ttl_secs = ttl.as_secs_f64(), "cache set");
        self.write().insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Stores `value` with the cache's default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Returns the value if present and not expired. An expired entry is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        {
            let entries = self.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_fresh(Instant::now()) => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a concurrent `set` may have replaced
        // the stale entry since the read lock was released.
        let mut entries = self.write();
        let fresh = entries
            .get(key)
            .map(|entry| entry.is_fresh(Instant::now()));
        match fresh {
            Some(true) => entries.get(key).map(|entry| entry.value.clone()),
            Some(false) => {
                entries.remove(key);
                debug!(key = %key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key` whether or not it has expired. Returns whether an entry existed.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.write().remove(key).is_some();
        if removed {
            debug!(key = %key, "cache entry deleted");
        }
        removed
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        purged
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone + Send + Sync + 'static> ExpiringCache<V> {
    /// Spawns a task that purges expired entries every `interval`.
    ///
    /// The task only holds a weak reference, so it stops once the cache is dropped.
    pub fn start_cleanup_task(cache: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                    }
                    None => break,
                }
            }
        })
    }
}
