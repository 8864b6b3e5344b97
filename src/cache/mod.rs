//! Per-domain method cache
//!
//! Remembers which extraction method last succeeded for each domain so the
//! adaptive extractor can skip the static probe for domains known to need
//! rendering. Entries expire a fixed TTL after their last write; expired
//! entries are invisible to [`MethodCache::lookup`] and are removed lazily on
//! read or by [`MethodCache::sweep`].

mod entry;

pub use entry::MethodCacheEntry;

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::page::Method;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cache counters, reported through the administrative API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Concurrent map from domain to the method that last worked for it
///
/// Backed by a sharded map, so operations on different domains never contend
/// on a single lock. Concurrent `record` calls for the same domain are
/// serialized per shard and resolve last-write-wins.
#[derive(Debug)]
pub struct MethodCache {
    entries: DashMap<String, MethodCacheEntry>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MethodCache {
    /// Creates a cache reading time from the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs))
    }

    /// Returns the remembered method for `domain`, if a fresh entry exists
    pub fn lookup(&self, domain: &str) -> Option<Method> {
        self.entry(domain).map(|entry| entry.method)
    }

    /// Returns a copy of the fresh entry for `domain`
    pub fn entry(&self, domain: &str) -> Option<MethodCacheEntry> {
        let key = domain.to_lowercase();
        let now = self.clock.now();

        // The read guard must be released before remove_if takes the shard lock
        let found = self.entries.get(&key).map(|entry| entry.clone());

        match found {
            Some(entry) if !entry.is_stale(now, self.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Some(_) => {
                self.entries
                    .remove_if(&key, |_, entry| entry.is_stale(now, self.ttl));
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(domain = %key, "Method cache entry expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Records a successful extraction of `domain` with `method`
    ///
    /// Overwrites the stored method, refreshes the TTL and increments the
    /// success count. Returns the new success count.
    pub fn record(&self, domain: &str, method: Method) -> u64 {
        let now = self.clock.now();

        match self.entries.entry(domain.to_lowercase()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.refresh(method, now, self.ttl);
                entry.success_count
            }
            Entry::Vacant(vacant) => {
                let entry = MethodCacheEntry::new(vacant.key().clone(), method, now);
                vacant.insert(entry);
                1
            }
        }
    }

    /// Forgets `domain`; returns true if an entry was present
    pub fn invalidate(&self, domain: &str) -> bool {
        self.entries.remove(&domain.to_lowercase()).is_some()
    }

    /// Forgets every domain
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Removes every expired entry and returns how many were removed
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            let keep = !entry.is_stale(now, ttl);
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Spawns a background task sweeping the cache every `period`
    ///
    /// The task holds only a weak reference and exits once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let cache = match weak.upgrade() {
                    Some(cache) => cache,
                    None => break,
                };

                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, "Swept expired method cache entries");
                }
            }
        })
    }
}
