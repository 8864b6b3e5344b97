use crate::page::Method;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// The remembered extraction method for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCacheEntry {
    /// Lowercase hostname the entry belongs to
    pub domain: String,

    /// Method that last succeeded for this domain
    pub method: Method,

    /// Time of the last successful extraction recorded for this domain
    pub last_updated: DateTime<Utc>,

    /// Successful extractions recorded since the entry was created
    pub success_count: u64,
}

impl MethodCacheEntry {
    /// Creates an entry for a first success at `now`
    pub fn new(domain: String, method: Method, now: DateTime<Utc>) -> Self {
        Self {
            domain,
            method,
            last_updated: now,
            success_count: 1,
        }
    }

    /// Checks if the entry has outlived `ttl`
    ///
    /// An entry is still fresh at exactly `ttl` and becomes stale strictly after.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) > ttl
    }

    /// Returns the time elapsed since the last write
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_updated
    }

    /// Records another success, overwriting the method and refreshing the TTL
    ///
    /// A stale entry starts counting again from one.
    pub fn refresh(&mut self, method: Method, now: DateTime<Utc>, ttl: Duration) {
        if self.is_stale(now, ttl) {
            self.success_count = 0;
        }
        self.method = method;
        self.last_updated = now;
        self.success_count = self.success_count.saturating_add(1);
    }
}
