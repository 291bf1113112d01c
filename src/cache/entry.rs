//! Immutable cache entries with age tracking

use crate::cache::types::{CacheKey, Resource};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A cached resource and the time it was stored
///
/// Entries are never mutated; storing the same key again replaces the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The cache key
    pub key: CacheKey,

    /// When the entry was inserted
    pub created_at: DateTime<Utc>,

    /// The cached resource
    pub resource: Resource,
}

impl CacheEntry {
    /// Create an entry stamped at `now`
    pub fn new(key: CacheKey, resource: Resource, now: DateTime<Utc>) -> Self {
        Self {
            key,
            created_at: now,
            resource,
        }
    }

    /// Time elapsed since insertion, zero if `now` is before `created_at`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Whether the entry is younger than `max_age`
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) < max_age
    }

    /// Time left before the entry goes stale
    pub fn time_until_expiration(&self, now: DateTime<Utc>, max_age: Duration) -> Option<Duration> {
        max_age.checked_sub(self.age(now)).filter(|d| !d.is_zero())
    }

    /// Approximate memory held by this entry
    pub fn size_bytes(&self) -> usize {
        self.key.len() + self.resource.reference.len() + self.resource.len()
    }
}
