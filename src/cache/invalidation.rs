//! Removal reasons and events
//!
//! Explicit removals are reported to the caller as [`InvalidationEvent`]s:
//! `sweep` returns [`InvalidationReason::Expired`], `put` returns
//! [`InvalidationReason::Capacity`] when it evicts, `invalidate` returns
//! [`InvalidationReason::Manual`] and `clear` returns
//! [`InvalidationReason::Cleared`]. An entry found stale by `get` is dropped
//! without an event and only shows up in the statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason an entry left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// Entry reached the maximum age
    Expired,

    /// Removed by `invalidate`
    Manual,

    /// Evicted as the oldest insertion while the cache was full
    Capacity,

    /// Removed by `clear`
    Cleared,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Expired => write!(f, "max age exceeded"),
            InvalidationReason::Manual => write!(f, "manual invalidation"),
            InvalidationReason::Capacity => write!(f, "capacity eviction"),
            InvalidationReason::Cleared => write!(f, "cache cleared"),
        }
    }
}

/// Event for a batch of removed entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    /// Reason for invalidation
    pub reason: InvalidationReason,

    /// When the invalidation occurred
    pub timestamp: DateTime<Utc>,

    /// Keys that were removed
    pub keys: Vec<String>,

    /// Additional context
    pub context: Option<String>,
}

impl InvalidationEvent {
    /// Create a new invalidation event
    pub fn new(reason: InvalidationReason, keys: Vec<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            reason,
            timestamp,
            keys,
            context: None,
        }
    }

    /// Add context to the event
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }
}
