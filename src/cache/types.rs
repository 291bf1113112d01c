//! Core type definitions for the cache system

use crate::format::ResolvedFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Cache key type: the asset reference, optionally extended with constraints
pub type CacheKey = String;

/// A ready-to-render encoded image
///
/// Cloning is cheap; the payload is shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    /// Reference the resource was resolved from
    pub reference: String,

    /// Encoding of `bytes`
    pub format: ResolvedFormat,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Encoded payload
    pub bytes: Arc<[u8]>,
}

impl Resource {
    /// Create a resource from an encoded payload
    pub fn new(
        reference: impl Into<String>,
        format: ResolvedFormat,
        width: u32,
        height: u32,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            reference: reference.into(),
            format,
            width,
            height,
            bytes: bytes.into(),
        }
    }

    /// MIME type of the payload
    pub fn content_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("reference", &self.reference)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses (stale reads included)
    pub misses: u64,

    /// Number of entries currently in cache
    pub entries: usize,

    /// Total payload bytes held
    pub size_bytes: usize,

    /// Entries evicted because the cache was full
    pub evictions_capacity: u64,

    /// Entries removed for exceeding the maximum age
    pub evictions_expired: u64,

    /// Entries removed by `invalidate` or `clear`
    pub invalidations: u64,
}

impl CacheStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Cache miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Total evictions of either kind
    pub fn total_evictions(&self) -> u64 {
        self.evictions_capacity + self.evictions_expired
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, size: {} bytes, evictions: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.size_bytes,
            self.total_evictions()
        )
    }
}
