//! # Asset Cache
//!
//! Bounded in-memory store for resolved image resources.
//!
//! ## Features
//!
//! - **Age-Based Expiry**: entries older than `max_age` (30 minutes by
//!   default) are misses and are dropped on read
//! - **FIFO Eviction**: at capacity (50 by default) the earliest insertion
//!   is evicted; reads do not refresh an entry
//! - **Periodic Sweep**: a background task owned by a [`SweeperHandle`]
//!   reclaims entries that are never read again
//! - **Injected Clock**: ages are measured with a [`Clock`] so expiry can be
//!   tested without sleeping
//!
//! ## Example
//!
//! ```rust
//! use imgcache::cache::{AssetCache, CacheConfig, Resource};
//! use imgcache::format::ResolvedFormat;
//!
//! # async fn example() {
//! let cache = AssetCache::new(CacheConfig::default());
//!
//! let resource = Resource::new("img/a.png", ResolvedFormat::Webp, 100, 50, vec![0u8; 64]);
//! cache.put("img/a.png".to_string(), resource).await;
//!
//! if let Some(entry) = cache.get("img/a.png").await {
//!     println!("Cache hit: {:?}", entry.resource);
//! }
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod entry;
pub mod invalidation;
pub mod key;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use key::{CacheKeyBuilder, CacheKeyPolicy};
pub use store::{AssetCache, SweeperHandle};
pub use types::{CacheKey, CacheStats, Resource};
