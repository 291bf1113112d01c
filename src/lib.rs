//! # imgcache
//!
//! Asset-loading cache for images with format negotiation and
//! visibility-driven deferred fetch.
//!
//! ## Features
//!
//! - Bounded cache with age-based expiry, FIFO eviction and a periodic sweep
//! - Capability probing that picks AVIF, then WebP, then JPEG, once per process
//! - A fetch/transcode pipeline that resizes and re-encodes on a cache miss
//! - Deferred resolution that waits for a surface to scroll into view
//! - Responsive descriptors (`srcset`/`sizes`) for multi-resolution layout
//!
//! ## Resolving an Asset
//!
//! ```no_run
//! use imgcache::{
//!     AssetCache, AssetPipeline, CacheConfig, ImageCodec, PipelineConfig, RequestConstraints,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = Arc::new(AssetCache::new(CacheConfig::default()));
//!     let _sweeper = cache.spawn_sweeper();
//!
//!     let backend = Arc::new(ImageCodec::from_dir("./public"));
//!     let pipeline = AssetPipeline::new(cache.clone(), backend, PipelineConfig::default());
//!
//!     let resource = pipeline
//!         .resolve("img/a.png", RequestConstraints::for_width(100))
//!         .await?;
//!     println!("{} {}x{}", resource.content_type(), resource.width, resource.height);
//!     println!("{}", cache.stats().await);
//!     Ok(())
//! }
//! ```
//!
//! ## Responsive Descriptors
//!
//! ```
//! use imgcache::responsive::{DescriptorBuilder, WidthProfile};
//!
//! let descriptor = DescriptorBuilder::new("img/hero.jpg")
//!     .profile(WidthProfile::Hero)
//!     .size("(max-width: 768px)", "100vw")
//!     .fallback_size("1280px")
//!     .build();
//!
//! assert_eq!(descriptor.candidates.len(), 6);
//! assert_eq!(descriptor.sizes(), "(max-width: 768px) 100vw, 1280px");
//! ```

pub mod cache;
pub mod codec;
pub mod deferred;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod responsive;

// Re-export main types for convenience
pub use cache::{
    AssetCache, CacheConfig, CacheConfigBuilder, CacheEntry, CacheKey, CacheKeyPolicy,
    CacheStats, Clock, InvalidationEvent, InvalidationReason, ManualClock, Resource,
    SweeperHandle, SystemClock,
};
pub use codec::{CodecBackend, EncodedBytes, FsSourceLoader, ImageCodec, RawImage, SourceLoader};
pub use deferred::{
    DeferredTrigger, LoadMode, PendingAsset, Rect, SurfaceId, SurfaceState, ViewportSource,
    ViewportTracker, VisibilityPolicy,
};
pub use error::{AssetError, CodecError, Result};
pub use format::{CapabilityProber, ResolvedFormat};
pub use pipeline::{AssetPipeline, AssetResolver, PipelineConfig, RequestConstraints};
pub use responsive::{DescriptorBuilder, ResponsiveDescriptor, UrlPolicy, WidthProfile};
