//! Fetch/transcode pipeline
//!
//! [`AssetPipeline::resolve`] turns a reference and rendering constraints
//! into a ready-to-render [`Resource`]:
//!
//! 1. Look the key up in the [`AssetCache`]; a fresh hit returns at once.
//! 2. Pick the output format: the requested one, else the prober's choice.
//! 3. Fetch and decode the source through the [`CodecBackend`], then fit it
//!    into the requested box (width first, then height).
//! 4. Re-encode at the requested quality (default 80).
//! 5. Store the result in the cache and return it.
//!
//! Backend failures surface as [`AssetError::AssetUnavailable`] with the
//! original cause attached and are never cached.
//!
//! ## Example
//!
//! ```rust,no_run
//! use imgcache::cache::{AssetCache, CacheConfig};
//! use imgcache::codec::ImageCodec;
//! use imgcache::pipeline::{AssetPipeline, PipelineConfig, RequestConstraints};
//! use std::sync::Arc;
//!
//! # async fn example() -> imgcache::Result<()> {
//! let cache = Arc::new(AssetCache::new(CacheConfig::default()));
//! let backend = Arc::new(ImageCodec::from_dir("./public"));
//! let pipeline = AssetPipeline::new(cache, backend, PipelineConfig::default());
//!
//! let resource = pipeline
//!     .resolve("img/hero.png", RequestConstraints::for_width(1280))
//!     .await?;
//! println!("{} bytes of {}", resource.len(), resource.content_type());
//! # Ok(())
//! # }
//! ```

pub mod dimensions;
pub mod inflight;

pub use dimensions::fit_dimensions;
pub use inflight::InFlight;

use crate::cache::{AssetCache, CacheKey, CacheKeyPolicy, Resource};
use crate::codec::CodecBackend;
use crate::error::{AssetError, CodecError, Result};
use crate::format::{CapabilityProber, ResolvedFormat};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default encode quality on the 0-100 scale
pub const DEFAULT_QUALITY: u8 = 80;

/// Rendering constraints for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RequestConstraints {
    /// Maximum output width
    pub width: Option<u32>,

    /// Maximum output height
    pub height: Option<u32>,

    /// Encode quality, 0-100
    pub quality: Option<u8>,

    /// Output format; `None` lets the capability prober decide
    pub format: Option<ResolvedFormat>,
}

impl RequestConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constraints bounding only the width
    pub fn for_width(width: u32) -> Self {
        Self::new().with_width(width)
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_format(mut self, format: ResolvedFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Quality as a fraction in `0.0..=1.0`
    pub fn quality_fraction(&self, default_quality: u8) -> f32 {
        f32::from(self.quality.unwrap_or(default_quality).min(100)) / 100.0
    }
}

/// Configuration for the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Quality used when a request does not set one
    pub default_quality: u8,

    /// How cache keys are derived from requests
    pub key_policy: CacheKeyPolicy,

    /// Collapse concurrent resolutions of the same key into one
    pub deduplicate_in_flight: bool,

    /// Limit for each backend attempt; `None` waits indefinitely
    pub backend_timeout: Option<Duration>,

    /// Extra backend attempts after a failure
    pub max_retries: u32,

    /// Base delay between attempts, multiplied by the attempt number
    pub retry_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_quality: DEFAULT_QUALITY,
            key_policy: CacheKeyPolicy::Reference,
            deduplicate_in_flight: true,
            backend_timeout: None,
            max_retries: 0,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for pipeline configuration
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for pipeline configuration
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    default_quality: Option<u8>,
    key_policy: Option<CacheKeyPolicy>,
    deduplicate_in_flight: Option<bool>,
    backend_timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_delay: Option<Duration>,
}

impl PipelineConfigBuilder {
    pub fn default_quality(mut self, quality: u8) -> Self {
        self.default_quality = Some(quality.min(100));
        self
    }

    pub fn key_policy(mut self, policy: CacheKeyPolicy) -> Self {
        self.key_policy = Some(policy);
        self
    }

    pub fn deduplicate_in_flight(mut self, enable: bool) -> Self {
        self.deduplicate_in_flight = Some(enable);
        self
    }

    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Build the pipeline configuration
    pub fn build(self) -> PipelineConfig {
        let defaults = PipelineConfig::default();

        PipelineConfig {
            default_quality: self.default_quality.unwrap_or(defaults.default_quality),
            key_policy: self.key_policy.unwrap_or(defaults.key_policy),
            deduplicate_in_flight: self
                .deduplicate_in_flight
                .unwrap_or(defaults.deduplicate_in_flight),
            backend_timeout: self.backend_timeout.or(defaults.backend_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
        }
    }
}

/// Resolves references into cached, re-encoded resources
///
/// Cloning is cheap; clones share the cache, prober and in-flight table.
#[derive(Clone)]
pub struct AssetPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    cache: Arc<AssetCache>,
    prober: Arc<CapabilityProber>,
    backend: Arc<dyn CodecBackend>,
    config: PipelineConfig,
    in_flight: InFlight,
}

impl AssetPipeline {
    /// Create a pipeline with a prober over the same backend
    pub fn new(
        cache: Arc<AssetCache>,
        backend: Arc<dyn CodecBackend>,
        config: PipelineConfig,
    ) -> Self {
        let prober = Arc::new(CapabilityProber::new(backend.clone()));
        Self::with_prober(cache, backend, prober, config)
    }

    /// Create a pipeline sharing an existing prober
    pub fn with_prober(
        cache: Arc<AssetCache>,
        backend: Arc<dyn CodecBackend>,
        prober: Arc<CapabilityProber>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                cache,
                prober,
                backend,
                config,
                in_flight: InFlight::new(),
            }),
        }
    }

    /// The cache backing this pipeline
    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.inner.cache
    }

    /// The capability prober used when a request names no format
    pub fn prober(&self) -> &Arc<CapabilityProber> {
        &self.inner.prober
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Number of resolutions currently running
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Resolve `reference` under `constraints`
    pub async fn resolve(
        &self,
        reference: &str,
        constraints: RequestConstraints,
    ) -> Result<Resource> {
        let key = self.inner.config.key_policy.key_for(reference, &constraints);

        if let Some(resource) = self.inner.cache.get_resource(&key).await {
            debug!("Resolved {} from cache", key);
            return Ok(resource);
        }

        if !self.inner.config.deduplicate_in_flight {
            return self.inner.produce(reference, &key, constraints).await;
        }

        let (flight, leader) = self.inner.in_flight.join_or_start(&key, |id| {
            let inner = self.inner.clone();
            let reference = reference.to_string();
            let key = key.clone();

            // Runs detached so the result still reaches the cache when
            // every caller has gone away.
            let task = tokio::spawn(async move {
                let result = inner.produce(&reference, &key, constraints).await;
                inner.in_flight.finish(&key, id);
                result
            });

            async move {
                task.await.unwrap_or_else(|e| {
                    Err(AssetError::Other(format!("resolve task failed: {}", e)))
                })
            }
            .boxed()
            .shared()
        });

        if !leader {
            debug!("Joining in-flight resolution of {}", key);
        }
        flight.await
    }
}

/// Anything that can turn a reference into a resource
///
/// The deferred trigger depends on this rather than on [`AssetPipeline`]
/// directly.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve(&self, reference: &str, constraints: RequestConstraints) -> Result<Resource>;
}

#[async_trait]
impl AssetResolver for AssetPipeline {
    async fn resolve(&self, reference: &str, constraints: RequestConstraints) -> Result<Resource> {
        AssetPipeline::resolve(self, reference, constraints).await
    }
}

impl PipelineInner {
    async fn produce(
        &self,
        reference: &str,
        key: &CacheKey,
        constraints: RequestConstraints,
    ) -> Result<Resource> {
        let format = match constraints.format {
            Some(format) => format,
            None => self.prober.determine_format().await,
        };

        let source = self
            .attempt(reference, || self.backend.fetch_and_decode(reference))
            .await?;

        let (width, height) =
            fit_dimensions(source.width, source.height, constraints.width, constraints.height);
        let quality = constraints.quality_fraction(self.config.default_quality);

        let bytes = self
            .attempt(reference, || {
                self.backend.encode(&source, width, height, format, quality)
            })
            .await?;

        let resource = Resource::new(reference, format, width, height, bytes);
        self.cache.put(key.clone(), resource.clone()).await;

        info!(
            "Resolved {} as {} {}x{} ({} bytes)",
            reference,
            format,
            width,
            height,
            resource.len()
        );
        Ok(resource)
    }

    /// Run one backend operation under the timeout and retry settings
    async fn attempt<T, F, Fut>(&self, reference: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, CodecError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let outcome = match self.config.backend_timeout {
                Some(limit) => match tokio::time::timeout(limit, op()).await {
                    Ok(result) => result,
                    Err(_) => Err(CodecError::Timeout(limit.as_millis() as u64)),
                },
                None => op().await,
            }
            .map_err(|e| AssetError::unavailable(reference, e));

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retryable = !matches!(
                err.codec_cause(),
                Some(CodecError::UnsupportedFormat(_))
            );
            if !retryable || attempt >= self.config.max_retries {
                warn!("Backend failed for {}: {}", reference, err);
                return Err(err);
            }

            attempt += 1;
            let delay = self.config.retry_delay * attempt;
            warn!(
                "Backend failed for {} (attempt {}/{}), retrying after {:?}: {}",
                reference,
                attempt,
                self.config.max_retries + 1,
                delay,
                err
            );
            tokio::time::sleep(delay).await;
        }
    }
}
