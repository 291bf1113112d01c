//! Codec backend interface
//!
//! The pipeline treats decoding and re-encoding as a black box behind
//! [`CodecBackend`]. A backend can wrap an OS image library, a remote
//! transcoder, or the in-process [`ImageCodec`].

pub mod image_backend;

pub use image_backend::{FsSourceLoader, ImageCodec, SourceLoader};

use crate::error::CodecError;
use crate::format::ResolvedFormat;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Encoded output of a backend `encode` call
pub type EncodedBytes = Vec<u8>;

/// A decoded image as produced by a backend
///
/// The pixel layout is backend-defined; the pipeline only reads the
/// dimensions and hands the value back to the same backend for encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Source width in pixels
    pub width: u32,

    /// Source height in pixels
    pub height: u32,

    /// Backend-specific pixel storage
    pub pixels: Arc<[u8]>,
}

impl RawImage {
    /// Create a decoded image from backend pixel storage
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// An image that carries dimensions but no pixel data
    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(width, height, Vec::new())
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

/// Decode/encode backend consumed by the pipeline and the capability prober
#[async_trait]
pub trait CodecBackend: Send + Sync {
    /// Fetch the raw source for `reference` and decode it
    async fn fetch_and_decode(&self, reference: &str) -> Result<RawImage, CodecError>;

    /// Decode an in-memory payload known to be in `format`
    ///
    /// Used by the capability prober with embedded sample assets.
    async fn decode(&self, bytes: &[u8], format: ResolvedFormat) -> Result<RawImage, CodecError>;

    /// Resize `image` to `width`x`height` and encode it
    ///
    /// `quality` is a fraction in `0.0..=1.0`.
    async fn encode(
        &self,
        image: &RawImage,
        width: u32,
        height: u32,
        format: ResolvedFormat,
        quality: f32,
    ) -> Result<EncodedBytes, CodecError>;
}
