//! In-process codec backend built on the `image` crate
//!
//! Sources are loaded through a [`SourceLoader`] so transport stays
//! swappable; [`FsSourceLoader`] reads them from a directory. Decode and
//! encode run on the blocking pool.

use crate::codec::{CodecBackend, EncodedBytes, RawImage};
use crate::error::CodecError;
use crate::format::ResolvedFormat;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Fetches the raw bytes behind a reference
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Load the undecoded source for `reference`
    async fn load(&self, reference: &str) -> Result<Vec<u8>, CodecError>;
}

/// Loads sources from files under a root directory
#[derive(Debug, Clone)]
pub struct FsSourceLoader {
    root: PathBuf,
}

impl FsSourceLoader {
    /// Create a loader rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a reference onto a path below the root
    ///
    /// Query strings and fragments are ignored. References that try to
    /// leave the root are rejected.
    pub fn resolve_path(&self, reference: &str) -> Result<PathBuf, CodecError> {
        let path_part = reference
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or("")
            .trim_start_matches('/');

        if path_part.is_empty() {
            return Err(CodecError::FetchFailed(format!(
                "empty reference: {:?}",
                reference
            )));
        }

        let relative = Path::new(path_part);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(CodecError::FetchFailed(format!(
                "reference escapes source root: {}",
                reference
            )));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SourceLoader for FsSourceLoader {
    async fn load(&self, reference: &str) -> Result<Vec<u8>, CodecError> {
        let path = self.resolve_path(reference)?;
        debug!("Loading source {} from {}", reference, path.display());

        tokio::fs::read(&path)
            .await
            .map_err(|e| CodecError::FetchFailed(format!("{}: {}", path.display(), e)))
    }
}

/// Codec backend over the `image` crate
///
/// Decodes anything the enabled `image` features understand and encodes
/// JPEG (quality honoured) and lossless WebP. AVIF is reported as
/// unsupported in both directions.
pub struct ImageCodec {
    loader: Arc<dyn SourceLoader>,
    filter: FilterType,
}

impl ImageCodec {
    /// Create a codec that reads sources with `loader`
    pub fn new(loader: Arc<dyn SourceLoader>) -> Self {
        Self {
            loader,
            filter: FilterType::Lanczos3,
        }
    }

    /// Create a codec reading sources from a directory
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FsSourceLoader::new(root)))
    }

    /// Override the resampling filter (default: Lanczos3)
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

fn image_format(format: ResolvedFormat) -> Result<ImageFormat, CodecError> {
    match format {
        ResolvedFormat::Webp => Ok(ImageFormat::WebP),
        ResolvedFormat::Jpeg => Ok(ImageFormat::Jpeg),
        ResolvedFormat::Avif => Err(CodecError::UnsupportedFormat(format)),
    }
}

fn to_raw(image: DynamicImage) -> RawImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    RawImage::new(width, height, rgba.into_raw())
}

fn decode_bytes(bytes: &[u8], format: Option<ImageFormat>) -> Result<RawImage, CodecError> {
    let decoded = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    };
    decoded
        .map(to_raw)
        .map_err(|e| CodecError::DecodeFailed(e.to_string()))
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn encode_rgba(
    source: RgbaImage,
    width: u32,
    height: u32,
    format: ResolvedFormat,
    quality: f32,
    filter: FilterType,
) -> Result<EncodedBytes, CodecError> {
    let resized = if source.dimensions() == (width, height) {
        source
    } else {
        imageops::resize(&source, width, height, filter)
    };

    let mut out = Vec::new();
    match format {
        ResolvedFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(resized).to_rgb8();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        }
        ResolvedFormat::Webp => {
            WebPEncoder::new_lossless(&mut out)
                .write_image(resized.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
        }
        ResolvedFormat::Avif => return Err(CodecError::UnsupportedFormat(format)),
    }
    Ok(out)
}

#[async_trait]
impl CodecBackend for ImageCodec {
    async fn fetch_and_decode(&self, reference: &str) -> Result<RawImage, CodecError> {
        let bytes = self.loader.load(reference).await?;

        tokio::task::spawn_blocking(move || decode_bytes(&bytes, None))
            .await
            .map_err(|e| CodecError::DecodeFailed(e.to_string()))?
    }

    async fn decode(&self, bytes: &[u8], format: ResolvedFormat) -> Result<RawImage, CodecError> {
        let format = image_format(format)?;
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || decode_bytes(&bytes, Some(format)))
            .await
            .map_err(|e| CodecError::DecodeFailed(e.to_string()))?
    }

    async fn encode(
        &self,
        image: &RawImage,
        width: u32,
        height: u32,
        format: ResolvedFormat,
        quality: f32,
    ) -> Result<EncodedBytes, CodecError> {
        image_format(format)?;
        if width == 0 || height == 0 {
            return Err(CodecError::EncodeFailed(format!(
                "empty target {}x{}",
                width, height
            )));
        }

        let source = RgbaImage::from_raw(image.width, image.height, image.pixels.to_vec())
            .ok_or_else(|| {
                CodecError::EncodeFailed("pixel buffer does not match dimensions".to_string())
            })?;
        let filter = self.filter;

        tokio::task::spawn_blocking(move || {
            encode_rgba(source, width, height, format, quality, filter)
        })
        .await
        .map_err(|e| CodecError::EncodeFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_resolve_path_rejects_escape() {
        let loader = FsSourceLoader::new("/srv/assets");

        assert_eq!(
            loader.resolve_path("/img/a.png?v=3").unwrap(),
            PathBuf::from("/srv/assets/img/a.png")
        );
        assert!(loader.resolve_path("../etc/passwd").is_err());
        assert!(loader.resolve_path("img/../../x.png").is_err());
        assert!(loader.resolve_path("").is_err());
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(jpeg_quality(0.8), 80);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(1.5), 100);
    }

    #[tokio::test]
    async fn test_fetch_decode_and_encode_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "wide.png", 40, 20);

        let codec = ImageCodec::from_dir(dir.path());
        let raw = codec.fetch_and_decode("wide.png").await.unwrap();
        assert_eq!(raw.dimensions(), (40, 20));

        let bytes = codec
            .encode(&raw, 10, 5, ResolvedFormat::Jpeg, 0.8)
            .await
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = codec.decode(&bytes, ResolvedFormat::Jpeg).await.unwrap();
        assert_eq!(decoded.dimensions(), (10, 5));
    }

    #[tokio::test]
    async fn test_encode_webp() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "square.png", 8, 8);

        let codec = ImageCodec::from_dir(dir.path());
        let raw = codec.fetch_and_decode("square.png").await.unwrap();
        let bytes = codec
            .encode(&raw, 4, 4, ResolvedFormat::Webp, 0.8)
            .await
            .unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[tokio::test]
    async fn test_missing_source_is_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let codec = ImageCodec::from_dir(dir.path());

        let err = codec.fetch_and_decode("missing.png").await.unwrap_err();
        assert!(matches!(err, CodecError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn test_avif_is_unsupported() {
        let codec = ImageCodec::from_dir(".");
        let raw = RawImage::new(1, 1, vec![0u8; 4]);

        let err = codec
            .encode(&raw, 1, 1, ResolvedFormat::Avif, 0.8)
            .await
            .unwrap_err();
        assert_eq!(err, CodecError::UnsupportedFormat(ResolvedFormat::Avif));

        let err = codec.decode(&[0u8; 4], ResolvedFormat::Avif).await.unwrap_err();
        assert_eq!(err, CodecError::UnsupportedFormat(ResolvedFormat::Avif));
    }

    #[tokio::test]
    async fn test_mismatched_pixels_fail_encode() {
        let codec = ImageCodec::from_dir(".");
        let raw = RawImage::empty(4, 4);

        let err = codec
            .encode(&raw, 2, 2, ResolvedFormat::Jpeg, 0.8)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::EncodeFailed(_)));
    }
}
