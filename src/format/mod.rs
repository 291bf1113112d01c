//! Output encodings and runtime capability probing

pub mod probe;

pub use probe::{CapabilityProber, ProbeSample};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding chosen for a resolved resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedFormat {
    /// Next-generation lossy codec, tried first
    Avif,
    /// Next-generation lossy codec, tried second
    Webp,
    /// Baseline codec every environment can render
    Jpeg,
}

impl ResolvedFormat {
    /// Probe order, most preferred first. `Jpeg` is never probed.
    pub const PREFERENCE: [ResolvedFormat; 3] =
        [ResolvedFormat::Avif, ResolvedFormat::Webp, ResolvedFormat::Jpeg];

    /// MIME type for HTTP responses and `<source type>`
    pub fn mime_type(&self) -> &'static str {
        match self {
            ResolvedFormat::Avif => "image/avif",
            ResolvedFormat::Webp => "image/webp",
            ResolvedFormat::Jpeg => "image/jpeg",
        }
    }

    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ResolvedFormat::Avif => "avif",
            ResolvedFormat::Webp => "webp",
            ResolvedFormat::Jpeg => "jpg",
        }
    }

    /// Whether support must be confirmed at runtime before use
    ///
    /// JPEG is the universal fallback and is never checked.
    pub fn needs_support_check(&self) -> bool {
        !matches!(self, ResolvedFormat::Jpeg)
    }
}

impl fmt::Display for ResolvedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedFormat::Avif => write!(f, "avif"),
            ResolvedFormat::Webp => write!(f, "webp"),
            ResolvedFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

impl FromStr for ResolvedFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avif" | "image/avif" => Ok(ResolvedFormat::Avif),
            "webp" | "image/webp" => Ok(ResolvedFormat::Webp),
            "jpeg" | "jpg" | "image/jpeg" => Ok(ResolvedFormat::Jpeg),
            other => Err(format!("unknown image format: {}", other)),
        }
    }
}
