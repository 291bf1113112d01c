//! Error types for asset resolution
//!
//! This module defines the error taxonomy for the imgcache library. Backend
//! failures are reported as [`CodecError`] and surfaced to renderers wrapped
//! in [`AssetError::AssetUnavailable`], which keeps the original cause.

use crate::format::ResolvedFormat;
use thiserror::Error;

/// Errors raised by a codec backend
///
/// `Clone` so one failure can be handed to every caller waiting on the same
/// in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The raw source could not be fetched
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// The raw source was fetched but could not be decoded
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    /// Re-encoding into the target format failed
    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    /// The backend cannot produce this format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(ResolvedFormat),

    /// A backend call did not finish within the configured limit (ms)
    #[error("Timed out after {0}ms")]
    Timeout(u64),
}

/// Main error type for asset operations
#[derive(Error, Debug, Clone)]
pub enum AssetError {
    /// The asset could not be produced; the only error a renderer must handle
    #[error("Asset unavailable: {reference}: {source}")]
    AssetUnavailable {
        reference: String,
        #[source]
        source: CodecError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl AssetError {
    /// Wrap a backend failure for the given reference
    pub fn unavailable(reference: impl Into<String>, source: CodecError) -> Self {
        AssetError::AssetUnavailable {
            reference: reference.into(),
            source,
        }
    }

    /// The backend cause, when this error came from the codec backend
    pub fn codec_cause(&self) -> Option<&CodecError> {
        match self {
            AssetError::AssetUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether a renderer should switch to its fallback presentation
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AssetError::AssetUnavailable { .. })
    }
}

/// Result type alias for asset operations
pub type Result<T> = std::result::Result<T, AssetError>;

impl From<String> for AssetError {
    fn from(s: String) -> Self {
        AssetError::Other(s)
    }
}

impl From<&str> for AssetError {
    fn from(s: &str) -> Self {
        AssetError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let error = AssetError::unavailable(
            "img/a.png",
            CodecError::FetchFailed("connection reset".to_string()),
        );
        assert_eq!(
            error.to_string(),
            "Asset unavailable: img/a.png: Fetch failed: connection reset"
        );

        let timeout = AssetError::unavailable("img/b.png", CodecError::Timeout(1500));
        assert_eq!(
            timeout.to_string(),
            "Asset unavailable: img/b.png: Timed out after 1500ms"
        );

        let unsupported = CodecError::UnsupportedFormat(ResolvedFormat::Avif);
        assert_eq!(unsupported.to_string(), "Unsupported format: avif");
    }

    #[test]
    fn test_unavailable_keeps_cause() {
        let error = AssetError::unavailable(
            "img/a.png",
            CodecError::EncodeFailed("no surface".to_string()),
        );

        assert!(error.is_unavailable());
        assert_eq!(
            error.codec_cause(),
            Some(&CodecError::EncodeFailed("no surface".to_string()))
        );
        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "Encode failed: no surface");
    }

    #[test]
    fn test_error_conversion() {
        let error: AssetError = "test error".into();
        assert!(matches!(error, AssetError::Other(_)));
        assert!(!error.is_unavailable());

        let error: AssetError = "test error".to_string().into();
        assert!(matches!(error, AssetError::Other(_)));
    }
}
