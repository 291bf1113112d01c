//! Capability probing for next-generation encodings
//!
//! Each candidate format is tested by decoding a tiny embedded sample through
//! the codec backend and checking the decoded dimensions. The first format
//! that passes wins; `Jpeg` is the unconditional fallback. The outcome is
//! computed once per prober and shared by every caller.

use crate::codec::CodecBackend;
use crate::format::ResolvedFormat;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A known-good sample payload for one format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSample {
    /// Format the payload is encoded in
    pub format: ResolvedFormat,

    /// Base64 encoded payload
    pub payload: &'static str,

    /// Width a correct decoder reports
    pub width: u32,

    /// Height a correct decoder reports
    pub height: u32,
}

/// 2x2 AVIF still image
pub const AVIF_SAMPLE: ProbeSample = ProbeSample {
    format: ResolvedFormat::Avif,
    payload: "AAAAIGZ0eXBhdmlmAAAAAGF2aWZtaWYxbWlhZk1BMUIAAADybWV0YQAAAAAAAAAoaGRscgAAAAAAAAAAcGljdAAAAAAAAAAAAAAAAGxpYmF2aWYAAAAADnBpdG0AAAAAAAEAAAAeaWxvYwAAAABEAAABAAEAAAABAAABGgAAAB0AAAAoaWluZgAAAAAAAQAAABppbmZlAgAAAAABAABhdjAxQ29sb3IAAAAAamlwcnAAAABLaXBjbwAAABRpc3BlAAAAAAAAAAIAAAACAAAAEHBpeGkAAAAAAwgICAAAAAxhdjFDgQ0MAAAAABNjb2xybmNseAACAAIAAYAAAAAXaXBtYQAAAAAAAAABAAEEAQKDBAAAACVtZGF0EgAKCBgANogQEAwgMg8f8D///8WfhwB8+ErK42A=",
    width: 2,
    height: 2,
};

/// 1x1 lossless WebP
pub const WEBP_SAMPLE: ProbeSample = ProbeSample {
    format: ResolvedFormat::Webp,
    payload: "UklGRhoAAABXRUJQVlA4TA0AAAAvAAAAEAcQERGIiP4HAA==",
    width: 1,
    height: 1,
};

/// Why a probe did not confirm support. Never leaves this module.
#[derive(Debug)]
enum ProbeInconclusive {
    BadSample(String),
    DecodeError(String),
    DimensionMismatch { expected: (u32, u32), actual: (u32, u32) },
}

impl std::fmt::Display for ProbeInconclusive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeInconclusive::BadSample(e) => write!(f, "sample payload invalid: {}", e),
            ProbeInconclusive::DecodeError(e) => write!(f, "decode failed: {}", e),
            ProbeInconclusive::DimensionMismatch { expected, actual } => write!(
                f,
                "decoded {}x{}, expected {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

/// Memoized detector for the best encoding the environment can render
pub struct CapabilityProber {
    backend: Arc<dyn CodecBackend>,
    samples: Vec<ProbeSample>,
    resolved: OnceCell<ResolvedFormat>,
}

impl CapabilityProber {
    /// Create a prober using the embedded AVIF and WebP samples
    pub fn new(backend: Arc<dyn CodecBackend>) -> Self {
        Self::with_samples(backend, vec![AVIF_SAMPLE, WEBP_SAMPLE])
    }

    /// Create a prober with custom samples, tried in the given order
    ///
    /// Samples for formats that are always supported are dropped.
    pub fn with_samples(backend: Arc<dyn CodecBackend>, samples: Vec<ProbeSample>) -> Self {
        let samples = samples
            .into_iter()
            .filter(|sample| sample.format.needs_support_check())
            .collect();
        Self {
            backend,
            samples,
            resolved: OnceCell::new(),
        }
    }

    /// Best supported format, probing on first use
    ///
    /// Concurrent callers that arrive before the first probe settles all
    /// wait for that one probe.
    pub async fn determine_format(&self) -> ResolvedFormat {
        *self.resolved.get_or_init(|| self.run_probes()).await
    }

    /// The memoized format, if probing already finished
    pub fn resolved(&self) -> Option<ResolvedFormat> {
        self.resolved.get().copied()
    }

    async fn run_probes(&self) -> ResolvedFormat {
        for sample in &self.samples {
            match self.probe(sample).await {
                Ok(()) => {
                    info!("Capability probe selected {}", sample.format);
                    return sample.format;
                }
                Err(reason) => {
                    debug!("Format {} unsupported: {}", sample.format, reason);
                }
            }
        }

        info!("No next-generation format decodable, falling back to jpeg");
        ResolvedFormat::Jpeg
    }

    async fn probe(&self, sample: &ProbeSample) -> Result<(), ProbeInconclusive> {
        let bytes = STANDARD
            .decode(sample.payload)
            .map_err(|e| ProbeInconclusive::BadSample(e.to_string()))?;

        let image = self
            .backend
            .decode(&bytes, sample.format)
            .await
            .map_err(|e| ProbeInconclusive::DecodeError(e.to_string()))?;

        let expected = (sample.width, sample.height);
        if image.dimensions() != expected {
            return Err(ProbeInconclusive::DimensionMismatch {
                expected,
                actual: image.dimensions(),
            });
        }

        Ok(())
    }
}
