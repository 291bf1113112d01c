//! Shared test doubles

#![allow(dead_code)]

use async_trait::async_trait;
use imgcache::codec::{CodecBackend, EncodedBytes, RawImage};
use imgcache::error::CodecError;
use imgcache::format::ResolvedFormat;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Parameters of one `encode` call
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeCall {
    pub width: u32,
    pub height: u32,
    pub format: ResolvedFormat,
    pub quality: f32,
}

/// Backend that serves sources from a table and counts every call
///
/// The probe samples decode only for WebP, so probing settles on WebP.
pub struct CountingBackend {
    sources: HashMap<String, (u32, u32)>,
    fetch_delay: Duration,
    failures_left: AtomicUsize,
    pub fetches: AtomicUsize,
    pub probe_decodes: AtomicUsize,
    pub encodes: Mutex<Vec<EncodeCall>>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            fetch_delay: Duration::ZERO,
            failures_left: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            probe_decodes: AtomicUsize::new(0),
            encodes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_source(mut self, reference: &str, width: u32, height: u32) -> Self {
        self.sources.insert(reference.to_string(), (width, height));
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Fail the next `count` fetches regardless of reference
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn encode_calls(&self) -> Vec<EncodeCall> {
        self.encodes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodecBackend for CountingBackend {
    async fn fetch_and_decode(&self, reference: &str) -> Result<RawImage, CodecError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CodecError::FetchFailed(format!("network error for {}", reference)));
        }

        match self.sources.get(reference) {
            Some((w, h)) => Ok(RawImage::empty(*w, *h)),
            None => Err(CodecError::FetchFailed(format!("404 {}", reference))),
        }
    }

    async fn decode(&self, _bytes: &[u8], format: ResolvedFormat) -> Result<RawImage, CodecError> {
        self.probe_decodes.fetch_add(1, Ordering::SeqCst);
        match format {
            ResolvedFormat::Webp => Ok(RawImage::empty(1, 1)),
            other => Err(CodecError::UnsupportedFormat(other)),
        }
    }

    async fn encode(
        &self,
        _image: &RawImage,
        width: u32,
        height: u32,
        format: ResolvedFormat,
        quality: f32,
    ) -> Result<EncodedBytes, CodecError> {
        self.encodes.lock().unwrap().push(EncodeCall {
            width,
            height,
            format,
            quality,
        });
        if format == ResolvedFormat::Avif {
            return Err(CodecError::UnsupportedFormat(format));
        }
        Ok(vec![0u8; 16])
    }
}
