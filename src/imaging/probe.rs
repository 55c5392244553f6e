//! Detects whether the backend really produces the modern output format.
//!
//! Backends without WebP support substitute JPEG instead of failing, so the
//! probe looks at what comes out rather than at whether the call errored:
//! a 1×1 surface is encoded as WebP, rendered as a `data:` URI using the
//! media type sniffed from the bytes, and the URI prefix is checked.

use super::backend::ImageBackend;
use super::params::{OutputFormat, Quality};
use super::surface::RasterSurface;
use crate::asset::data_uri;
use std::sync::Arc;
use tokio::sync::OnceCell;

const MODERN_PREFIX: &str = "data:image/webp";

/// Probe result cache. One per compressor; the probe runs at most once.
#[derive(Debug, Default)]
pub struct CapabilityProbe {
    modern: OnceCell<bool>,
}

impl CapabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `backend` encodes [`OutputFormat::Webp`] as WebP.
    ///
    /// The probe encode runs on the blocking pool. A backend that panics
    /// there reads as unsupported.
    pub async fn supports_modern_format<B: ImageBackend>(&self, backend: &Arc<B>) -> bool {
        *self
            .modern
            .get_or_init(|| async {
                let backend = Arc::clone(backend);
                let supported = tokio::task::spawn_blocking(move || probe_modern_format(&*backend))
                    .await
                    .unwrap_or_else(|e| {
                        log::debug!("modern format probe stopped: {}", e);
                        false
                    });
                log::debug!("modern format probe: supported={}", supported);
                supported
            })
            .await
    }
}

/// Run the probe without caching.
///
/// Any failure reads as "unsupported": a missing capability must not abort
/// the pipeline.
pub fn probe_modern_format<B: ImageBackend + ?Sized>(backend: &B) -> bool {
    let surface = RasterSurface::blank(1, 1);
    let bytes = match backend.encode(&surface, OutputFormat::Webp, Quality::default()) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("modern format probe encode failed: {}", e);
            return false;
        }
    };
    let Some(kind) = infer::get(&bytes) else {
        return false;
    };
    data_uri(kind.mime_type(), &bytes).starts_with(MODERN_PREFIX)
}
