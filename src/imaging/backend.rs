//! Image processing backend trait and shared error type.
//!
//! The [`ImageBackend`] trait covers the pixel work of the pipeline: two ways
//! to decode, drawing a decoded bitmap onto a surface, and encoding a surface
//! at a given quality. Everything around it (strategy selection, timeouts,
//! handle lifetimes, the quality search) lives in the callers so it can be
//! tested against a mock.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::{OutputFormat, Quality};
use super::surface::{DecodedBitmap, RasterSurface};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Decoder limit exceeded: {0}")]
    Limits(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Trait for image processing backends.
///
/// Implementations are shared across the blocking worker pool, so they must
/// be `Send + Sync + 'static`.
pub trait ImageBackend: Send + Sync + 'static {
    /// Whether the backend can draw and encode at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether [`decode_bitmap`](Self::decode_bitmap) is usable.
    fn supports_bitmap_decode(&self) -> bool;

    /// Decode an image addressed by a file handle on disk.
    fn decode_file(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Decode straight from memory, refusing to allocate more than `max_alloc` bytes.
    fn decode_bitmap(&self, bytes: &[u8], max_alloc: u64) -> Result<DynamicImage, BackendError>;

    /// Draw `bitmap` onto a new surface of exactly `width` × `height`.
    fn draw(
        &self,
        bitmap: DecodedBitmap,
        width: u32,
        height: u32,
    ) -> Result<RasterSurface, BackendError>;

    /// Encode `surface` in `format` at `quality`.
    ///
    /// Backends that cannot produce `format` may return another format's
    /// bytes instead of failing; callers that care sniff the result.
    fn encode(
        &self,
        surface: &RasterSurface,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
