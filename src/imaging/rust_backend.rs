//! Production backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode from a file handle | `image::ImageReader::open` + format sniffing |
//! | Decode from memory | `image::ImageReader` over a `Cursor`, with `image::Limits` |
//! | Draw / resize | `image::imageops::resize` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → WebP (lossy) | `webp::Encoder` (libwebp), behind the `webp` feature |
//!
//! Built without the `webp` feature the backend answers WebP requests with
//! JPEG, the same way a canvas that cannot encode WebP does. The capability
//! probe notices and the pipeline switches to JPEG output.

use super::backend::{BackendError, ImageBackend};
use super::params::{OutputFormat, Quality};
use super::surface::{DecodedBitmap, RasterSurface};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, Limits};
use std::io::Cursor;
use std::path::Path;

/// Backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(e: image::ImageError) -> BackendError {
    match e {
        image::ImageError::Limits(l) => BackendError::Limits(l.to_string()),
        image::ImageError::IoError(io) => BackendError::Io(io),
        other => BackendError::Decode(other.to_string()),
    }
}

fn encode_jpeg(surface: &RasterSurface, quality: Quality) -> Result<Vec<u8>, BackendError> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(surface.pixels().clone()).to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.percent())
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {}", e)))?;
    Ok(buf)
}

#[cfg(feature = "webp")]
fn encode_webp(surface: &RasterSurface, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let pixels = surface.pixels();
    let encoder = webp::Encoder::from_rgba(pixels.as_raw(), pixels.width(), pixels.height());
    let mut config = webp::WebPConfig::new()
        .map_err(|_| BackendError::Encode("failed to create WebPConfig".into()))?;
    config.quality = quality.percent() as f32;
    let encoded = encoder
        .encode_advanced(&config)
        .map_err(|e| BackendError::Encode(format!("WebP encode failed: {e:?}")))?;
    Ok(encoded.to_vec())
}

#[cfg(not(feature = "webp"))]
fn encode_webp(surface: &RasterSurface, quality: Quality) -> Result<Vec<u8>, BackendError> {
    encode_jpeg(surface, quality)
}

impl ImageBackend for RustBackend {
    fn supports_bitmap_decode(&self) -> bool {
        true
    }

    fn decode_file(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(decode_error)
    }

    fn decode_bitmap(&self, bytes: &[u8], max_alloc: u64) -> Result<DynamicImage, BackendError> {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let mut limits = Limits::default();
        limits.max_alloc = Some(max_alloc);
        reader.limits(limits);
        reader.decode().map_err(decode_error)
    }

    fn draw(
        &self,
        bitmap: DecodedBitmap,
        width: u32,
        height: u32,
    ) -> Result<RasterSurface, BackendError> {
        let image = bitmap.into_image();
        let rgba = image.into_rgba8();
        if rgba.dimensions() == (width, height) {
            return Ok(RasterSurface::new(rgba));
        }
        let resized = image::imageops::resize(&rgba, width, height, FilterType::Lanczos3);
        Ok(RasterSurface::new(resized))
    }

    fn encode(
        &self,
        surface: &RasterSurface,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        match format {
            OutputFormat::Jpeg => encode_jpeg(surface, quality),
            OutputFormat::Webp => encode_webp(surface, quality),
        }
    }
}
