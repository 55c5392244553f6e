//! Shared test utilities for the pixel-budget test suite.
//!
//! Synthetic image builders (so no binary fixtures are checked in) and
//! shorthand constructors for assets and compressors.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let asset = jpeg_asset("photo.jpg", 400, 300);
//! let (compressor, backend) = mock_compressor(MockBackend::new());
//! let result = compressor.compress(asset, &CompressionOptions::default()).await?;
//! assert_eq!(backend.encode_qualities(), vec![85]);
//! ```

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use crate::asset::SourceAsset;
use crate::compress::Compressor;
use crate::config::PipelineConfig;
use crate::imaging::backend::tests::MockBackend;

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// A valid JPEG of the given size with a colour gradient.
pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A valid PNG of the given size with a colour gradient.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

// =========================================================================
// Assets
// =========================================================================

pub fn jpeg_asset(file_name: &str, width: u32, height: u32) -> SourceAsset {
    SourceAsset::new(gradient_jpeg(width, height), "image/jpeg", file_name)
}

pub fn png_asset(file_name: &str, width: u32, height: u32) -> SourceAsset {
    SourceAsset::new(gradient_png(width, height), "image/png", file_name)
}

/// An asset of `len` zero bytes that claims to be a JPEG.
///
/// Only useful with [`MockBackend`], which never looks at the bytes.
pub fn opaque_asset(file_name: &str, len: usize) -> SourceAsset {
    SourceAsset::new(vec![0u8; len], "image/jpeg", file_name)
}

// =========================================================================
// Compressors
// =========================================================================

/// Compressor over a mock backend with stock config, plus a handle to the mock.
pub fn mock_compressor(backend: MockBackend) -> (Compressor<MockBackend>, Arc<MockBackend>) {
    mock_compressor_with(backend, PipelineConfig::default())
}

pub fn mock_compressor_with(
    backend: MockBackend,
    config: PipelineConfig,
) -> (Compressor<MockBackend>, Arc<MockBackend>) {
    let backend = Arc::new(backend);
    let compressor = Compressor::with_config(Arc::clone(&backend), config);
    (compressor, backend)
}
