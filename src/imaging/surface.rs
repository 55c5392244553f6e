//! Decoded bitmaps and the raster surface they are drawn onto.
//!
//! A [`DecodedBitmap`] is whatever a decode strategy produced. It is consumed
//! exactly once by [`ImageBackend::draw`](super::ImageBackend::draw), which
//! turns it into a [`RasterSurface`] of the final output size. Taking both by
//! value means the decoded pixels are released as soon as the surface exists,
//! on the error path as well as the success path.

use super::decode::DecodeStrategy;
use image::{DynamicImage, RgbaImage};

/// Pixels produced by one of the decode strategies.
pub struct DecodedBitmap {
    image: DynamicImage,
    strategy: DecodeStrategy,
}

impl DecodedBitmap {
    pub fn new(image: DynamicImage, strategy: DecodeStrategy) -> Self {
        Self { image, strategy }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Which strategy decoded this bitmap.
    pub fn strategy(&self) -> DecodeStrategy {
        self.strategy
    }

    /// Give up the pixels, ending the bitmap's lifetime.
    pub fn into_image(self) -> DynamicImage {
        log::debug!(
            "releasing {}x{} bitmap decoded via {}",
            self.width(),
            self.height(),
            self.strategy
        );
        self.image
    }
}

/// Fixed-size RGBA canvas holding the resized image, ready to encode.
#[derive(Clone)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Transparent surface of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
