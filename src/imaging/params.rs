//! Parameter types shared by the decode, draw, and encode stages.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0.0–1.0, default 0.85). Clamped on construction.
//! - [`OutputFormat`]: The two output encodings: WebP (modern) and JPEG (universal fallback).
//!
//! The quality-search constants live here too so the encoder, the HEIC
//! normalizer and the tests agree on them.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Lowest quality the budget search will encode at.
pub const QUALITY_FLOOR: Quality = Quality(0.5);

/// Amount the budget search lowers quality by on each retry.
pub const QUALITY_STEP: f32 = 0.1;

/// Quality for the intermediate JPEG produced from HEIC input.
///
/// Kept above the final encode quality: a second lossy pass follows.
pub const CONVERSION_QUALITY: Quality = Quality(0.92);

/// Largest side libwebp will encode. Larger surfaces are written as JPEG.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

/// Quality setting for lossy image encoding (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub f32);

impl Quality {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality as the 1–100 integer scale encoders take.
    pub fn percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }

    /// Clamp into `[QUALITY_FLOOR, 1.0]`, the range the budget search works in.
    pub fn at_least_floor(self) -> Self {
        Self(self.0.max(QUALITY_FLOOR.0).min(1.0))
    }

    /// One search step down, never below the floor.
    pub fn step_down(self) -> Self {
        Self((self.0 - QUALITY_STEP).max(QUALITY_FLOOR.0))
    }

    /// Tolerates the drift left by repeated `f32` subtraction.
    pub fn is_at_floor(self) -> bool {
        self.0 - QUALITY_FLOOR.0 < 1e-4
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.85)
    }
}

/// Output encoding.
///
/// `Webp` is the modern format and is only emitted when the backend can
/// actually produce it; `Jpeg` is assumed to work everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "modern")]
    #[value(alias = "modern")]
    Webp,
    #[serde(alias = "legacy", alias = "jpg")]
    #[value(alias = "legacy", alias = "jpg")]
    Jpeg,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }
}
