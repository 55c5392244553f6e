//! Image processing: decode, resize, encode under a byte budget.
//!
//! | Stage | Module | Crate / function |
//! |---|---|---|
//! | **HEIC normalize** | [`heic`] | `libheif-rs` (feature `heic`) |
//! | **Decode** | [`decode`] | `image::ImageReader`, on the blocking pool with a timeout |
//! | **Fit** | [`calculations`] | pure dimension math |
//! | **Draw** | [`ImageBackend::draw`] | Lanczos3 resize into an RGBA surface |
//! | **Encode** | [`encoder`] | JPEG via `image`, WebP via `webp` (feature `webp`) |
//! | **Probe** | [`probe`] | 1×1 encode, sniffed with `infer` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Quality and output format
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Stages**: async functions that drive the backend on the blocking pool

pub mod backend;
mod calculations;
pub mod decode;
pub mod encoder;
pub mod heic;
mod params;
pub mod probe;
pub mod rust_backend;
mod surface;

pub use backend::{BackendError, ImageBackend};
pub use calculations::fit_within;
pub use decode::{DecodeSettings, DecodeStrategy, select_strategy};
pub use encoder::{EncodeRequest, encode_within_budget};
pub use heic::{HeicConverter, LegacyFormatNormalizer, is_legacy_format};
pub use params::{
    CONVERSION_QUALITY, OutputFormat, QUALITY_FLOOR, QUALITY_STEP, Quality, WEBP_MAX_DIMENSION,
};
pub use probe::CapabilityProbe;
pub use rust_backend::RustBackend;
pub use surface::{DecodedBitmap, RasterSurface};
