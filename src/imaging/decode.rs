//! The two decode strategies and the selector between them.
//!
//! | Strategy | How the bytes are reached | Where it decodes |
//! |---|---|---|
//! | [`DecodeStrategy::Handle`] | a scratch file holding a copy of the bytes | blocking pool, via [`ImageBackend::decode_file`] |
//! | [`DecodeStrategy::Bitmap`] | the shared in-memory buffer, allocation-limited | blocking pool, via [`ImageBackend::decode_bitmap`] |
//!
//! `Handle` works with every backend. `Bitmap` avoids the scratch copy and
//! caps peak allocation, which only pays off for large inputs, and is only
//! offered by backends that report [`ImageBackend::supports_bitmap_decode`].
//!
//! Both strategies are bounded by the decode timeout and reject bitmaps with
//! a zero dimension. The scratch file behind a `Handle` decode is released
//! exactly once on every exit path, including the timeout.

use super::backend::{BackendError, ImageBackend};
use super::surface::DecodedBitmap;
use crate::asset::{SourceAsset, mime_for_extension};
use crate::config::PipelineConfig;
use crate::error::CompressError;
use crate::units::{BYTES_PER_MB, load_failure_message, mb_to_bytes};
use image::DynamicImage;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Decode through a transient file handle. Always available.
    Handle,
    /// Decode directly from memory with allocation limits.
    Bitmap,
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStrategy::Handle => f.write_str("handle decode"),
            DecodeStrategy::Bitmap => f.write_str("bitmap decode"),
        }
    }
}

/// Decode tunables, resolved from [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct DecodeSettings {
    pub timeout: Duration,
    /// Inputs strictly larger than this use `Bitmap` when available.
    pub bitmap_threshold: u64,
    pub bitmap_max_alloc: u64,
    /// Above this, load failures are blamed on size rather than format.
    pub recommended_input: u64,
    /// Where `Handle` scratch files go; the system temp dir when `None`.
    pub scratch_dir: Option<PathBuf>,
}

impl DecodeSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.decode.timeout_ms),
            bitmap_threshold: mb_to_bytes(config.decode.bitmap_threshold_mb),
            bitmap_max_alloc: config.decode.bitmap_max_alloc_mb.saturating_mul(BYTES_PER_MB),
            recommended_input: mb_to_bytes(config.limits.recommended_input_mb),
            scratch_dir: config.decode.scratch_dir.clone(),
        }
    }
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Pick the strategy for an input of `byte_len` bytes.
pub fn select_strategy(byte_len: u64, bitmap_supported: bool, threshold: u64) -> DecodeStrategy {
    if bitmap_supported && byte_len > threshold {
        DecodeStrategy::Bitmap
    } else {
        DecodeStrategy::Handle
    }
}

/// Decode `asset` with the given strategy.
pub async fn decode_asset<B: ImageBackend>(
    backend: &Arc<B>,
    asset: &SourceAsset,
    strategy: DecodeStrategy,
    settings: &DecodeSettings,
) -> Result<DecodedBitmap, CompressError> {
    match strategy {
        DecodeStrategy::Handle => decode_via_handle(backend, asset, settings).await,
        DecodeStrategy::Bitmap => decode_via_bitmap(backend, asset, settings).await,
    }
}

async fn decode_via_handle<B: ImageBackend>(
    backend: &Arc<B>,
    asset: &SourceAsset,
    settings: &DecodeSettings,
) -> Result<DecodedBitmap, CompressError> {
    let mut handle = SourceHandle::create(asset, settings.scratch_dir.as_deref())
        .map_err(CompressError::DecodeHandleCreationFailed)?;
    log::debug!("created decode handle {}", handle.path.display());

    let backend = Arc::clone(backend);
    let path = handle.path.clone();
    let outcome = run_with_timeout(settings.timeout, move || backend.decode_file(&path)).await;

    handle.release();
    finish(outcome, asset, DecodeStrategy::Handle, settings)
}

async fn decode_via_bitmap<B: ImageBackend>(
    backend: &Arc<B>,
    asset: &SourceAsset,
    settings: &DecodeSettings,
) -> Result<DecodedBitmap, CompressError> {
    let backend = Arc::clone(backend);
    let bytes = asset.bytes.clone();
    let max_alloc = settings.bitmap_max_alloc;
    let outcome = run_with_timeout(settings.timeout, move || {
        backend.decode_bitmap(&bytes, max_alloc)
    })
    .await;

    finish(outcome, asset, DecodeStrategy::Bitmap, settings)
}

enum Outcome {
    Decoded(DynamicImage),
    Failed(BackendError),
    TimedOut,
}

/// Run `job` on the blocking pool, giving up after `timeout`.
///
/// A timed-out job keeps running to completion in the background; its result
/// is dropped.
async fn run_with_timeout<F>(timeout: Duration, job: F) -> Outcome
where
    F: FnOnce() -> Result<DynamicImage, BackendError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(job)).await {
        Err(_) => Outcome::TimedOut,
        Ok(Err(join)) => Outcome::Failed(BackendError::Decode(format!(
            "decode worker stopped: {join}"
        ))),
        Ok(Ok(Err(e))) => Outcome::Failed(e),
        Ok(Ok(Ok(image))) => Outcome::Decoded(image),
    }
}

fn finish(
    outcome: Outcome,
    asset: &SourceAsset,
    strategy: DecodeStrategy,
    settings: &DecodeSettings,
) -> Result<DecodedBitmap, CompressError> {
    match outcome {
        Outcome::Decoded(image) => {
            let bitmap = DecodedBitmap::new(image, strategy);
            validate_dimensions(bitmap.width(), bitmap.height())?;
            Ok(bitmap)
        }
        Outcome::Failed(e) => Err(CompressError::ImageLoadFailed {
            size: asset.byte_len(),
            mime_type: asset.mime_type.clone(),
            message: load_failure_message(
                asset.byte_len(),
                &asset.mime_type,
                settings.recommended_input,
            ),
            detail: format!("{strategy}: {e}"),
        }),
        Outcome::TimedOut => Err(CompressError::ImageLoadTimeout {
            size: asset.byte_len(),
            timeout: settings.timeout,
        }),
    }
}

/// Both sides must be at least one pixel.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), CompressError> {
    if width == 0 || height == 0 {
        return Err(CompressError::InvalidImageDimensions { width, height });
    }
    Ok(())
}

/// Scratch file holding a copy of the asset for a `Handle` decode.
///
/// [`release`](Self::release) deletes it; `Drop` does the same if the decode
/// future is abandoned before reaching the explicit release.
struct SourceHandle {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl SourceHandle {
    fn create(asset: &SourceAsset, scratch_dir: Option<&Path>) -> std::io::Result<Self> {
        let suffix = handle_suffix(asset);
        let mut builder = tempfile::Builder::new();
        builder.prefix("pixel-budget-").suffix(&suffix);
        let mut file = match scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(&asset.bytes)?;
        file.flush()?;

        let temp = file.into_temp_path();
        Ok(Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }

    fn release(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };
        match temp.close() {
            Ok(()) => log::debug!("released decode handle {}", self.path.display()),
            Err(e) => log::warn!(
                "failed to remove decode handle {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Extension for the scratch file so extension-based format detection agrees
/// with the declared type.
fn handle_suffix(asset: &SourceAsset) -> String {
    let from_mime = asset
        .mime_type
        .strip_prefix("image/")
        .map(|sub| match sub {
            "jpeg" => "jpg",
            other => other,
        })
        .filter(|ext| mime_for_extension(ext).is_some());

    from_mime
        .map(str::to_string)
        .or_else(|| asset.extension())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
