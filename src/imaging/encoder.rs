//! Quality search that fits an encoded surface into a byte budget.
//!
//! Starting at the requested quality (raised to the floor if below it), the
//! surface is encoded, measured, and re-encoded one step lower until either
//! the output fits or the floor is reached. Reaching the floor is not an
//! error: the floor-quality output is returned even if it is over budget.

use super::backend::ImageBackend;
use super::params::{OutputFormat, Quality};
use super::surface::RasterSurface;
use crate::asset::{EncodedResult, replace_extension};
use crate::error::CompressError;
use crate::units::format_mb;
use std::sync::Arc;
use std::time::SystemTime;

/// What the search needs besides the surface.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub format: OutputFormat,
    pub initial_quality: Quality,
    pub target_bytes: u64,
    /// Name of the asset being compressed; its extension is replaced.
    pub file_name: String,
    pub original_size: u64,
}

/// Encode `surface` at decreasing quality until it fits `request.target_bytes`.
pub async fn encode_within_budget<B: ImageBackend>(
    backend: &Arc<B>,
    surface: RasterSurface,
    request: &EncodeRequest,
) -> Result<EncodedResult, CompressError> {
    let surface = Arc::new(surface);
    let mut quality = request.initial_quality.at_least_floor();
    let mut attempts = 0u32;

    let bytes = loop {
        attempts += 1;
        let bytes = encode_once(backend, &surface, request.format, quality).await?;
        log::debug!(
            "attempt {}: {} at q{} -> {} (target {})",
            attempts,
            request.format.extension(),
            quality.percent(),
            format_mb(bytes.len() as u64),
            format_mb(request.target_bytes)
        );

        if bytes.len() as u64 <= request.target_bytes {
            break bytes;
        }
        if quality.is_at_floor() {
            log::info!(
                "{} still {} at minimum quality, over the {} target",
                request.file_name,
                format_mb(bytes.len() as u64),
                format_mb(request.target_bytes)
            );
            break bytes;
        }
        quality = quality.step_down();
    };

    Ok(EncodedResult {
        bytes,
        format: request.format,
        mime_type: request.format.mime_type(),
        extension: request.format.extension(),
        file_name: replace_extension(&request.file_name, request.format.extension()),
        quality,
        width: surface.width(),
        height: surface.height(),
        original_size: request.original_size,
        last_modified: SystemTime::now(),
        attempts,
    })
}

async fn encode_once<B: ImageBackend>(
    backend: &Arc<B>,
    surface: &Arc<RasterSurface>,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, CompressError> {
    let backend = Arc::clone(backend);
    let surface = Arc::clone(surface);
    let bytes = tokio::task::spawn_blocking(move || backend.encode(&surface, format, quality))
        .await
        .map_err(|e| CompressError::EncodeFailed(format!("encode worker stopped: {e}")))?
        .map_err(|e| CompressError::EncodeFailed(e.to_string()))?;

    if bytes.is_empty() {
        return Err(CompressError::EncodeFailed(format!(
            "{} encoder produced no data at q{}",
            format.extension(),
            quality.percent()
        )));
    }
    Ok(bytes)
}
