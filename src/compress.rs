//! The compression pipeline.
//!
//! [`Compressor::compress`] takes one [`SourceAsset`] through every stage and
//! returns an [`EncodedResult`] or a typed [`CompressError`]:
//!
//! ```text
//! environment → size ceiling → format check → HEIC normalize
//!   → decode (bitmap, else handle) → fit → format negotiation → draw → encode
//! ```
//!
//! Calls are independent. The only state shared between them is the capability
//! probe result and the lazily loaded HEIC converter, both write-once caches.
//! There is no internal queue: callers decide how many files to run at once.

use crate::asset::{EncodedResult, SourceAsset};
use crate::config::{CompressionOptions, PipelineConfig};
use crate::error::CompressError;
use crate::imaging::{
    CapabilityProbe, DecodeSettings, DecodeStrategy, DecodedBitmap, EncodeRequest, ImageBackend,
    LegacyFormatNormalizer, OutputFormat, RasterSurface, WEBP_MAX_DIMENSION, decode,
    encode_within_budget, fit_within, is_legacy_format, select_strategy,
};
use crate::units::{mb_to_bytes, size_advisory};
use std::sync::Arc;

pub struct Compressor<B: ImageBackend> {
    backend: Arc<B>,
    config: PipelineConfig,
    settings: DecodeSettings,
    normalizer: Arc<LegacyFormatNormalizer>,
    probe: CapabilityProbe,
}

impl<B: ImageBackend> Compressor<B> {
    /// Compressor with stock limits and the process-wide HEIC converter.
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_config(backend, PipelineConfig::default())
    }

    pub fn with_config(backend: Arc<B>, config: PipelineConfig) -> Self {
        Self {
            backend,
            settings: DecodeSettings::from_config(&config),
            config,
            normalizer: LegacyFormatNormalizer::shared(),
            probe: CapabilityProbe::new(),
        }
    }

    /// Swap in a different HEIC normalizer.
    pub fn with_normalizer(mut self, normalizer: Arc<LegacyFormatNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether WebP output is actually produced. Probed once, then cached.
    pub async fn supports_modern_format(&self) -> bool {
        self.probe.supports_modern_format(&self.backend).await
    }

    /// Whether HEIC input can be converted.
    pub fn supports_heic(&self) -> bool {
        self.normalizer.is_available()
    }

    /// The format `requested` resolves to for a `width` × `height` output on
    /// this backend.
    pub async fn negotiate_format(
        &self,
        requested: OutputFormat,
        (width, height): (u32, u32),
    ) -> OutputFormat {
        match requested {
            OutputFormat::Jpeg => OutputFormat::Jpeg,
            OutputFormat::Webp if width.max(height) > WEBP_MAX_DIMENSION => {
                log::debug!(
                    "{}x{} exceeds the WebP limit of {} px, using JPEG",
                    width,
                    height,
                    WEBP_MAX_DIMENSION
                );
                OutputFormat::Jpeg
            }
            OutputFormat::Webp => {
                if self.supports_modern_format().await {
                    return OutputFormat::Webp;
                }
                log::debug!("WebP not supported by the encoder, using JPEG");
                OutputFormat::Jpeg
            }
        }
    }

    /// Warning to show before compressing an input of `size` bytes, if any.
    pub fn size_advisory(&self, size: u64) -> Option<String> {
        size_advisory(size, self.settings.recommended_input)
    }

    /// Run the full pipeline on `asset`.
    pub async fn compress(
        &self,
        asset: SourceAsset,
        options: &CompressionOptions,
    ) -> Result<EncodedResult, CompressError> {
        self.check_environment()?;
        self.check_size(&asset)?;
        check_format(&asset)?;

        if let Some(advisory) = self.size_advisory(asset.byte_len()) {
            log::warn!("{}: {}", asset.file_name, advisory);
        }

        let original_size = asset.byte_len();
        let original_name = asset.file_name.clone();
        let asset = if is_legacy_format(&asset) {
            self.normalizer.normalize(&asset).await?
        } else {
            asset
        };

        let bitmap = self.load_bitmap(&asset).await?;

        let (width, height) = fit_within(
            bitmap.dimensions(),
            (options.max_width, options.max_height),
        );
        log::debug!(
            "{}: {}x{} -> {}x{}",
            original_name,
            bitmap.width(),
            bitmap.height(),
            width,
            height
        );
        let format = self.negotiate_format(options.format, (width, height)).await;
        let surface = self.draw(bitmap, width, height).await?;

        let request = EncodeRequest {
            format,
            initial_quality: options.quality,
            target_bytes: mb_to_bytes(options.target_size_mb),
            file_name: original_name,
            original_size,
        };
        let result = encode_within_budget(&self.backend, surface, &request).await?;

        log::info!(
            "{}: {}x{} {} at q{} ({} attempt(s), {} -> {} bytes)",
            result.file_name,
            result.width,
            result.height,
            result.extension,
            result.quality.percent(),
            result.attempts,
            result.original_size,
            result.byte_len()
        );
        Ok(result)
    }

    fn check_environment(&self) -> Result<(), CompressError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CompressError::UnsupportedEnvironment(
                "no async runtime to run decode and encode work on".into(),
            ));
        }
        if !self.backend.is_available() {
            return Err(CompressError::UnsupportedEnvironment(
                "image backend cannot draw or encode".into(),
            ));
        }
        Ok(())
    }

    fn check_size(&self, asset: &SourceAsset) -> Result<(), CompressError> {
        let limit = mb_to_bytes(self.config.limits.input_ceiling_mb);
        if asset.byte_len() > limit {
            return Err(CompressError::InputTooLarge {
                size: asset.byte_len(),
                limit,
            });
        }
        Ok(())
    }

    /// Decode with the selected strategy, retrying once with a file handle
    /// when an in-memory decode fails.
    async fn load_bitmap(&self, asset: &SourceAsset) -> Result<DecodedBitmap, CompressError> {
        let strategy = select_strategy(
            asset.byte_len(),
            self.backend.supports_bitmap_decode(),
            self.settings.bitmap_threshold,
        );
        log::debug!("{}: using {}", asset.file_name, strategy);

        match decode::decode_asset(&self.backend, asset, strategy, &self.settings).await {
            Err(e @ (CompressError::ImageLoadFailed { .. } | CompressError::ImageLoadTimeout { .. }))
                if strategy == DecodeStrategy::Bitmap =>
            {
                log::warn!(
                    "{}: {} failed ({}), retrying with {}",
                    asset.file_name,
                    DecodeStrategy::Bitmap,
                    e,
                    DecodeStrategy::Handle
                );
                decode::decode_asset(&self.backend, asset, DecodeStrategy::Handle, &self.settings)
                    .await
            }
            other => other,
        }
    }

    async fn draw(
        &self,
        bitmap: DecodedBitmap,
        width: u32,
        height: u32,
    ) -> Result<RasterSurface, CompressError> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.draw(bitmap, width, height))
            .await
            .map_err(|e| CompressError::EncodeFailed(format!("draw worker stopped: {e}")))?
            .map_err(|e| CompressError::EncodeFailed(format!("draw failed: {e}")))
    }
}

/// Accept declared `image/*` types, HEIC by type or suffix, or bytes that
/// sniff as an image.
fn check_format(asset: &SourceAsset) -> Result<(), CompressError> {
    let declared = asset.mime_type.trim().to_ascii_lowercase();
    if declared.starts_with("image/") || is_legacy_format(asset) || infer::is_image(&asset.bytes)
    {
        return Ok(());
    }
    Err(CompressError::UnsupportedFormat {
        file_name: asset.file_name.clone(),
        mime_type: asset.mime_type.clone(),
    })
}
