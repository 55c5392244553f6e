//! HEIC/HEIF input normalization.
//!
//! Phones often hand over HEIC photos with an empty or generic MIME type, so
//! detection checks the declared type *or* the file suffix. Detected assets
//! are converted to an intermediate JPEG at [`CONVERSION_QUALITY`] before the
//! regular pipeline sees them.
//!
//! The conversion backend is loaded on first use and cached for the life of
//! the process. A failed load is not cached; the next asset retries it.

use super::params::{CONVERSION_QUALITY, Quality};
use crate::asset::{SourceAsset, replace_extension};
use crate::error::CompressError;
use once_cell::sync::OnceCell;
use std::sync::{Arc, LazyLock};

const HEIC_MIME_TYPES: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
];

const HEIC_SUFFIXES: &[&str] = &[".heic", ".heif"];

/// Whether `asset` is a HEIC/HEIF container.
pub fn is_legacy_format(asset: &SourceAsset) -> bool {
    let mime = asset.mime_type.trim().to_ascii_lowercase();
    if HEIC_MIME_TYPES.contains(&mime.as_str()) {
        return true;
    }
    let name = asset.file_name.to_ascii_lowercase();
    HEIC_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Something that turns HEIC bytes into JPEG images.
///
/// Containers can hold several images (bursts, live photos); implementations
/// return them in container order.
pub trait HeicConverter: Send + Sync {
    fn convert(&self, bytes: &[u8], quality: Quality) -> Result<Vec<Vec<u8>>, String>;
}

type ConverterLoader = Box<dyn Fn() -> Result<Arc<dyn HeicConverter>, String> + Send + Sync>;

static SHARED: LazyLock<Arc<LegacyFormatNormalizer>> =
    LazyLock::new(|| Arc::new(LegacyFormatNormalizer::new(load_default_converter)));

pub struct LegacyFormatNormalizer {
    loader: ConverterLoader,
    converter: OnceCell<Arc<dyn HeicConverter>>,
}

impl LegacyFormatNormalizer {
    pub fn new(
        loader: impl Fn() -> Result<Arc<dyn HeicConverter>, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            loader: Box::new(loader),
            converter: OnceCell::new(),
        }
    }

    /// Process-wide normalizer backed by the compiled-in converter.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Whether a converter can be loaded. Loads it if needed.
    pub fn is_available(&self) -> bool {
        self.converter().is_ok()
    }

    fn converter(&self) -> Result<&Arc<dyn HeicConverter>, CompressError> {
        self.converter
            .get_or_try_init(|| {
                log::debug!("loading HEIC conversion backend");
                (self.loader)()
            })
            .map_err(CompressError::ConversionUnavailable)
    }

    /// Convert `asset` into a new JPEG asset named `<stem>.jpg`.
    pub async fn normalize(&self, asset: &SourceAsset) -> Result<SourceAsset, CompressError> {
        let converter = Arc::clone(self.converter()?);
        let bytes = asset.bytes.clone();

        let results =
            tokio::task::spawn_blocking(move || converter.convert(&bytes, CONVERSION_QUALITY))
                .await
                .map_err(|e| CompressError::ConversionFailed(format!("converter stopped: {e}")))?
                .map_err(CompressError::ConversionFailed)?;

        let count = results.len();
        let Some(first) = results.into_iter().next() else {
            return Err(CompressError::ConversionFailed(
                "converter returned no images".into(),
            ));
        };
        if count > 1 {
            log::debug!(
                "{} holds {} images; using the first",
                asset.file_name,
                count
            );
        }

        match infer::get(&first) {
            Some(kind) if kind.mime_type() == "image/jpeg" => {}
            other => {
                return Err(CompressError::ConversionFailed(format!(
                    "converter returned {} instead of a JPEG image",
                    other.map_or("unrecognised data", |k| k.mime_type())
                )));
            }
        }

        log::info!(
            "converted {} to JPEG ({} bytes)",
            asset.file_name,
            first.len()
        );
        Ok(SourceAsset::new(
            first,
            "image/jpeg",
            replace_extension(&asset.file_name, "jpg"),
        ))
    }
}

#[cfg(feature = "heic")]
fn load_default_converter() -> Result<Arc<dyn HeicConverter>, String> {
    Ok(Arc::new(libheif::LibheifConverter))
}

#[cfg(not(feature = "heic"))]
fn load_default_converter() -> Result<Arc<dyn HeicConverter>, String> {
    Err("built without the `heic` feature".into())
}

#[cfg(feature = "heic")]
mod libheif {
    use super::HeicConverter;
    use crate::imaging::params::Quality;
    use image::ExtendedColorType;
    use image::ImageEncoder;
    use image::codecs::jpeg::JpegEncoder;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    /// libheif decode of the primary image, re-encoded with the `image` JPEG encoder.
    pub struct LibheifConverter;

    impl HeicConverter for LibheifConverter {
        fn convert(&self, bytes: &[u8], quality: Quality) -> Result<Vec<Vec<u8>>, String> {
            let lib_heif = LibHeif::new();
            let ctx = HeifContext::read_from_bytes(bytes).map_err(|e| e.to_string())?;
            let handle = ctx.primary_image_handle().map_err(|e| e.to_string())?;
            let width = handle.width();
            let height = handle.height();
            let image = lib_heif
                .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
                .map_err(|e| e.to_string())?;

            let planes = image.planes();
            let interleaved = planes
                .interleaved
                .ok_or_else(|| "no interleaved RGB plane".to_string())?;

            let row_len = width as usize * 3;
            let mut rgb = Vec::with_capacity(row_len * height as usize);
            for row in interleaved.data.chunks(interleaved.stride).take(height as usize) {
                rgb.extend_from_slice(&row[..row_len]);
            }

            let mut jpeg = Vec::new();
            JpegEncoder::new_with_quality(&mut jpeg, quality.percent())
                .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
                .map_err(|e| e.to_string())?;
            Ok(vec![jpeg])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::fake_encoded;
    use crate::imaging::params::OutputFormat;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedConverter {
        results: Vec<Vec<u8>>,
        qualities: Mutex<Vec<u8>>,
    }

    impl HeicConverter for FixedConverter {
        fn convert(&self, _bytes: &[u8], quality: Quality) -> Result<Vec<Vec<u8>>, String> {
            self.qualities.lock().unwrap().push(quality.percent());
            Ok(self.results.clone())
        }
    }

    struct FailingConverter;

    impl HeicConverter for FailingConverter {
        fn convert(&self, _bytes: &[u8], _quality: Quality) -> Result<Vec<Vec<u8>>, String> {
            Err("corrupt container".into())
        }
    }

    fn normalizer_with(results: Vec<Vec<u8>>) -> (LegacyFormatNormalizer, Arc<FixedConverter>) {
        let converter = Arc::new(FixedConverter {
            results,
            qualities: Mutex::new(Vec::new()),
        });
        let shared = Arc::clone(&converter);
        let normalizer = LegacyFormatNormalizer::new(move || {
            Ok(Arc::clone(&shared) as Arc<dyn HeicConverter>)
        });
        (normalizer, converter)
    }

    fn heic_asset() -> SourceAsset {
        SourceAsset::new(b"ftypheic".to_vec(), "", "IMG_0001.HEIC")
    }

    #[test]
    fn detects_by_mime_or_suffix() {
        assert!(is_legacy_format(&SourceAsset::new(vec![], "image/heic", "photo")));
        assert!(is_legacy_format(&SourceAsset::new(vec![], "IMAGE/HEIF-SEQUENCE", "x.bin")));
        assert!(is_legacy_format(&SourceAsset::new(vec![], "", "IMG_0001.HEIC")));
        assert!(is_legacy_format(&SourceAsset::new(
            vec![],
            "application/octet-stream",
            "burst.heif"
        )));
        assert!(!is_legacy_format(&SourceAsset::new(vec![], "image/jpeg", "IMG_0001.jpg")));
        assert!(!is_legacy_format(&SourceAsset::new(vec![], "", "heic.png")));
    }

    #[tokio::test]
    async fn converts_to_jpeg_asset_at_conversion_quality() {
        let (normalizer, converter) =
            normalizer_with(vec![fake_encoded(OutputFormat::Jpeg, 2048)]);

        let original = heic_asset();
        let converted = normalizer.normalize(&original).await.unwrap();

        assert_eq!(converted.mime_type, "image/jpeg");
        assert_eq!(converted.file_name, "IMG_0001.jpg");
        assert_eq!(converted.byte_len(), 2048);
        assert_eq!(*converter.qualities.lock().unwrap(), vec![92]);
        assert_eq!(original.file_name, "IMG_0001.HEIC");
    }

    #[tokio::test]
    async fn uses_first_of_several_results() {
        let (normalizer, _) = normalizer_with(vec![
            fake_encoded(OutputFormat::Jpeg, 100),
            fake_encoded(OutputFormat::Jpeg, 200),
        ]);
        let converted = normalizer.normalize(&heic_asset()).await.unwrap();
        assert_eq!(converted.byte_len(), 100);
    }

    #[tokio::test]
    async fn non_jpeg_result_is_conversion_failure() {
        let (normalizer, _) = normalizer_with(vec![b"plain text, not an image".to_vec()]);
        let err = normalizer.normalize(&heic_asset()).await.unwrap_err();
        assert!(matches!(err, CompressError::ConversionFailed(_)));

        let (normalizer, _) = normalizer_with(vec![fake_encoded(OutputFormat::Webp, 100)]);
        let err = normalizer.normalize(&heic_asset()).await.unwrap_err();
        assert!(matches!(err, CompressError::ConversionFailed(_)));
    }

    #[tokio::test]
    async fn empty_result_list_is_conversion_failure() {
        let (normalizer, _) = normalizer_with(vec![]);
        let err = normalizer.normalize(&heic_asset()).await.unwrap_err();
        assert!(matches!(err, CompressError::ConversionFailed(_)));
    }

    #[tokio::test]
    async fn converter_error_is_conversion_failure() {
        let normalizer =
            LegacyFormatNormalizer::new(|| Ok(Arc::new(FailingConverter) as Arc<dyn HeicConverter>));
        let err = normalizer.normalize(&heic_asset()).await.unwrap_err();
        assert!(matches!(err, CompressError::ConversionFailed(msg) if msg == "corrupt container"));
    }

    #[tokio::test]
    async fn failed_load_is_retried_successful_load_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let normalizer = LegacyFormatNormalizer::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("backend not ready".into());
            }
            Ok(Arc::new(FixedConverter {
                results: vec![fake_encoded(OutputFormat::Jpeg, 64)],
                qualities: Mutex::new(Vec::new()),
            }) as Arc<dyn HeicConverter>)
        });

        let err = normalizer.normalize(&heic_asset()).await.unwrap_err();
        assert!(matches!(err, CompressError::ConversionUnavailable(_)));

        normalizer.normalize(&heic_asset()).await.unwrap();
        normalizer.normalize(&heic_asset()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Encode a `width` × `height` gradient as HEIC, or `None` when this
    /// libheif has no HEVC encoder.
    #[cfg(feature = "heic")]
    fn encode_heic(width: u32, height: u32) -> Option<Vec<u8>> {
        use libheif_rs::{
            Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
            RgbChroma,
        };

        let lib_heif = LibHeif::new();
        let Ok(mut encoder) = lib_heif.encoder_for_format(CompressionFormat::Hevc) else {
            eprintln!("libheif has no HEVC encoder, skipping");
            return None;
        };
        encoder.set_quality(EncoderQuality::Lossy(90)).unwrap();

        let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).unwrap();
        image
            .create_plane(Channel::Interleaved, width, height, 8)
            .unwrap();
        let planes = image.planes_mut();
        let plane = planes.interleaved.unwrap();
        for y in 0..height as usize {
            for x in 0..width as usize {
                let at = y * plane.stride + x * 3;
                plane.data[at..at + 3].copy_from_slice(&[(x * 7) as u8, (y * 11) as u8, 128]);
            }
        }

        let mut context = HeifContext::new().unwrap();
        context.encode_image(&image, &mut encoder, None).unwrap();
        Some(context.write_to_bytes().unwrap())
    }

    #[cfg(feature = "heic")]
    #[test]
    fn libheif_converts_primary_image_to_jpeg() {
        let Some(heic) = encode_heic(33, 20) else {
            return;
        };

        let results = libheif::LibheifConverter
            .convert(&heic, CONVERSION_QUALITY)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(infer::get(&results[0]).unwrap().mime_type(), "image/jpeg");
        let decoded = image::load_from_memory(&results[0]).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (33, 20));
    }

    #[cfg(feature = "heic")]
    #[test]
    fn libheif_rejects_garbage() {
        let result = libheif::LibheifConverter.convert(b"not a heif container", CONVERSION_QUALITY);
        assert!(result.is_err());
    }

    #[cfg(not(feature = "heic"))]
    #[test]
    fn default_loader_without_feature_is_unavailable() {
        let normalizer = LegacyFormatNormalizer::new(load_default_converter);
        assert!(!normalizer.is_available());
    }
}
