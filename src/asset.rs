//! Input and output types of the pipeline.
//!
//! A [`SourceAsset`] is read-only to the pipeline: normalizing HEIC input
//! produces a new asset rather than mutating the caller's. An
//! [`EncodedResult`] is handed back by value and the pipeline keeps nothing.

use crate::imaging::{OutputFormat, Quality};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::path::Path;
use std::time::SystemTime;

/// Declared MIME type for common image extensions.
///
/// Used when an asset is read from disk and nothing else declares a type.
const EXTENSION_MIME: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
];

/// Look up the MIME type for a file extension (case-insensitive).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    EXTENSION_MIME
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
}

/// A user-supplied file: raw bytes plus what the picker claimed about them.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    /// Raw file contents. Cheap to clone.
    pub bytes: Bytes,
    /// Declared MIME type. May be empty or wrong.
    pub mime_type: String,
    /// Original file name, extension included.
    pub file_name: String,
}

impl SourceAsset {
    pub fn new(
        bytes: impl Into<Bytes>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Read an asset from disk, declaring the MIME type from its extension.
    ///
    /// Unknown extensions get an empty type, like a picker that could not tell.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for_extension)
            .unwrap_or("");
        Ok(Self::new(bytes, mime_type, file_name))
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Replace the extension of `file_name` with `extension`.
///
/// ```
/// # use pixel_budget::asset::replace_extension;
/// assert_eq!(replace_extension("IMG_0001.HEIC", "webp"), "IMG_0001.webp");
/// assert_eq!(replace_extension("scan", "jpg"), "scan.jpg");
/// ```
pub fn replace_extension(file_name: &str, extension: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!("{stem}.{extension}")
}

/// Final output of one pipeline run.
#[derive(Debug, Clone)]
pub struct EncodedResult {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub mime_type: &'static str,
    pub extension: &'static str,
    /// Original name with the extension swapped for the output format's.
    pub file_name: String,
    /// Quality of the encode that was kept.
    pub quality: Quality,
    pub width: u32,
    pub height: u32,
    /// Size of the asset that was handed to the pipeline.
    pub original_size: u64,
    /// When the result was produced, not when the source was modified.
    pub last_modified: SystemTime,
    /// Number of encodes the quality search ran.
    pub attempts: u32,
}

impl EncodedResult {
    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn size_mb(&self) -> f64 {
        crate::units::bytes_to_mb(self.byte_len())
    }

    /// Output size as a fraction of the input size.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 1.0;
        }
        self.byte_len() as f64 / self.original_size as f64
    }

    pub fn fits_upload(&self, limit_bytes: u64) -> bool {
        self.byte_len() <= limit_bytes
    }

    /// Self-contained preview reference for display.
    pub fn to_data_uri(&self) -> String {
        data_uri(self.mime_type, &self.bytes)
    }
}

/// Render bytes as a `data:` URI with the given media type.
pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_lookup_is_case_insensitive() {
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("HeIc"), Some("image/heic"));
        assert_eq!(mime_for_extension("txt"), None);
    }

    #[test]
    fn from_path_declares_type_from_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("IMG_0001.HEIC");
        std::fs::write(&path, b"not really heic").unwrap();

        let asset = SourceAsset::from_path(&path).unwrap();
        assert_eq!(asset.file_name, "IMG_0001.HEIC");
        assert_eq!(asset.mime_type, "image/heic");
        assert_eq!(asset.byte_len(), 15);
        assert_eq!(asset.extension().as_deref(), Some("heic"));
    }

    #[test]
    fn from_path_unknown_extension_has_empty_type() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.raw");
        std::fs::write(&path, b"x").unwrap();

        let asset = SourceAsset::from_path(&path).unwrap();
        assert_eq!(asset.mime_type, "");
    }

    #[test]
    fn replace_extension_handles_odd_names() {
        assert_eq!(replace_extension("photo.jpeg", "webp"), "photo.webp");
        assert_eq!(replace_extension("archive.tar.gz", "jpg"), "archive.tar.jpg");
        assert_eq!(replace_extension("", "jpg"), "image.jpg");
        assert_eq!(replace_extension(".hidden", "jpg"), ".hidden.jpg");
    }

    #[test]
    fn data_uri_prefix() {
        assert_eq!(data_uri("image/webp", b"abc"), "data:image/webp;base64,YWJj");
    }

    #[test]
    fn result_size_helpers() {
        let result = EncodedResult {
            bytes: vec![0; 1024],
            format: OutputFormat::Jpeg,
            mime_type: "image/jpeg",
            extension: "jpg",
            file_name: "a.jpg".into(),
            quality: Quality::default(),
            width: 1,
            height: 1,
            original_size: 4096,
            last_modified: SystemTime::now(),
            attempts: 1,
        };
        assert_eq!(result.compression_ratio(), 0.25);
        assert!(result.fits_upload(1024));
        assert!(!result.fits_upload(1023));
        assert!(result.to_data_uri().starts_with("data:image/jpeg;base64,"));
    }
}
