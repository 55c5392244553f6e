//! Errors surfaced by the compression pipeline.
//!
//! One variant per failure class a caller needs to tell apart. Each carries
//! enough context (file size, declared type) to build a user-facing message
//! without going back to the input.

use crate::units::{display_mime, format_mb, too_large_message};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("Unsupported format: {file_name} ({})", display_mime(.mime_type))]
    UnsupportedFormat { file_name: String, mime_type: String },

    #[error("Input too large: {}", too_large_message(*.size, *.limit))]
    InputTooLarge { size: u64, limit: u64 },

    #[error("HEIC conversion unavailable: {0}")]
    ConversionUnavailable(String),

    #[error("HEIC conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Image load timed out after {}s ({})", .timeout.as_secs(), format_mb(*.size))]
    ImageLoadTimeout { size: u64, timeout: Duration },

    #[error("Image load failed: {message}")]
    ImageLoadFailed {
        size: u64,
        mime_type: String,
        message: String,
        detail: String,
    },

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidImageDimensions { width: u32, height: u32 },

    #[error("Could not create decode handle: {0}")]
    DecodeHandleCreationFailed(#[source] std::io::Error),

    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

impl CompressError {
    /// Whether choosing a different file could help.
    ///
    /// Environment problems will fail the same way for every input.
    pub fn is_input_problem(&self) -> bool {
        !matches!(
            self,
            CompressError::UnsupportedEnvironment(_)
                | CompressError::ConversionUnavailable(_)
                | CompressError::DecodeHandleCreationFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::BYTES_PER_MB;

    #[test]
    fn too_large_display() {
        let err = CompressError::InputTooLarge {
            size: 60 * BYTES_PER_MB,
            limit: 50 * BYTES_PER_MB,
        };
        assert_eq!(
            err.to_string(),
            "Input too large: file is 60.00 MB which exceeds the 50.00 MB limit"
        );
    }

    #[test]
    fn unsupported_format_names_missing_mime() {
        let err = CompressError::UnsupportedFormat {
            file_name: "notes.txt".into(),
            mime_type: String::new(),
        };
        assert_eq!(err.to_string(), "Unsupported format: notes.txt (unknown type)");
    }

    #[test]
    fn timeout_display() {
        let err = CompressError::ImageLoadTimeout {
            size: 2 * BYTES_PER_MB,
            timeout: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "Image load timed out after 60s (2.00 MB)");
    }

    #[test]
    fn environment_errors_are_not_input_problems() {
        assert!(!CompressError::UnsupportedEnvironment("x".into()).is_input_problem());
        assert!(CompressError::EncodeFailed("x".into()).is_input_problem());
    }
}
