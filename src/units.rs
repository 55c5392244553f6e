//! Byte/megabyte conversions and the human-readable messages built from them.
//!
//! One megabyte is 1024 × 1024 bytes throughout the crate, matching how the
//! budgets in `config.toml` are written and how file managers report sizes.
//!
//! Everything here is pure so the wording can be unit tested without an image.

/// Bytes in one megabyte.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Convert a byte count to megabytes.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}

/// Convert megabytes to a byte count, rounding down.
///
/// Negative and non-finite inputs collapse to zero.
pub fn mb_to_bytes(mb: f64) -> u64 {
    if !mb.is_finite() || mb <= 0.0 {
        return 0;
    }
    (mb * BYTES_PER_MB as f64) as u64
}

/// Format a byte count as `"12.34 MB"`.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes_to_mb(bytes))
}

/// Message for a decode that failed outright.
///
/// Files above the recommended size most likely failed because of their size;
/// smaller ones most likely because the format is not decodable.
pub fn load_failure_message(size: u64, mime_type: &str, recommended_bytes: u64) -> String {
    if size > recommended_bytes {
        format!(
            "could not load the image ({}); the file is likely too large, try a photo under {}",
            format_mb(size),
            format_mb(recommended_bytes)
        )
    } else {
        format!(
            "could not load the image; the format ({}) may not be supported",
            display_mime(mime_type)
        )
    }
}

/// Warning shown before compression starts for inputs above the recommended size.
///
/// Returns `None` when the file is within the recommendation.
pub fn size_advisory(size: u64, recommended_bytes: u64) -> Option<String> {
    if size > recommended_bytes {
        Some(format!(
            "large file ({}, recommended under {}); compression may take a while",
            format_mb(size),
            format_mb(recommended_bytes)
        ))
    } else {
        None
    }
}

/// Message for an input rejected by the hard ceiling.
pub fn too_large_message(size: u64, limit: u64) -> String {
    format!(
        "file is {} which exceeds the {} limit",
        format_mb(size),
        format_mb(limit)
    )
}

/// Declared MIME types are often empty on phones; say so instead of printing `""`.
pub fn display_mime(mime_type: &str) -> &str {
    if mime_type.trim().is_empty() {
        "unknown type"
    } else {
        mime_type
    }
}
