//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Compress
//!
//! ```text
//! 001 IMG_0001.HEIC → compressed/IMG_0001.webp
//!     4032x3024 → 1920x1440, q65 after 3 attempts
//!     12.00 MB → 3.10 MB (26%)
//! 002 notes.txt
//!     Error: Unsupported format: notes.txt (text/plain)
//! 003 locked.jpg
//!     Error: could not read file: permission denied
//!
//! Compressed 1 of 3 files, 2 failed
//! ```
//!
//! ## Probe
//!
//! ```text
//! WebP output: supported
//! HEIC input: unavailable
//! ```
//!
//! # Architecture
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects. `--json` output goes through
//! the serializable [`FileReport`] instead.

use crate::asset::EncodedResult;
use crate::error::CompressError;
use crate::units::format_mb;
use serde::Serialize;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Lines for one successfully compressed file.
pub fn format_result(
    index: usize,
    source_name: &str,
    source_dims: Option<(u32, u32)>,
    result: &EncodedResult,
    written_to: &Path,
    upload_limit: u64,
) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} → {}",
        format_index(index),
        source_name,
        written_to.display()
    )];

    let attempts = match result.attempts {
        1 => "first attempt".to_string(),
        n => format!("after {} attempts", n),
    };
    let dims = match source_dims {
        Some((w, h)) if (w, h) != (result.width, result.height) => {
            format!("{}x{} → {}x{}", w, h, result.width, result.height)
        }
        _ => format!("{}x{}", result.width, result.height),
    };
    lines.push(format!(
        "{}{}, q{} {}",
        indent(1),
        dims,
        result.quality.percent(),
        attempts
    ));
    lines.push(format!(
        "{}{} → {} ({:.0}%)",
        indent(1),
        format_mb(result.original_size),
        format_mb(result.byte_len()),
        result.compression_ratio() * 100.0
    ));
    if !result.fits_upload(upload_limit) {
        lines.push(format!(
            "{}Warning: exceeds the {} upload limit",
            indent(1),
            format_mb(upload_limit)
        ));
    }
    lines
}

/// Lines for one file that failed.
pub fn format_error(index: usize, source_name: &str, error: &CompressError) -> Vec<String> {
    let mut lines = vec![
        format!("{} {}", format_index(index), source_name),
        format!("{}Error: {}", indent(1), error),
    ];
    if let CompressError::ImageLoadFailed { detail, .. } = error {
        lines.push(format!("{}Detail: {}", indent(1), detail));
    }
    if error.is_input_problem() {
        lines.push(format!("{}Try a different file.", indent(1)));
    }
    lines
}

/// Lines for a file that could not be read from disk.
pub fn format_read_error(index: usize, source_name: &str, error: &std::io::Error) -> Vec<String> {
    vec![
        format!("{} {}", format_index(index), source_name),
        format!("{}Error: could not read file: {}", indent(1), error),
    ]
}

/// Closing summary line.
pub fn format_summary(succeeded: usize, failed: usize) -> String {
    let total = succeeded + failed;
    let noun = if total == 1 { "file" } else { "files" };
    if failed == 0 {
        format!("Compressed {} {}", succeeded, noun)
    } else {
        format!(
            "Compressed {} of {} {}, {} failed",
            succeeded, total, noun, failed
        )
    }
}

/// Lines for the `probe` command.
pub fn format_probe(modern_supported: bool, heic_available: bool) -> Vec<String> {
    let status = |ok: bool, yes: &'static str, no: &'static str| if ok { yes } else { no };
    vec![
        format!(
            "WebP output: {}",
            status(modern_supported, "supported", "unsupported (JPEG fallback)")
        ),
        format!(
            "HEIC input: {}",
            status(heic_available, "available", "unavailable")
        ),
    ]
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn print_probe(modern_supported: bool, heic_available: bool) {
    print_lines(&format_probe(modern_supported, heic_available));
}

/// One entry of `compress --json` output.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    pub original_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fits_upload: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn success(
        source: &Path,
        result: &EncodedResult,
        written_to: &Path,
        upload_limit: u64,
    ) -> Self {
        Self {
            source: source.display().to_string(),
            output: Some(written_to.display().to_string()),
            mime_type: Some(result.mime_type),
            width: Some(result.width),
            height: Some(result.height),
            quality: Some(result.quality.value()),
            attempts: Some(result.attempts),
            original_bytes: result.original_size,
            output_bytes: Some(result.byte_len()),
            output_mb: Some(result.size_mb()),
            fits_upload: Some(result.fits_upload(upload_limit)),
            error: None,
        }
    }

    pub fn failure(source: &Path, original_bytes: u64, error: &dyn std::fmt::Display) -> Self {
        Self {
            source: source.display().to_string(),
            output: None,
            mime_type: None,
            width: None,
            height: None,
            quality: None,
            attempts: None,
            original_bytes,
            output_bytes: None,
            output_mb: None,
            fits_upload: None,
            error: Some(error.to_string()),
        }
    }
}
