//! # pixel-budget
//!
//! Adaptive image transcoding for uploads: take a user-selected photo in
//! whatever format the device produced, and return an encoded image that fits
//! a pixel bounding box and a byte budget.
//!
//! # Architecture: One Pipeline Per File
//!
//! ```text
//! SourceAsset ─┬─ HEIC? ── convert to JPEG (q0.92)
//!              ▼
//!          decode (bitmap from memory, or via a file handle)
//!              ▼
//!          fit_within(max_width, max_height) → draw
//!              ▼
//!          encode at q, q-0.1, … until ≤ target or q = 0.5
//!              ▼
//!          EncodedResult
//! ```
//!
//! Each call is independent. The pixel work lives behind the
//! [`imaging::ImageBackend`] trait so the strategy selection, timeouts and
//! quality search can be tested against a recording mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`compress`] | [`compress::Compressor`], the pipeline orchestrator |
//! | [`imaging`] | Decode strategies, resize math, budget encoder, HEIC normalizer, capability probe |
//! | [`asset`] | [`asset::SourceAsset`] input and [`asset::EncodedResult`] output |
//! | [`error`] | [`error::CompressError`], one variant per failure class |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`units`] | Byte/megabyte conversion and size-related messages |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Quality Floor Over Hard Failure
//!
//! The quality search stops at 0.5 even if the output is still over budget
//! and returns that output. Callers that need a strict guarantee compare
//! [`asset::EncodedResult::byte_len`] against their limit; the CLI flags
//! outputs above the upload ceiling.
//!
//! ## Probing Instead of Trusting
//!
//! Whether WebP is really produced is decided by encoding a 1×1 surface and
//! sniffing the bytes, not by a compile-time flag. A backend that silently
//! substitutes JPEG is detected the same way as one that was built without
//! WebP support.
//!
//! ## One Retry
//!
//! A failed in-memory decode is retried once through a file handle. Nothing
//! else is retried: every other failure reaches the caller as a typed error.

pub mod asset;
pub mod compress;
pub mod config;
pub mod error;
pub mod imaging;
pub mod output;
pub mod units;

#[cfg(test)]
pub(crate) mod test_helpers;
