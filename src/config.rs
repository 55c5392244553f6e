//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by the user's file, which only needs the keys it changes.
//!
//! ## Config File Location
//!
//! `pixel-budget` reads `config.toml` from the working directory, or the file
//! given with `--config`. Command-line flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! max_width = 1920          # Output bounding box, in pixels
//! max_height = 1920
//! quality = 0.85            # Starting encode quality (0.0-1.0)
//! target_size_mb = 3.5      # Byte budget for the output
//! format = "webp"           # "webp" (modern) or "jpeg" (legacy)
//!
//! [limits]
//! input_ceiling_mb = 50.0   # Larger inputs are rejected before decoding
//! max_upload_mb = 4.0       # Upload payload ceiling, checked by the CLI
//! recommended_input_mb = 10.0
//!
//! [decode]
//! timeout_ms = 60000
//! bitmap_threshold_mb = 5.0 # Inputs above this decode straight from memory
//! bitmap_max_alloc_mb = 512
//! # scratch_dir = "/tmp"    # Where handle-decode scratch files go
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Per-call compression options.
    pub compression: CompressionOptions,
    /// Size limits around the pipeline.
    pub limits: LimitsConfig,
    /// Decode strategy tunables.
    pub decode: DecodeConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compression.validate()?;

        let sizes = [
            ("limits.input_ceiling_mb", self.limits.input_ceiling_mb),
            ("limits.max_upload_mb", self.limits.max_upload_mb),
            ("limits.recommended_input_mb", self.limits.recommended_input_mb),
            ("decode.bitmap_threshold_mb", self.decode.bitmap_threshold_mb),
        ];
        for (key, value) in sizes {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a non-negative number"
                )));
            }
        }
        if self.limits.input_ceiling_mb == 0.0 {
            return Err(ConfigError::Validation(
                "limits.input_ceiling_mb must be greater than zero".into(),
            ));
        }
        if self.decode.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "decode.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.decode.bitmap_max_alloc_mb == 0 {
            return Err(ConfigError::Validation(
                "decode.bitmap_max_alloc_mb must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Options for one compression call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionOptions {
    /// Output width bound in pixels.
    pub max_width: u32,
    /// Output height bound in pixels.
    pub max_height: u32,
    /// Quality the budget search starts at.
    pub quality: Quality,
    /// Byte budget for the encoded output, in megabytes.
    pub target_size_mb: f64,
    /// Requested output format. WebP falls back to JPEG when unsupported.
    pub format: OutputFormat,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            quality: Quality::default(),
            target_size_mb: 3.5,
            format: OutputFormat::Webp,
        }
    }
}

impl CompressionOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ConfigError::Validation(
                "compression.max_width and max_height must be non-zero".into(),
            ));
        }
        let q = self.quality.value();
        if !(0.0..=1.0).contains(&q) {
            return Err(ConfigError::Validation(
                "compression.quality must be 0.0-1.0".into(),
            ));
        }
        if !self.target_size_mb.is_finite() || self.target_size_mb < 0.0 {
            return Err(ConfigError::Validation(
                "compression.target_size_mb must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

/// Size limits applied around the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Inputs above this are rejected with `InputTooLarge` before decoding.
    pub input_ceiling_mb: f64,
    /// Payload ceiling of the upload endpoint. Outputs above it are flagged.
    pub max_upload_mb: f64,
    /// Inputs above this get a size advisory and size-specific load errors.
    pub recommended_input_mb: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            input_ceiling_mb: 50.0,
            max_upload_mb: 4.0,
            recommended_input_mb: 10.0,
        }
    }
}

/// Decode strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeConfig {
    /// Per-decode timeout in milliseconds.
    pub timeout_ms: u64,
    /// Inputs larger than this decode from memory when the backend allows it.
    pub bitmap_threshold_mb: f64,
    /// Allocation cap for in-memory decodes, in megabytes.
    pub bitmap_max_alloc_mb: u64,
    /// Directory for handle-decode scratch files. System temp dir when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            bitmap_threshold_mb: 5.0,
            bitmap_max_alloc_mb: 512,
            scratch_dir: None,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; anything else in `overlay` replaces `base`.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `config.toml` from the given directory, falling back to defaults.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    let overlay = load_raw_config(&dir.join("config.toml"))?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Load an explicitly named config file. A missing file is an error.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(stock_defaults_value(), Some(overlay))
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixel-budget Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override these values.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Output bounding box in pixels. Images are scaled down to fit, never up.
max_width = 1920
max_height = 1920

# Encode quality the budget search starts at (0.0 = worst, 1.0 = best).
# Each retry lowers it by 0.1, down to 0.5.
quality = 0.85

# Byte budget for the encoded output, in megabytes (1 MB = 1024 * 1024 bytes).
target_size_mb = 3.5

# Output format: "webp" (alias "modern") or "jpeg" (alias "legacy").
# WebP falls back to JPEG when the encoder cannot produce it.
format = "webp"

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Inputs larger than this are rejected before any decoding.
input_ceiling_mb = 50.0

# Payload ceiling of the upload endpoint; larger outputs are flagged.
max_upload_mb = 4.0

# Inputs larger than this get a warning before compression starts.
recommended_input_mb = 10.0

# ---------------------------------------------------------------------------
# Decoding
# ---------------------------------------------------------------------------
[decode]
# Give up on a decode after this many milliseconds.
timeout_ms = 60000

# Inputs larger than this decode straight from memory with an allocation cap.
bitmap_threshold_mb = 5.0

# Allocation cap for in-memory decodes, in megabytes.
bitmap_max_alloc_mb = 512

# Directory for scratch files used by file-handle decodes.
# Omit to use the system temp directory.
# scratch_dir = "/tmp"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.compression.max_width, 1920);
        assert_eq!(config.compression.max_height, 1920);
        assert_eq!(config.compression.quality.percent(), 85);
        assert_eq!(config.compression.target_size_mb, 3.5);
        assert_eq!(config.compression.format, OutputFormat::Webp);
        assert_eq!(config.limits.input_ceiling_mb, 50.0);
        assert_eq!(config.limits.max_upload_mb, 4.0);
        assert_eq!(config.decode.timeout_ms, 60_000);
        assert!(config.decode.scratch_dir.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[compression]
format = "legacy"
"##;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.compression.format, OutputFormat::Jpeg);
        // Defaults preserved
        assert_eq!(config.compression.max_width, 1920);
        assert_eq!(config.limits.recommended_input_mb, 10.0);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.compression.target_size_mb, 3.5);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r##"
[compression]
max_width = 1280
quality = 0.7

[decode]
scratch_dir = "/var/tmp"
"##,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.compression.max_width, 1280);
        assert_eq!(config.compression.quality.percent(), 70);
        assert_eq!(config.decode.scratch_dir, Some(PathBuf::from("/var/tmp")));
        // Unspecified values should be defaults
        assert_eq!(config.compression.max_height, 1920);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "this is not valid toml [[[").unwrap();

        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_file_missing_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_file(&tmp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_file_reads_named_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("budget.toml");
        fs::write(&path, "[limits]\nmax_upload_mb = 2.0\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.limits.max_upload_mb, 2.0);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1").unwrap();
        let overlay: toml::Value = toml::from_str("a = 2").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn merge_toml_preserves_base_keys() {
        let base: toml::Value = toml::from_str(
            r#"
[compression]
max_width = 1920
max_height = 1920
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[compression]\nmax_width = 800").unwrap();

        let merged = merge_toml(base, overlay);
        let compression = merged.get("compression").unwrap();
        assert_eq!(compression.get("max_width").unwrap().as_integer(), Some(800));
        assert_eq!(compression.get("max_height").unwrap().as_integer(), Some(1920));
    }

    // =========================================================================
    // Unknown keys
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("unknown_key = 1");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("[compression]\nqualty = 0.9");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_format_rejected() {
        let result: Result<PipelineConfig, _> = toml::from_str("[compression]\nformat = \"avif\"");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_out_of_range() {
        let mut config = PipelineConfig::default();
        config.compression.quality = Quality(1.5);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_dimension() {
        let mut config = PipelineConfig::default();
        config.compression.max_height = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_negative_size() {
        let mut config = PipelineConfig::default();
        config.limits.max_upload_mb = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_target_is_allowed() {
        let mut config = PipelineConfig::default();
        config.compression.target_size_mb = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_zero_timeout() {
        let mut config = PipelineConfig::default();
        config.decode.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str("[compression]\nquality = 2.0").unwrap();
        let result = resolve_config(stock_defaults_value(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: PipelineConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(config.compression, defaults.compression);
        assert_eq!(config.limits.input_ceiling_mb, defaults.limits.input_ceiling_mb);
        assert_eq!(config.decode.timeout_ms, defaults.decode.timeout_ms);
        assert_eq!(
            config.decode.bitmap_max_alloc_mb,
            defaults.decode.bitmap_max_alloc_mb
        );
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("[compression]"));
        assert!(content.contains("[limits]"));
        assert!(content.contains("[decode]"));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        assert!(val.get("compression").is_some());
        assert!(val.get("limits").is_some());
        assert!(val.get("decode").is_some());
        assert!(val.get("decode").unwrap().get("scratch_dir").is_none());
    }
}
