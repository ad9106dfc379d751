//! Handler configuration.
//!
//! Handles loading, validating, and merging TOML configuration. The file is
//! sparse: stock defaults form the base layer and the user file overrides
//! only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! engine = "raster"          # "raster" or "magick"
//!
//! [raster]
//! filter = "lanczos3"        # nearest | triangle | catmull-rom | gaussian | lanczos3
//!
//! [magick]
//! convert_path = "convert"   # ImageMagick convert binary
//!
//! [output]
//! jpeg_quality = 75          # Default JPEG quality (0-100)
//! ```
//!
//! Unknown keys are rejected to catch typos early. The engine name is checked
//! when the engine is built, and an unknown name is an
//! [`InvalidDriver`](crate::imaging::ImageError::InvalidDriver) error.

use image::imageops::FilterType;
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
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration for image sessions built by the CLI or by
/// [`ImageSession::from_config`](crate::imaging::ImageSession::from_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerConfig {
    /// Engine name: `raster` or `magick`.
    pub engine: String,
    /// Raster engine settings.
    pub raster: RasterConfig,
    /// Deferred engine settings.
    pub magick: MagickConfig,
    /// Output defaults.
    pub output: OutputConfig,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            engine: "raster".to_string(),
            raster: RasterConfig::default(),
            magick: MagickConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl HandlerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.jpeg_quality > 100 {
            return Err(ConfigError::Validation(
                "output.jpeg_quality must be 0-100".into(),
            ));
        }
        if self.magick.convert_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "magick.convert_path must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Resampling filter used by the raster engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterConfig {
    pub filter: ResizeFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MagickConfig {
    /// Path or bare name (looked up on `PATH`) of the `convert` binary.
    pub convert_path: PathBuf,
}

impl Default for MagickConfig {
    fn default() -> Self {
        Self {
            convert_path: PathBuf::from("convert"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Quality used when the caller does not pass one (0 = worst, 100 = best).
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { jpeg_quality: 75 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(HandlerConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
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

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<HandlerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: HandlerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<HandlerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    log::debug!("loaded config from {}", path.display());
    resolve_config(base, Some(overlay))
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Image Handler Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Engine used for transforms:
#   "raster" - in-memory pixel buffer, every call applied immediately
#   "magick" - ImageMagick `convert`, one command run at save time.
#              Only the LAST transform before a save is applied.
engine = "raster"

# ---------------------------------------------------------------------------
# Raster engine
# ---------------------------------------------------------------------------
[raster]
# Resampling filter for resize, thumbnails and watermarks.
# One of: nearest, triangle, catmull-rom, gaussian, lanczos3
filter = "lanczos3"

# ---------------------------------------------------------------------------
# Deferred (ImageMagick) engine
# ---------------------------------------------------------------------------
[magick]
# The convert binary: a bare name is looked up on PATH.
convert_path = "convert"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# JPEG quality when none is given on the command line (0 = worst, 100 = best).
jpeg_quality = 75
"##
}
