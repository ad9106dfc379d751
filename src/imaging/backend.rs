//! Image backend trait and the shared error taxonomy.
//!
//! The [`ImageBackend`] trait is the seam between the session (which owns
//! dimensions, validation and geometry) and an engine that carries out the
//! already-resolved operation. Two engines implement it:
//!
//! | Engine | Executes | State |
//! |---|---|---|
//! | [`RasterBackend`](super::raster_backend::RasterBackend) | immediately, on a decoded pixel buffer | working + pristine buffers |
//! | [`MagickBackend`](super::magick_backend::MagickBackend) | at save time, as one `convert` invocation | one pending command |
//!
//! Every shape-changing call returns the working size afterwards, which the
//! session records as its current width and height.

use super::calculations::{Rect, Size};
use super::identify::ImageInfo;
use super::params::{
    CanvasParams, FlipMode, ImageFormat, Quality, SaveParams, TextParams, ThumbParams,
    WatermarkParams,
};
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Invalid driver: {0}")]
    InvalidDriver(String),
    #[error("Failed to load {}: {reason}", path.display())]
    LoadFailure { path: PathBuf, reason: String },
    #[error("Load image first")]
    NotLoaded,
    #[error("Invalid {kind} value: {value}")]
    InvalidEnumValue { kind: &'static str, value: String },
    #[error("Save failed: {0}")]
    SaveFailure(String),
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    pub(crate) fn load(path: &Path, reason: impl Display) -> Self {
        ImageError::LoadFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_enum(kind: &'static str, value: impl Display) -> Self {
        ImageError::InvalidEnumValue {
            kind,
            value: value.to_string(),
        }
    }
}

/// Where a save landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// The file actually written.
    pub path: PathBuf,
    /// True when the session must re-point to `path` (the deferred engine
    /// continues from the written file, not the original source).
    pub rebase: bool,
}

/// Trait for image transformation engines.
///
/// Inputs are fully resolved by the session: sizes are final, regions are
/// clamped, positions are resolved. Implementations must not re-derive
/// geometry, so both engines stay in agreement.
pub trait ImageBackend {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Take ownership of a freshly probed image. Any previous state is gone.
    fn load(&mut self, info: &ImageInfo) -> Result<(), ImageError>;

    /// Return to the pristine state captured by the last [`load`](Self::load).
    fn reset(&mut self) -> Result<(), ImageError>;

    /// Drop everything held for the current image.
    fn release(&mut self);

    /// Scale to exactly `to`.
    fn resize(&mut self, to: Size) -> Result<Size, ImageError>;

    /// Keep only `region` (already clamped, never empty).
    fn crop(&mut self, region: Rect) -> Result<Size, ImageError>;

    fn flip(&mut self, mode: FlipMode) -> Result<Size, ImageError>;

    /// Rotate clockwise by `degrees`, growing to the rotated bounding box.
    fn rotate(&mut self, degrees: i32) -> Result<Size, ImageError>;

    fn grayscale(&mut self) -> Result<Size, ImageError>;

    fn watermark(&mut self, params: &WatermarkParams) -> Result<Size, ImageError>;

    fn text(&mut self, params: &TextParams<'_>) -> Result<Size, ImageError>;

    /// Cover the target, then crop the centered target region.
    fn adaptive_thumb(&mut self, params: &ThumbParams) -> Result<Size, ImageError>;

    /// Center shrunken content on a filled canvas.
    fn resize_canvas(&mut self, params: &CanvasParams) -> Result<Size, ImageError>;

    /// Persist the result.
    fn save(&mut self, params: &SaveParams) -> Result<SaveOutcome, ImageError>;

    /// Encode the result into `out`.
    fn encode(
        &self,
        out: &mut dyn Write,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<(), ImageError>;
}
