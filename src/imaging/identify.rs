//! Header inspection.
//!
//! Reads just enough of a file to learn its dimensions and codec, without
//! decoding pixels. Only GIF, JPEG and PNG are accepted; anything else,
//! including files that are not images at all, is a
//! [`LoadFailure`](ImageError::LoadFailure).

use super::backend::ImageError;
use super::calculations::Size;
use super::params::ImageFormat;
use image::ImageReader;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What the header of an image file says about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub path: PathBuf,
    #[serde(flatten)]
    pub size: Size,
    pub format: ImageFormat,
    pub mime_type: &'static str,
}

/// Probe `path` for size and format.
pub fn identify(path: &Path) -> Result<ImageInfo, ImageError> {
    let reader = ImageReader::open(path)
        .map_err(|e| ImageError::load(path, e))?
        .with_guessed_format()
        .map_err(|e| ImageError::load(path, e))?;

    let format = reader
        .format()
        .ok_or_else(|| ImageError::load(path, "not a recognized image"))?;
    let format = ImageFormat::from_codec(format)
        .ok_or_else(|| ImageError::load(path, format!("unsupported format {format:?}")))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ImageError::load(path, e))?;
    if width == 0 || height == 0 {
        return Err(ImageError::load(path, "image has no pixels"));
    }

    Ok(ImageInfo {
        path: path.to_path_buf(),
        size: Size::new(width, height),
        format,
        mime_type: format.mime_type(),
    })
}
