//! Font loading, text measurement and glyph rasterization.
//!
//! Fonts are parsed with `ab_glyph`; layout and rasterization go through
//! `imageproc::drawing`. The raster engine draws from the coverage mask, and
//! both engines place text using [`measure`].

use super::backend::ImageError;
use super::calculations::{Size, text_box};
use ab_glyph::{FontVec, PxScale};
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_text_mut, text_size};
use std::fmt;
use std::path::{Path, PathBuf};

/// A parsed TrueType/OpenType font and the file it came from.
pub struct Font {
    path: PathBuf,
    face: FontVec,
}

impl Font {
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let bytes = std::fs::read(path).map_err(|e| ImageError::load(path, e))?;
        let face = FontVec::try_from_vec(bytes).map_err(|e| ImageError::load(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            face,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font").field("path", &self.path).finish()
    }
}

/// Unrotated extent of `text` at `size` pixels.
pub fn run_size(font: &Font, size: f32, text: &str) -> Size {
    let (width, height) = text_size(PxScale::from(size), &font.face, text);
    Size::new(width, height)
}

/// Placement box for `text` drawn at `angle` degrees.
pub fn measure(font: &Font, size: f32, angle: f32, text: &str) -> Size {
    text_box(run_size(font, size, text), f64::from(angle))
}

/// Glyph coverage (0 = empty, 255 = fully inked) for an unrotated run.
pub fn coverage_mask(font: &Font, size: f32, text: &str) -> GrayImage {
    let extent = run_size(font, size, text);
    let mut mask = GrayImage::new(extent.width, extent.height);
    if !extent.is_empty() {
        draw_text_mut(
            &mut mask,
            Luma([255]),
            0,
            0,
            PxScale::from(size),
            &font.face,
            text,
        );
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::find_test_font;

    #[test]
    fn open_missing_font_is_load_failure() {
        let result = Font::open(Path::new("/nonexistent/font.ttf"));
        assert!(matches!(result, Err(ImageError::LoadFailure { .. })));
    }

    #[test]
    fn open_garbage_font_is_load_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(
            Font::open(&path),
            Err(ImageError::LoadFailure { .. })
        ));
    }

    #[test]
    fn measure_grows_with_text_and_size() {
        let Some(font_path) = find_test_font() else {
            eprintln!("no system font found, skipping");
            return;
        };
        let font = Font::open(&font_path).unwrap();

        let short = measure(&font, 16.0, 0.0, "Hi");
        let long = measure(&font, 16.0, 0.0, "Hello, world");
        let big = measure(&font, 32.0, 0.0, "Hi");
        assert!(long.width > short.width);
        assert!(big.height > short.height);
    }

    #[test]
    fn coverage_mask_matches_run_size_and_has_ink() {
        let Some(font_path) = find_test_font() else {
            eprintln!("no system font found, skipping");
            return;
        };
        let font = Font::open(&font_path).unwrap();

        let mask = coverage_mask(&font, 24.0, "Ink");
        let extent = run_size(&font, 24.0, "Ink");
        assert_eq!((mask.width(), mask.height()), (extent.width, extent.height));
        assert!(mask.pixels().any(|p| p.0[0] > 0));
    }
}
