//! Shared test utilities.
//!
//! Synthetic images are generated on the fly so the suite needs no binary
//! fixtures. Fonts are looked up on the host; tests that draw text skip
//! themselves when none is installed.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("source.png");
//! write_test_image(&path, 200, 100);
//!
//! if let Some(font) = find_test_font() {
//!     // draw with it
//! }
//! ```

use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Write a PNG with a two-axis gradient, so every pixel position is distinct
/// within a 256x256 tile.
pub fn write_test_image(path: &Path, width: u32, height: u32) {
    gradient(width, height).save(path).unwrap();
}

/// Same gradient, JPEG-encoded regardless of the file extension.
pub fn write_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// A solid RGBA PNG.
pub fn write_test_rgba(path: &Path, width: u32, height: u32, pixel: [u8; 4]) {
    RgbaImage::from_pixel(width, height, Rgba(pixel))
        .save(path)
        .unwrap();
}

// =========================================================================
// Fonts
// =========================================================================

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// First TrueType font found on this machine, or `TEST_FONT` if set.
pub fn find_test_font() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("TEST_FONT").map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
    }
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}
