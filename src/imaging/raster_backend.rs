//! In-memory raster engine.
//!
//! Every operation runs immediately on a decoded pixel buffer. The buffer
//! captured at load time is kept untouched so [`reset`](ImageBackend::reset)
//! can restore it without re-reading the file.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (GIF, JPEG, PNG) | `image::ImageReader` |
//! | Resize | `DynamicImage::resize_exact` with the configured filter |
//! | Crop | `DynamicImage::crop_imm` |
//! | Flip | `DynamicImage::fliph` / `flipv` (exact mirror) |
//! | Rotate | quarter turns: `rotate90/180/270`; other angles: `imageproc::geometric_transformations::rotate_about_center` on a padded canvas |
//! | Grayscale | per-pixel luma (0.299/0.587/0.114), alpha untouched |
//! | Watermark / text | `image::imageops::overlay` (alpha blending) |
//! | Encode | `image::codecs::{gif, jpeg, png}` |

use super::backend::{ImageBackend, ImageError, SaveOutcome};
use super::calculations::{Point, Rect, Size, rotated_bounds};
use super::identify::ImageInfo;
use super::params::{
    CanvasParams, FlipMode, ImageFormat, Quality, SaveParams, TextParams, ThumbParams,
    WatermarkParams,
};
use super::text;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Frame, ImageReader, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use std::io::{BufWriter, Write};
use std::path::Path;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Pixel-buffer engine built on the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RasterBackend {
    filter: FilterType,
    pristine: Option<DynamicImage>,
    working: Option<DynamicImage>,
}

impl RasterBackend {
    pub fn new(filter: FilterType) -> Self {
        Self {
            filter,
            pristine: None,
            working: None,
        }
    }

    /// The current working buffer, if an image is loaded.
    pub fn image(&self) -> Option<&DynamicImage> {
        self.working.as_ref()
    }

    fn working(&mut self) -> Result<&mut DynamicImage, ImageError> {
        self.working.as_mut().ok_or(ImageError::NotLoaded)
    }

    /// Swap in a new working buffer and report its size.
    fn replace(&mut self, image: DynamicImage) -> Size {
        let size = Size::new(image.width(), image.height());
        self.working = Some(image);
        size
    }

    fn current_size(&self) -> Result<Size, ImageError> {
        self.working
            .as_ref()
            .map(|img| Size::new(img.width(), img.height()))
            .ok_or(ImageError::NotLoaded)
    }
}

impl Default for RasterBackend {
    fn default() -> Self {
        Self::new(FilterType::Lanczos3)
    }
}

/// Load and decode an image from disk. Multi-frame GIFs yield their first frame.
pub fn decode(path: &Path) -> Result<DynamicImage, ImageError> {
    ImageReader::open(path)
        .map_err(|e| ImageError::load(path, e))?
        .with_guessed_format()
        .map_err(|e| ImageError::load(path, e))?
        .decode()
        .map_err(|e| ImageError::load(path, e))
}

/// Encode `img` in `format`. GIF and PNG are lossless; JPEG honors `quality`.
pub fn encode_image(
    img: &DynamicImage,
    out: &mut dyn Write,
    format: ImageFormat,
    quality: Quality,
) -> Result<(), ImageError> {
    let result = match format {
        ImageFormat::Gif => GifEncoder::new(out).encode_frame(Frame::new(img.to_rgba8())),
        ImageFormat::Jpeg => {
            // The encoder has no alpha channel and no quality 0.
            let encoder = JpegEncoder::new_with_quality(out, quality.value().max(1));
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        ImageFormat::Png => img.write_with_encoder(PngEncoder::new(out)),
    };
    result.map_err(|e| ImageError::SaveFailure(format!("{format} encode failed: {e}")))
}

/// Resample to exactly `to`; a no-op copy when the size already matches.
fn scaled(img: &DynamicImage, to: Size, filter: FilterType) -> DynamicImage {
    if (img.width(), img.height()) == (to.width, to.height) {
        img.clone()
    } else {
        img.resize_exact(to.width, to.height, filter)
    }
}

/// Back to a straight RGB buffer unless the image needs its alpha channel.
fn from_rgba(rgba: RgbaImage, keep_alpha: bool) -> DynamicImage {
    let img = DynamicImage::ImageRgba8(rgba);
    if keep_alpha {
        img
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Rotate clockwise by `degrees` onto a transparent canvas the size of the
/// rotated bounding box.
fn rotate_rgba(img: &RgbaImage, degrees: f64) -> RgbaImage {
    let bounds = rotated_bounds(Size::new(img.width(), img.height()), degrees);
    let mut canvas = RgbaImage::from_pixel(bounds.width, bounds.height, TRANSPARENT);
    let x = (i64::from(bounds.width) - i64::from(img.width())).div_euclid(2);
    let y = (i64::from(bounds.height) - i64::from(img.height())).div_euclid(2);
    imageops::replace(&mut canvas, img, x, y);
    rotate_about_center(
        &canvas,
        degrees.to_radians() as f32,
        Interpolation::Bilinear,
        TRANSPARENT,
    )
}

/// Start of a span of `extent` centered on `placed` pixels from `start`,
/// shifted to stay within `0..bound` when it fits.
fn centered_within(start: i64, placed: u32, extent: u32, bound: u32) -> i64 {
    let at = start + i64::from(placed) / 2 - i64::from(extent) / 2;
    at.min(i64::from(bound) - i64::from(extent)).max(0)
}

/// Rec. 601 luma, rounded.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b) + 500) / 1000) as u8
}

impl ImageBackend for RasterBackend {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn load(&mut self, info: &ImageInfo) -> Result<(), ImageError> {
        self.release();
        let image = decode(&info.path)?;
        self.working = Some(image.clone());
        self.pristine = Some(image);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ImageError> {
        let pristine = self.pristine.clone().ok_or(ImageError::NotLoaded)?;
        self.working = Some(pristine);
        Ok(())
    }

    fn release(&mut self) {
        self.working = None;
        self.pristine = None;
    }

    fn resize(&mut self, to: Size) -> Result<Size, ImageError> {
        let filter = self.filter;
        let resized = scaled(self.working()?, to, filter);
        Ok(self.replace(resized))
    }

    fn crop(&mut self, region: Rect) -> Result<Size, ImageError> {
        let cropped = self
            .working()?
            .crop_imm(region.x, region.y, region.width, region.height);
        Ok(self.replace(cropped))
    }

    fn flip(&mut self, mode: FlipMode) -> Result<Size, ImageError> {
        let img = self.working()?;
        let flipped = match mode {
            FlipMode::Horizontal => img.fliph(),
            FlipMode::Vertical => img.flipv(),
            FlipMode::Both => img.fliph().flipv(),
        };
        Ok(self.replace(flipped))
    }

    fn rotate(&mut self, degrees: i32) -> Result<Size, ImageError> {
        let img = self.working()?;
        let rotated = match degrees.rem_euclid(360) {
            0 => return self.current_size(),
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            other => DynamicImage::ImageRgba8(rotate_rgba(&img.to_rgba8(), f64::from(other))),
        };
        Ok(self.replace(rotated))
    }

    fn grayscale(&mut self) -> Result<Size, ImageError> {
        let img = self.working()?;
        let keep_alpha = img.color().has_alpha();
        let mut rgba = img.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let l = luma(r, g, b);
            pixel.0 = [l, l, l, a];
        }
        Ok(self.replace(from_rgba(rgba, keep_alpha)))
    }

    fn watermark(&mut self, params: &WatermarkParams) -> Result<Size, ImageError> {
        let filter = self.filter;
        let mark = decode(&params.source)?;
        let mark = scaled(&mark, params.size, filter);

        let img = self.working()?;
        let keep_alpha = img.color().has_alpha();
        let mut canvas = img.to_rgba8();
        imageops::overlay(
            &mut canvas,
            &mark.to_rgba8(),
            params.position.x,
            params.position.y,
        );
        Ok(self.replace(from_rgba(canvas, keep_alpha)))
    }

    fn text(&mut self, params: &TextParams<'_>) -> Result<Size, ImageError> {
        let mask = text::coverage_mask(params.font, params.size, params.text);
        let color = params.color;
        let opacity = u32::from(color.opacity());
        let layer = RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
            let coverage = u32::from(mask.get_pixel(x, y).0[0]);
            Rgba([color.r, color.g, color.b, (coverage * opacity / 255) as u8])
        });

        let img = self.working()?;
        let (layer, origin) = if params.angle == 0.0 {
            (layer, params.position)
        } else {
            // The placement box shrinks with |cos angle| and is empty at
            // 90 degrees, so the rotated run is centered on it and then
            // pulled back inside the canvas.
            let placed = text::measure(params.font, params.size, params.angle, params.text);
            let rotated = rotate_rgba(&layer, -f64::from(params.angle));
            let origin = Point::new(
                centered_within(params.position.x, placed.width, rotated.width(), img.width()),
                centered_within(params.position.y, placed.height, rotated.height(), img.height()),
            );
            (rotated, origin)
        };

        let keep_alpha = img.color().has_alpha();
        let mut canvas = img.to_rgba8();
        imageops::overlay(&mut canvas, &layer, origin.x, origin.y);
        Ok(self.replace(from_rgba(canvas, keep_alpha)))
    }

    fn adaptive_thumb(&mut self, params: &ThumbParams) -> Result<Size, ImageError> {
        self.resize(params.scaled)?;
        self.crop(params.crop)
    }

    fn resize_canvas(&mut self, params: &CanvasParams) -> Result<Size, ImageError> {
        let filter = self.filter;
        let img = self.working()?;
        let keep_alpha = img.color().has_alpha() || params.background.alpha > 0;

        let mut canvas = RgbaImage::from_pixel(
            params.canvas.width,
            params.canvas.height,
            params.background.to_rgba(),
        );
        if !params.content.is_empty() {
            let content = scaled(img, params.content, filter).to_rgba8();
            imageops::overlay(&mut canvas, &content, params.position.x, params.position.y);
        }
        Ok(self.replace(from_rgba(canvas, keep_alpha)))
    }

    fn save(&mut self, params: &SaveParams) -> Result<SaveOutcome, ImageError> {
        let img = self.working.as_ref().ok_or(ImageError::NotLoaded)?;
        let file = std::fs::File::create(&params.path).map_err(|e| {
            ImageError::SaveFailure(format!("cannot create {}: {e}", params.path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        encode_image(img, &mut writer, params.format, params.quality)?;
        writer.flush().map_err(|e| {
            ImageError::SaveFailure(format!("cannot write {}: {e}", params.path.display()))
        })?;
        Ok(SaveOutcome {
            path: params.path.clone(),
            rebase: false,
        })
    }

    fn encode(
        &self,
        out: &mut dyn Write,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<(), ImageError> {
        let img = self.working.as_ref().ok_or(ImageError::NotLoaded)?;
        encode_image(img, out, format, quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::identify::identify;
    use crate::imaging::params::Color;
    use crate::test_helpers::{write_test_image, write_test_rgba};
    use image::{GenericImageView, Rgb, RgbImage};

    fn loaded(width: u32, height: u32) -> (tempfile::TempDir, RasterBackend) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.png");
        write_test_image(&path, width, height);
        let mut backend = RasterBackend::default();
        backend.load(&identify(&path).unwrap()).unwrap();
        (tmp, backend)
    }

    fn pixel(backend: &RasterBackend, x: u32, y: u32) -> [u8; 4] {
        backend.image().unwrap().get_pixel(x, y).0
    }

    #[test]
    fn operations_before_load_error() {
        let mut backend = RasterBackend::default();
        assert!(matches!(
            backend.resize(Size::new(10, 10)),
            Err(ImageError::NotLoaded)
        ));
        assert!(matches!(backend.reset(), Err(ImageError::NotLoaded)));
    }

    #[test]
    fn resize_replaces_dimensions() {
        let (_tmp, mut backend) = loaded(200, 100);
        assert_eq!(backend.resize(Size::new(50, 25)).unwrap(), Size::new(50, 25));
        assert_eq!(backend.image().unwrap().dimensions(), (50, 25));
    }

    #[test]
    fn crop_copies_the_region() {
        let (_tmp, mut backend) = loaded(100, 50);
        let before = pixel(&backend, 30, 20);
        let size = backend
            .crop(Rect {
                x: 30,
                y: 20,
                width: 10,
                height: 5,
            })
            .unwrap();
        assert_eq!(size, Size::new(10, 5));
        assert_eq!(pixel(&backend, 0, 0), before);
    }

    #[test]
    fn flip_horizontal_twice_is_identity() {
        let (_tmp, mut backend) = loaded(37, 21);
        let before = backend.image().unwrap().clone();
        backend.flip(FlipMode::Horizontal).unwrap();
        assert_ne!(backend.image().unwrap(), &before);
        backend.flip(FlipMode::Horizontal).unwrap();
        assert_eq!(backend.image().unwrap(), &before);
    }

    #[test]
    fn flip_mirrors_axes() {
        let (_tmp, mut backend) = loaded(40, 20);
        let top_left = pixel(&backend, 0, 0);

        backend.flip(FlipMode::Horizontal).unwrap();
        assert_eq!(pixel(&backend, 39, 0), top_left);
        backend.reset().unwrap();

        backend.flip(FlipMode::Vertical).unwrap();
        assert_eq!(pixel(&backend, 0, 19), top_left);
        backend.reset().unwrap();

        assert_eq!(backend.flip(FlipMode::Both).unwrap(), Size::new(40, 20));
        assert_eq!(pixel(&backend, 39, 19), top_left);
    }

    #[test]
    fn rotate_quarter_turn_is_clockwise() {
        let (_tmp, mut backend) = loaded(40, 20);
        let top_left = pixel(&backend, 0, 0);
        assert_eq!(backend.rotate(90).unwrap(), Size::new(20, 40));
        // Clockwise: the top-left corner moves to the top-right
        assert_eq!(pixel(&backend, 19, 0), top_left);
    }

    #[test]
    fn rotate_negative_and_full_turns() {
        let (_tmp, mut backend) = loaded(40, 20);
        assert_eq!(backend.rotate(-90).unwrap(), Size::new(20, 40));
        assert_eq!(backend.rotate(360).unwrap(), Size::new(20, 40));
        assert_eq!(backend.rotate(180).unwrap(), Size::new(20, 40));
    }

    #[test]
    fn rotate_arbitrary_angle_grows_with_transparent_corners() {
        let (_tmp, mut backend) = loaded(100, 100);
        assert_eq!(backend.rotate(45).unwrap(), Size::new(142, 142));
        assert_eq!(pixel(&backend, 0, 0), [0, 0, 0, 0]);
        assert_eq!(pixel(&backend, 71, 71)[3], 255);
    }

    #[test]
    fn grayscale_equalizes_channels_and_keeps_alpha() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("alpha.png");
        write_test_rgba(&path, 8, 8, [200, 40, 10, 90]);
        let mut backend = RasterBackend::default();
        backend.load(&identify(&path).unwrap()).unwrap();

        backend.grayscale().unwrap();
        let [r, g, b, a] = pixel(&backend, 3, 3);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(r, luma(200, 40, 10));
        assert_eq!(a, 90);
    }

    #[test]
    fn grayscale_of_opaque_image_stays_opaque_rgb() {
        let (_tmp, mut backend) = loaded(10, 10);
        backend.grayscale().unwrap();
        assert!(!backend.image().unwrap().color().has_alpha());
    }

    #[test]
    fn resize_canvas_centers_content_on_background() {
        let (_tmp, mut backend) = loaded(40, 20);
        let size = backend
            .resize_canvas(&CanvasParams {
                canvas: Size::new(100, 100),
                content: Size::new(40, 20),
                position: Point::new(30, 40),
                background: Color::rgb(255, 0, 255),
            })
            .unwrap();
        assert_eq!(size, Size::new(100, 100));
        assert_eq!(pixel(&backend, 0, 0), [255, 0, 255, 255]);
        assert_eq!(pixel(&backend, 99, 99), [255, 0, 255, 255]);
        assert_ne!(pixel(&backend, 50, 50), [255, 0, 255, 255]);
    }

    #[test]
    fn adaptive_thumb_resizes_then_crops() {
        let (_tmp, mut backend) = loaded(400, 200);
        let size = backend
            .adaptive_thumb(&ThumbParams {
                target: Size::new(100, 100),
                scaled: Size::new(200, 100),
                crop: Rect {
                    x: 50,
                    y: 0,
                    width: 100,
                    height: 100,
                },
                background: Color::BLACK,
            })
            .unwrap();
        assert_eq!(size, Size::new(100, 100));
    }

    #[test]
    fn watermark_overlays_at_position() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        let mark = tmp.path().join("mark.png");
        RgbImage::from_pixel(50, 50, Rgb([0, 0, 0])).save(&source).unwrap();
        RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])).save(&mark).unwrap();

        let mut backend = RasterBackend::default();
        backend.load(&identify(&source).unwrap()).unwrap();
        backend
            .watermark(&WatermarkParams {
                source: mark,
                size: Size::new(8, 8),
                position: Point::new(40, 40),
            })
            .unwrap();

        assert_eq!(pixel(&backend, 39, 39), [0, 0, 0, 255]);
        assert_eq!(pixel(&backend, 40, 40), [255, 255, 255, 255]);
        assert_eq!(pixel(&backend, 47, 47), [255, 255, 255, 255]);
        assert_eq!(pixel(&backend, 48, 48), [0, 0, 0, 255]);
    }

    #[test]
    fn watermark_partly_off_canvas_is_clipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        let mark = tmp.path().join("mark.png");
        RgbImage::from_pixel(20, 20, Rgb([0, 0, 0])).save(&source).unwrap();
        RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])).save(&mark).unwrap();

        let mut backend = RasterBackend::default();
        backend.load(&identify(&source).unwrap()).unwrap();
        let size = backend
            .watermark(&WatermarkParams {
                source: mark,
                size: Size::new(10, 10),
                position: Point::new(-5, 15),
            })
            .unwrap();

        assert_eq!(size, Size::new(20, 20));
        assert_eq!(pixel(&backend, 0, 19), [255, 255, 255, 255]);
        assert_eq!(pixel(&backend, 5, 19), [0, 0, 0, 255]);
    }

    #[test]
    fn reset_restores_pristine_buffer() {
        let (_tmp, mut backend) = loaded(60, 30);
        let pristine = backend.image().unwrap().clone();
        backend.resize(Size::new(10, 10)).unwrap();
        backend.grayscale().unwrap();
        backend.reset().unwrap();
        assert_eq!(backend.image().unwrap(), &pristine);
    }

    #[test]
    fn encode_produces_decodable_bytes_for_every_format() {
        let (_tmp, backend) = loaded(30, 20);
        for format in [ImageFormat::Gif, ImageFormat::Jpeg, ImageFormat::Png] {
            let mut bytes = Vec::new();
            backend.encode(&mut bytes, format, Quality::default()).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.dimensions(), (30, 20), "{format}");
        }
    }

    #[test]
    fn encode_jpeg_quality_changes_size() {
        let (_tmp, backend) = loaded(120, 80);
        let mut low = Vec::new();
        let mut high = Vec::new();
        backend.encode(&mut low, ImageFormat::Jpeg, Quality::new(5)).unwrap();
        backend.encode(&mut high, ImageFormat::Jpeg, Quality::new(95)).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn centered_within_pulls_span_back_inside() {
        assert_eq!(centered_within(10, 20, 10, 100), 15);
        // Empty placement box at the origin
        assert_eq!(centered_within(0, 0, 40, 100), 0);
        assert_eq!(centered_within(95, 0, 40, 100), 60);
        // Wider than the canvas: starts at the edge
        assert_eq!(centered_within(0, 0, 400, 100), 0);
    }

    #[test]
    fn save_to_missing_directory_is_save_failure() {
        let (_tmp, mut backend) = loaded(10, 10);
        let result = backend.save(&SaveParams {
            path: "/nonexistent/dir/out.png".into(),
            format: ImageFormat::Png,
            quality: Quality::default(),
        });
        assert!(matches!(result, Err(ImageError::SaveFailure(_))));
    }
}
