//! The image session: a loaded image plus a fluent chain of transforms.
//!
//! The session owns the bookkeeping (source path, format, original and
//! current size) and all geometry. For each call it checks that an image is
//! loaded, computes the final sizes, regions and positions, and hands them to
//! its engine. Every transform returns `&mut Self`, so calls chain with `?`:
//!
//! ```no_run
//! # use image_handler::imaging::{ImageSession, FlipMode, SaveOptions};
//! # fn main() -> Result<(), image_handler::imaging::ImageError> {
//! let mut session: ImageSession = ImageSession::default();
//! session
//!     .load("photo.jpg")?
//!     .thumb(Some(320), Some(320), true)?
//!     .flip(FlipMode::Horizontal)?
//!     .save(&SaveOptions::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! A failed call leaves the session as the last successful call left it.
//! There is no rollback.

use super::backend::{ImageBackend, ImageError};
use super::calculations::{
    Size, clamp_to_current, cover_then_crop, crop_region, fit_within, resolve_position,
    shrink_to_fit_canvas, zoomed_overlay,
};
use super::engine::Backend;
use super::identify::{ImageInfo, identify};
use super::params::{
    CanvasParams, Color, FlipMode, ImageFormat, Quality, SaveOptions, SaveParams, TextOptions,
    TextParams, ThumbParams, WatermarkOptions, WatermarkParams,
};
use super::text::{self, Font};
use crate::config::HandlerConfig;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone)]
struct Loaded {
    info: ImageInfo,
    original: Size,
    current: Size,
}

impl Loaded {
    fn new(info: ImageInfo) -> Self {
        Self {
            original: info.size,
            current: info.size,
            info,
        }
    }
}

/// A single-threaded transform session over one engine.
pub struct ImageSession<B: ImageBackend = Backend> {
    backend: B,
    loaded: Option<Loaded>,
}

impl ImageSession<Backend> {
    /// Session on the engine named in `config`.
    pub fn from_config(config: &HandlerConfig) -> Result<Self, ImageError> {
        Ok(Self::new(Backend::from_config(config)?))
    }
}

impl Default for ImageSession<Backend> {
    fn default() -> Self {
        Self::new(Backend::default())
    }
}

impl<B: ImageBackend> ImageSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            loaded: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Current width, 0 when nothing is loaded.
    pub fn width(&self) -> u32 {
        self.loaded.as_ref().map_or(0, |l| l.current.width)
    }

    /// Current height, 0 when nothing is loaded.
    pub fn height(&self) -> u32 {
        self.loaded.as_ref().map_or(0, |l| l.current.height)
    }

    pub fn size(&self) -> Option<Size> {
        self.loaded.as_ref().map(|l| l.current)
    }

    /// Size at load time, restored by [`reload`](Self::reload).
    pub fn original_size(&self) -> Option<Size> {
        self.loaded.as_ref().map(|l| l.original)
    }

    pub fn format(&self) -> Option<ImageFormat> {
        self.loaded.as_ref().map(|l| l.info.format)
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        self.loaded.as_ref().map(|l| l.info.mime_type)
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|l| l.info.path.as_path())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load `path`, releasing whatever was loaded before.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, ImageError> {
        let path = path.as_ref();
        log::trace!("ImageSession::load: {}", path.display());

        if self.loaded.take().is_some() {
            self.backend.release();
        }
        let info = identify(path)?;
        self.backend.load(&info)?;
        log::debug!(
            "loaded {} ({}, {}) on {} engine",
            path.display(),
            info.size,
            info.format,
            self.backend.name()
        );
        self.loaded = Some(Loaded::new(info));
        Ok(self)
    }

    /// Discard every transform since the last load.
    pub fn reload(&mut self) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::reload");
        let loaded = self.loaded.as_mut().ok_or(ImageError::NotLoaded)?;
        self.backend.reset()?;
        loaded.current = loaded.original;
        Ok(self)
    }

    fn current(&self) -> Result<Size, ImageError> {
        self.size().ok_or(ImageError::NotLoaded)
    }

    /// Run one engine operation and record the size it reports.
    fn apply(
        &mut self,
        op: impl FnOnce(&mut B) -> Result<Size, ImageError>,
    ) -> Result<&mut Self, ImageError> {
        let loaded = self.loaded.as_mut().ok_or(ImageError::NotLoaded)?;
        loaded.current = op(&mut self.backend)?;
        Ok(self)
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    /// Scale to fit `width` x `height`. A missing axis keeps the current value.
    pub fn resize(
        &mut self,
        width: Option<u32>,
        height: Option<u32>,
        proportional: bool,
    ) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::resize: {width:?}x{height:?} proportional={proportional}");
        let current = self.current()?;
        let target = target_size(current, width, height)?;
        let size = non_empty(fit_within(current, target, proportional), "resize")?;
        self.apply(|backend| backend.resize(size))
    }

    /// Like [`resize`](Self::resize) but never upscales.
    pub fn thumb(
        &mut self,
        width: Option<u32>,
        height: Option<u32>,
        proportional: bool,
    ) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::thumb: {width:?}x{height:?} proportional={proportional}");
        let current = self.current()?;
        let target = clamp_to_current(current, target_size(current, width, height)?);
        let size = non_empty(fit_within(current, target, proportional), "thumbnail")?;
        self.apply(|backend| backend.resize(size))
    }

    /// Keep a `width` x `height` region. Missing starts center the region;
    /// everything is clamped to the current canvas.
    pub fn crop(
        &mut self,
        width: u32,
        height: u32,
        start_x: Option<i64>,
        start_y: Option<i64>,
    ) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::crop: {width}x{height} at {start_x:?},{start_y:?}");
        let current = self.current()?;
        let request = non_empty(Size::new(width, height), "crop")?;
        let region = crop_region(current, request, start_x, start_y);
        if region.size().is_empty() {
            return Err(ImageError::InvalidGeometry(format!(
                "crop region {}x{}+{}+{} lies outside {current}",
                region.width, region.height, region.x, region.y
            )));
        }
        self.apply(|backend| backend.crop(region))
    }

    pub fn flip(&mut self, mode: FlipMode) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::flip: {mode:?}");
        self.apply(|backend| backend.flip(mode))
    }

    /// Rotate clockwise by `degrees`; the canvas grows to the rotated bounds.
    pub fn rotate(&mut self, degrees: i32) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::rotate: {degrees}");
        self.apply(|backend| backend.rotate(degrees))
    }

    pub fn grayscale(&mut self) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::grayscale");
        self.apply(|backend| backend.grayscale())
    }

    /// Composite another image file on top, anchored at `options.corner`.
    pub fn watermark(&mut self, options: &WatermarkOptions) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::watermark: {}", options.file.display());
        let current = self.current()?;
        let mark = identify(&options.file)?;
        let size = non_empty(
            match options.zoom {
                Some(zoom) => zoomed_overlay(current, mark.size, zoom),
                None => mark.size,
            },
            "watermark",
        )?;
        let position = resolve_position(options.corner, size, current, options.offset)
            .ok_or(ImageError::Unsupported("tile placement"))?;

        let params = WatermarkParams {
            source: options.file.clone(),
            size,
            position,
        };
        self.apply(|backend| backend.watermark(&params))
    }

    /// Draw a line of text, anchored at `options.corner` by its measured box.
    pub fn text(&mut self, options: &TextOptions) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::text: {:?}", options.text);
        let current = self.current()?;
        let font = Font::open(&options.font)?;
        let measured = text::measure(&font, options.size, options.angle, &options.text);
        let position = resolve_position(options.corner, measured, current, options.offset)
            .ok_or(ImageError::Unsupported("tile placement"))?;
        let color = if options.alpha > 0 {
            options.color.with_alpha(options.alpha)
        } else {
            options.color
        };

        let params = TextParams {
            text: &options.text,
            font: &font,
            size: options.size,
            color,
            position,
            angle: options.angle,
        };
        self.apply(|backend| backend.text(&params))
    }

    /// Scale to cover `width` x `height`, then crop the centered target.
    pub fn adaptive_thumb(
        &mut self,
        width: u32,
        height: u32,
        background: Color,
    ) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::adaptive_thumb: {width}x{height}");
        let current = self.current()?;
        let target = non_empty(Size::new(width, height), "thumbnail")?;
        let (scaled, crop) = cover_then_crop(current, target);
        let params = ThumbParams {
            target,
            scaled,
            crop,
            background,
        };
        self.apply(|backend| backend.adaptive_thumb(&params))
    }

    /// Shrink to fit a `width` x `height` canvas filled with `background`.
    pub fn resize_canvas(
        &mut self,
        width: u32,
        height: u32,
        background: Color,
    ) -> Result<&mut Self, ImageError> {
        log::trace!("ImageSession::resize_canvas: {width}x{height}");
        let current = self.current()?;
        let canvas = non_empty(Size::new(width, height), "canvas")?;
        let (content, position) = shrink_to_fit_canvas(current, canvas);
        let params = CanvasParams {
            canvas,
            content,
            position,
            background,
        };
        self.apply(|backend| backend.resize_canvas(&params))
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Write the result. Path and format default to the loaded file's.
    pub fn save(&mut self, options: &SaveOptions) -> Result<&mut Self, ImageError> {
        let loaded = self.loaded.as_ref().ok_or(ImageError::NotLoaded)?;
        let source = loaded.info.path.clone();
        let params = SaveParams {
            path: options.path.clone().unwrap_or_else(|| source.clone()),
            format: options.format.unwrap_or(loaded.info.format),
            quality: options.quality,
        };
        log::trace!(
            "ImageSession::save: {} as {} q={}",
            params.path.display(),
            params.format,
            params.quality.value()
        );

        let outcome = self.backend.save(&params)?;
        if options.touch && outcome.path != source {
            copy_mtime(&source, &outcome.path)?;
        }
        if outcome.rebase {
            let info = identify(&outcome.path)?;
            self.backend.load(&info)?;
            self.loaded = Some(Loaded::new(info));
        }
        log::debug!("saved {}", outcome.path.display());
        Ok(self)
    }

    /// Encode the result into `out` and return its MIME type.
    pub fn show(
        &self,
        out: &mut dyn Write,
        format: Option<ImageFormat>,
        quality: Quality,
    ) -> Result<&'static str, ImageError> {
        let loaded = self.loaded.as_ref().ok_or(ImageError::NotLoaded)?;
        let format = format.unwrap_or(loaded.info.format);
        log::trace!("ImageSession::show: {format}");
        self.backend.encode(out, format, quality)?;
        Ok(format.mime_type())
    }
}

/// Fill missing axes from `current` and reject zero.
fn target_size(current: Size, width: Option<u32>, height: Option<u32>) -> Result<Size, ImageError> {
    non_empty(
        Size::new(
            width.unwrap_or(current.width),
            height.unwrap_or(current.height),
        ),
        "target",
    )
}

fn non_empty(size: Size, what: &str) -> Result<Size, ImageError> {
    if size.is_empty() {
        return Err(ImageError::InvalidGeometry(format!("{what} size {size} has no area")));
    }
    Ok(size)
}

fn copy_mtime(from: &Path, to: &Path) -> Result<(), ImageError> {
    let modified = fs::metadata(from)?.modified()?;
    fs::OpenOptions::new()
        .write(true)
        .open(to)?
        .set_modified(modified)?;
    Ok(())
}
