//! Engine selection.
//!
//! The set of engines is closed: a name from configuration or the command
//! line is parsed into an [`EngineKind`], and [`Backend`] is the matching
//! enum of concrete engines. Unknown names are an
//! [`InvalidDriver`](ImageError::InvalidDriver) error.

use super::backend::{ImageBackend, ImageError, SaveOutcome};
use super::calculations::{Rect, Size};
use super::identify::ImageInfo;
use super::magick_backend::MagickBackend;
use super::params::{
    CanvasParams, FlipMode, ImageFormat, Quality, SaveParams, TextParams, ThumbParams,
    WatermarkParams,
};
use super::raster_backend::RasterBackend;
use crate::config::HandlerConfig;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// In-memory pixel buffer, every call applied immediately.
    #[default]
    Raster,
    /// External `convert` process, run once at save time.
    Magick,
}

impl FromStr for EngineKind {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raster" => Ok(EngineKind::Raster),
            "magick" => Ok(EngineKind::Magick),
            _ => Err(ImageError::InvalidDriver(s.to_string())),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineKind::Raster => "raster",
            EngineKind::Magick => "magick",
        })
    }
}

/// One of the concrete engines, chosen at runtime.
pub enum Backend {
    Raster(RasterBackend),
    Magick(MagickBackend),
}

impl Backend {
    pub fn new(kind: EngineKind, config: &HandlerConfig) -> Self {
        match kind {
            EngineKind::Raster => Backend::Raster(RasterBackend::new(config.raster.filter.into())),
            EngineKind::Magick => {
                Backend::Magick(MagickBackend::new(config.magick.convert_path.clone()))
            }
        }
    }

    /// Build the engine named by `config.engine`.
    pub fn from_config(config: &HandlerConfig) -> Result<Self, ImageError> {
        let kind: EngineKind = config.engine.parse()?;
        Ok(Self::new(kind, config))
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            Backend::Raster(_) => EngineKind::Raster,
            Backend::Magick(_) => EngineKind::Magick,
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Raster(RasterBackend::default())
    }
}

macro_rules! dispatch {
    ($self:ident, $engine:ident => $call:expr) => {
        match $self {
            Backend::Raster($engine) => $call,
            Backend::Magick($engine) => $call,
        }
    };
}

impl ImageBackend for Backend {
    fn name(&self) -> &'static str {
        dispatch!(self, engine => engine.name())
    }

    fn load(&mut self, info: &ImageInfo) -> Result<(), ImageError> {
        dispatch!(self, engine => engine.load(info))
    }

    fn reset(&mut self) -> Result<(), ImageError> {
        dispatch!(self, engine => engine.reset())
    }

    fn release(&mut self) {
        dispatch!(self, engine => engine.release())
    }

    fn resize(&mut self, to: Size) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.resize(to))
    }

    fn crop(&mut self, region: Rect) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.crop(region))
    }

    fn flip(&mut self, mode: FlipMode) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.flip(mode))
    }

    fn rotate(&mut self, degrees: i32) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.rotate(degrees))
    }

    fn grayscale(&mut self) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.grayscale())
    }

    fn watermark(&mut self, params: &WatermarkParams) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.watermark(params))
    }

    fn text(&mut self, params: &TextParams<'_>) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.text(params))
    }

    fn adaptive_thumb(&mut self, params: &ThumbParams) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.adaptive_thumb(params))
    }

    fn resize_canvas(&mut self, params: &CanvasParams) -> Result<Size, ImageError> {
        dispatch!(self, engine => engine.resize_canvas(params))
    }

    fn save(&mut self, params: &SaveParams) -> Result<SaveOutcome, ImageError> {
        dispatch!(self, engine => engine.save(params))
    }

    fn encode(
        &self,
        out: &mut dyn Write,
        format: ImageFormat,
        quality: Quality,
    ) -> Result<(), ImageError> {
        dispatch!(self, engine => engine.encode(out, format, quality))
    }
}
