//! Image transformation with two interchangeable engines.
//!
//! | Engine | Crate / tool | When work happens |
//! |---|---|---|
//! | **raster** | `image` + `imageproc` | every call, on a pixel buffer |
//! | **magick** | external `convert` | once, at save time |
//!
//! The module is split into:
//! - **Calculations**: pure placement and scaling math (unit testable)
//! - **Parameters**: data structures describing image operations
//! - **Identify** / **Text**: header probing, font measurement and glyph masks
//! - **Backend**: the [`ImageBackend`] trait, the [`ImageError`] taxonomy and
//!   both engines, selected through [`Backend`]
//! - **Session**: [`ImageSession`], which resolves geometry and drives an engine

pub mod backend;
mod calculations;
pub mod engine;
mod identify;
pub mod magick_backend;
mod params;
pub mod raster_backend;
mod session;
pub mod text;

pub use backend::{ImageBackend, ImageError, SaveOutcome};
pub use calculations::{
    Point, Rect, Size, clamp_to_current, cover_dimensions, cover_then_crop, crop_region,
    fit_within, resolve_position, rotated_bounds, shrink_to_fit_canvas, text_box, zoomed_overlay,
};
pub use engine::{Backend, EngineKind};
pub use identify::{ImageInfo, identify};
pub use magick_backend::{
    CommandArg, CommandOutput, CommandRunner, MagickBackend, PendingCommand, ResolvedCommand,
    SystemRunner,
};
pub use params::{
    CanvasParams, Color, Corner, FlipMode, ImageFormat, MAX_ALPHA, Quality, SaveOptions,
    SaveParams, TextOptions, TextParams, ThumbParams, WatermarkOptions, WatermarkParams,
};
pub use raster_backend::RasterBackend;
pub use session::ImageSession;
