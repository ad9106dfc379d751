//! Declarative transform lists.
//!
//! A recipe is a TOML file with an ordered `[[steps]]` array. Each step names
//! its operation in `op` and carries that operation's parameters; anything
//! left out takes the same default the session method uses.
//!
//! ```toml
//! [[steps]]
//! op = "thumb"
//! width = 640
//! height = 640
//!
//! [[steps]]
//! op = "text"
//! text = "© 2024"
//! font = "fonts/DejaVuSans.ttf"
//! size = 14
//! corner = "right-bottom"
//! offset_x = 8
//! offset_y = 8
//! ```
//!
//! Relative `font` and watermark `file` paths are resolved against the
//! directory holding the recipe file.

use crate::imaging::{
    Color, Corner, FlipMode, ImageBackend, ImageError, ImageSession, Point, TextOptions,
    WatermarkOptions,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("step {index} ({op}) failed: {source}")]
    Step {
        index: usize,
        op: &'static str,
        #[source]
        source: ImageError,
    },
}

fn yes() -> bool {
    true
}

fn default_text_size() -> f32 {
    12.0
}

fn black() -> Color {
    Color::BLACK
}

fn white() -> Color {
    Color::WHITE
}

fn left_top() -> Corner {
    Corner::LeftTop
}

fn right_bottom() -> Corner {
    Corner::RightBottom
}

/// One transform in a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Step {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        #[serde(default = "yes")]
        proportional: bool,
    },
    Thumb {
        width: Option<u32>,
        height: Option<u32>,
        #[serde(default = "yes")]
        proportional: bool,
    },
    Crop {
        width: u32,
        height: u32,
        x: Option<i64>,
        y: Option<i64>,
    },
    Flip {
        mode: FlipMode,
    },
    Rotate {
        degrees: i32,
    },
    Grayscale,
    Text {
        text: String,
        font: PathBuf,
        #[serde(default = "default_text_size")]
        size: f32,
        #[serde(default = "black")]
        color: Color,
        #[serde(default = "left_top")]
        corner: Corner,
        #[serde(default)]
        offset_x: i64,
        #[serde(default)]
        offset_y: i64,
        #[serde(default)]
        angle: f32,
        #[serde(default)]
        alpha: u8,
    },
    Watermark {
        file: PathBuf,
        #[serde(default)]
        offset_x: i64,
        #[serde(default)]
        offset_y: i64,
        #[serde(default = "right_bottom")]
        corner: Corner,
        zoom: Option<f64>,
    },
    AdaptiveThumb {
        width: u32,
        height: u32,
        #[serde(default = "black")]
        background: Color,
    },
    ResizeCanvas {
        width: u32,
        height: u32,
        #[serde(default = "white")]
        background: Color,
    },
    Reload,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Resize { .. } => "resize",
            Step::Thumb { .. } => "thumb",
            Step::Crop { .. } => "crop",
            Step::Flip { .. } => "flip",
            Step::Rotate { .. } => "rotate",
            Step::Grayscale => "grayscale",
            Step::Text { .. } => "text",
            Step::Watermark { .. } => "watermark",
            Step::AdaptiveThumb { .. } => "adaptive-thumb",
            Step::ResizeCanvas { .. } => "resize-canvas",
            Step::Reload => "reload",
        }
    }

    /// Run this step against `session`.
    pub fn apply<B: ImageBackend>(&self, session: &mut ImageSession<B>) -> Result<(), ImageError> {
        match self {
            Step::Resize {
                width,
                height,
                proportional,
            } => session.resize(*width, *height, *proportional)?,
            Step::Thumb {
                width,
                height,
                proportional,
            } => session.thumb(*width, *height, *proportional)?,
            Step::Crop {
                width,
                height,
                x,
                y,
            } => session.crop(*width, *height, *x, *y)?,
            Step::Flip { mode } => session.flip(*mode)?,
            Step::Rotate { degrees } => session.rotate(*degrees)?,
            Step::Grayscale => session.grayscale()?,
            Step::Text {
                text,
                font,
                size,
                color,
                corner,
                offset_x,
                offset_y,
                angle,
                alpha,
            } => session.text(&TextOptions {
                text: text.clone(),
                font: font.clone(),
                size: *size,
                color: *color,
                corner: *corner,
                offset: Point::new(*offset_x, *offset_y),
                angle: *angle,
                alpha: *alpha,
            })?,
            Step::Watermark {
                file,
                offset_x,
                offset_y,
                corner,
                zoom,
            } => session.watermark(&WatermarkOptions {
                file: file.clone(),
                offset: Point::new(*offset_x, *offset_y),
                corner: *corner,
                zoom: *zoom,
            })?,
            Step::AdaptiveThumb {
                width,
                height,
                background,
            } => session.adaptive_thumb(*width, *height, *background)?,
            Step::ResizeCanvas {
                width,
                height,
                background,
            } => session.resize_canvas(*width, *height, *background)?,
            Step::Reload => session.reload()?,
        };
        Ok(())
    }

    fn rebase(&mut self, dir: &Path) {
        let path = match self {
            Step::Text { font, .. } => font,
            Step::Watermark { file, .. } => file,
            _ => return,
        };
        if path.is_relative() {
            *path = dir.join(&*path);
        }
    }
}

/// An ordered list of transforms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Recipe {
    pub fn from_toml(content: &str) -> Result<Self, RecipeError> {
        Ok(toml::from_str(content)?)
    }

    /// Read a recipe file, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self, RecipeError> {
        let mut recipe = Self::from_toml(&fs::read_to_string(path)?)?;
        if let Some(dir) = path.parent() {
            for step in &mut recipe.steps {
                step.rebase(dir);
            }
        }
        log::debug!("loaded recipe {} ({} steps)", path.display(), recipe.steps.len());
        Ok(recipe)
    }

    /// Run every step in order, stopping at the first failure.
    pub fn apply<B: ImageBackend>(&self, session: &mut ImageSession<B>) -> Result<(), RecipeError> {
        for (index, step) in self.steps.iter().enumerate() {
            log::debug!("step {index}: {}", step.name());
            step.apply(session).map_err(|source| RecipeError::Step {
                index,
                op: step.name(),
                source,
            })?;
        }
        Ok(())
    }
}
