//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Both engines receive sizes and positions computed here, so the raster and
//! deferred paths agree on every pixel coordinate.
//!
//! Rounding follows the conventions the formulas were written against:
//! `round` is half-away-from-zero ([`f64::round`]) and every "half the
//! difference" centering uses floor division, which matters when the
//! difference is odd or negative.

use super::params::Corner;
use serde::{Deserialize, Serialize};

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A placement coordinate. May be negative or beyond the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A region inside the current canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn size(self) -> Size {
        Size::new(self.width, self.height)
    }
}

fn round(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

fn half_floor(diff: i64) -> i64 {
    diff.div_euclid(2)
}

/// Resolve where content of size `content` lands on `canvas` for `corner`.
///
/// No clamping is applied: offsets or oversized content may push the result
/// outside the canvas, and callers draw clipped.
///
/// Returns `None` for [`Corner::Tile`], which has no single placement.
///
/// # Examples
/// ```
/// # use image_handler::imaging::{resolve_position, Corner, Point, Size};
/// let pos = resolve_position(
///     Corner::RightBottom,
///     Size::new(20, 10),
///     Size::new(100, 50),
///     Point::new(5, 5),
/// );
/// assert_eq!(pos, Some(Point::new(75, 35)));
/// ```
pub fn resolve_position(corner: Corner, content: Size, canvas: Size, offset: Point) -> Option<Point> {
    let (w, h) = (i64::from(content.width), i64::from(content.height));
    let (cw, ch) = (i64::from(canvas.width), i64::from(canvas.height));
    let (ox, oy) = (offset.x, offset.y);

    let left = ox;
    let right = cw - w - ox;
    let center_x = half_floor(cw - w);
    let top = oy;
    let bottom = ch - h - oy;
    let center_y = half_floor(ch - h);

    let (x, y) = match corner {
        Corner::LeftTop => (left, top),
        Corner::RightTop => (right, top),
        Corner::LeftBottom => (left, bottom),
        Corner::RightBottom => (right, bottom),
        Corner::Center => (center_x, center_y),
        Corner::CenterTop => (center_x, top),
        Corner::CenterBottom => (center_x, bottom),
        Corner::LeftCenter => (left, center_y),
        Corner::RightCenter => (right, center_y),
        Corner::Tile => return None,
    };
    Some(Point::new(x, y))
}

/// Fit `current` inside `target`.
///
/// Proportional: anchor on the target height, and re-anchor on the width if
/// the result overflows it. Not proportional: the target verbatim.
pub fn fit_within(current: Size, target: Size, proportional: bool) -> Size {
    if !proportional {
        return target;
    }
    let (w, h) = (f64::from(current.width), f64::from(current.height));

    let mut new_h = target.height;
    let mut new_w = round(f64::from(new_h) / h * w);
    if new_w > target.width {
        new_w = target.width;
        new_h = round(f64::from(new_w) / w * h);
    }
    Size::new(new_w, new_h)
}

/// Clamp each target axis so a thumbnail never upscales.
pub fn clamp_to_current(current: Size, target: Size) -> Size {
    Size::new(
        target.width.min(current.width),
        target.height.min(current.height),
    )
}

/// Intermediate size that fully covers `target` before a centered crop.
///
/// The axis with the larger scale factor is anchored to the target exactly;
/// ties anchor the height.
pub fn cover_dimensions(current: Size, target: Size) -> Size {
    let (w, h) = (f64::from(current.width), f64::from(current.height));
    let width_proportion = f64::from(target.width) / w;
    let height_proportion = f64::from(target.height) / h;

    if width_proportion > height_proportion {
        let new_w = target.width;
        Size::new(new_w, round(f64::from(new_w) / w * h))
    } else {
        let new_h = target.height;
        Size::new(round(f64::from(new_h) / h * w), new_h)
    }
}

/// Cover-then-crop: the scaled size plus the centered crop that yields exactly `target`.
pub fn cover_then_crop(current: Size, target: Size) -> (Size, Rect) {
    let scaled = cover_dimensions(current, target);
    let crop = crop_region(scaled, target, None, None);
    (scaled, crop)
}

/// Shrink `current` to fit a `canvas`, never upscaling, and center it.
///
/// Returns the content size and its top-left position on the canvas.
pub fn shrink_to_fit_canvas(current: Size, canvas: Size) -> (Size, Point) {
    let mut new_w = canvas.width.min(current.width);
    let mut new_h = canvas.height.min(current.height);

    let width_proportion = f64::from(new_w) / f64::from(current.width);
    let height_proportion = f64::from(new_h) / f64::from(current.height);

    if width_proportion < height_proportion {
        new_h = round(width_proportion * f64::from(current.height));
    } else {
        new_w = round(height_proportion * f64::from(current.width));
    }

    let position = Point::new(
        half_floor(i64::from(canvas.width) - i64::from(new_w)),
        half_floor(i64::from(canvas.height) - i64::from(new_h)),
    );
    (Size::new(new_w, new_h), position)
}

/// Clamp a crop request to the current canvas.
///
/// Missing start coordinates default to the centered position. Starts are
/// clamped into `[0, dimension]` and the size so the region never leaves the
/// canvas; the result may be empty when a start sits on the far edge.
pub fn crop_region(current: Size, request: Size, start_x: Option<i64>, start_y: Option<i64>) -> Rect {
    let (cw, ch) = (i64::from(current.width), i64::from(current.height));
    let (w, h) = (i64::from(request.width), i64::from(request.height));

    let x = start_x.unwrap_or_else(|| half_floor(cw - w)).clamp(0, cw);
    let y = start_y.unwrap_or_else(|| half_floor(ch - h)).clamp(0, ch);

    Rect {
        x: x as u32,
        y: y as u32,
        width: w.min(cw - x) as u32,
        height: h.min(ch - y) as u32,
    }
}

/// Watermark size for a `zoom` factor relative to the canvas's longer edge.
pub fn zoomed_overlay(canvas: Size, overlay: Size, zoom: f64) -> Size {
    let dimension = round(f64::from(canvas.width.max(canvas.height)) * zoom);
    fit_within(overlay, Size::new(dimension, dimension), true)
}

/// Bounding box of `size` rotated by `degrees`.
pub fn rotated_bounds(size: Size, degrees: f64) -> Size {
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (f64::from(size.width), f64::from(size.height));
    // Snap float noise so quarter turns stay exact.
    let snap = |v: f64| {
        let r = v.round();
        if (v - r).abs() < 1e-6 { r as u32 } else { v.ceil() as u32 }
    };
    Size::new(snap(w * cos + h * sin), snap(w * sin + h * cos))
}

/// Placement box of a text run of `size` drawn at `angle` degrees.
///
/// Width is the run's horizontal extent along the baseline, height the
/// vertical extent of its left edge: both scale with `|cos angle|`. At 90
/// degrees the box is empty, so corner placement degenerates to the anchor
/// point itself.
pub fn text_box(size: Size, angle: f64) -> Size {
    let cos = angle.to_radians().cos().abs();
    Size::new(
        round(f64::from(size.width) * cos),
        round(f64::from(size.height) * cos),
    )
}
