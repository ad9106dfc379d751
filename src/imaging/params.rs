//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. The session resolves
//! user-facing options (corner, offsets, zoom, proportional flags) into the
//! fully computed `*Params` structs, and backends only ever see the latter.
//! This separation keeps the geometry identical across engines.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (0-100, default 75). Clamped on construction.
//! - [`Color`]: RGB triple with a 0-127 translucency level.
//! - [`Corner`], [`FlipMode`], [`ImageFormat`]: closed enums with the integer tags
//!   used by callers that still speak the numeric constants.
//! - [`TextOptions`], [`WatermarkOptions`], [`SaveOptions`]: what callers pass to the session.
//! - [`TextParams`], [`WatermarkParams`], [`ThumbParams`], [`CanvasParams`], [`SaveParams`]:
//!   what the session passes to a backend.

use super::backend::ImageError;
use super::calculations::{Point, Rect, Size};
use super::text::Font;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Quality setting for JPEG encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

impl From<u8> for Quality {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Highest translucency level; 0 is opaque, 127 fully transparent.
pub const MAX_ALPHA: u8 = 127;

/// An RGB color with an optional translucency level.
///
/// `alpha` follows the 7-bit convention of palette-style raster engines:
/// `0` is opaque and `127` is fully transparent.
///
/// In TOML it is written as `"#rrggbb"`, `[r, g, b]` or `[r, g, b, alpha]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "ColorRepr")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, alpha: 0 }
    }

    /// Same color at the given translucency level (clamped to 0-127).
    pub fn with_alpha(self, alpha: u8) -> Self {
        Self {
            alpha: alpha.min(MAX_ALPHA),
            ..self
        }
    }

    /// `#rrggbb`, lowercase. Translucency is not encoded.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// 8-bit channel opacity (255 = opaque).
    pub fn opacity(self) -> u8 {
        let alpha = u32::from(self.alpha.min(MAX_ALPHA));
        (255 - (alpha * 255 + 63) / 127) as u8
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.opacity()])
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("expected #rrggbb, got '{s}'"));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.to_string());
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Hex(String),
    Rgb([u8; 3]),
    Rgba([u8; 4]),
}

impl TryFrom<ColorRepr> for Color {
    type Error = String;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Hex(s) => s.parse(),
            ColorRepr::Rgb([r, g, b]) => Ok(Color::rgb(r, g, b)),
            ColorRepr::Rgba([r, g, b, a]) => {
                if a > MAX_ALPHA {
                    return Err(format!("alpha must be 0-{MAX_ALPHA}, got {a}"));
                }
                Ok(Color::rgb(r, g, b).with_alpha(a))
            }
        }
    }
}

impl From<Color> for ColorRepr {
    fn from(color: Color) -> Self {
        if color.alpha == 0 {
            ColorRepr::Hex(color.to_hex())
        } else {
            ColorRepr::Rgba([color.r, color.g, color.b, color.alpha])
        }
    }
}

/// Anchor used to place overlays (text, watermarks) on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    LeftTop,
    RightTop,
    LeftBottom,
    RightBottom,
    Center,
    CenterTop,
    CenterBottom,
    LeftCenter,
    RightCenter,
    /// Repeating placement. No placement algorithm is defined for it.
    Tile,
}

impl Corner {
    /// Parse the numeric corner constant (1 = LeftTop … 10 = Tile).
    pub fn from_tag(tag: u8) -> Result<Self, ImageError> {
        Ok(match tag {
            1 => Corner::LeftTop,
            2 => Corner::RightTop,
            3 => Corner::LeftBottom,
            4 => Corner::RightBottom,
            5 => Corner::Center,
            6 => Corner::CenterTop,
            7 => Corner::CenterBottom,
            8 => Corner::LeftCenter,
            9 => Corner::RightCenter,
            10 => Corner::Tile,
            other => return Err(ImageError::invalid_enum("corner", other)),
        })
    }
}

/// Mirror axis for [`flip`](super::session::ImageSession::flip).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlipMode {
    Horizontal,
    Vertical,
    Both,
}

impl FlipMode {
    pub fn from_tag(tag: u8) -> Result<Self, ImageError> {
        match tag {
            1 => Ok(FlipMode::Horizontal),
            2 => Ok(FlipMode::Vertical),
            3 => Ok(FlipMode::Both),
            other => Err(ImageError::invalid_enum("flip mode", other)),
        }
    }
}

/// Output codecs. Tags mirror the usual image-type identifiers (1, 2, 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Gif,
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn from_tag(tag: u8) -> Result<Self, ImageError> {
        match tag {
            1 => Ok(ImageFormat::Gif),
            2 => Ok(ImageFormat::Jpeg),
            3 => Ok(ImageFormat::Png),
            other => Err(ImageError::invalid_enum("image format", other)),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            ImageFormat::Gif => 1,
            ImageFormat::Jpeg => 2,
            ImageFormat::Png => 3,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Gif => "image/gif",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    /// Canonical file extension written by the deferred engine.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Gif => "gif",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    /// Coder prefix understood by `convert` (`PNG:out.png`).
    pub fn magick_coder(self) -> &'static str {
        match self {
            ImageFormat::Gif => "GIF",
            ImageFormat::Jpeg => "JPG",
            ImageFormat::Png => "PNG",
        }
    }

    pub(crate) fn from_codec(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Gif => Some(ImageFormat::Gif),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::Png => Some(ImageFormat::Png),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Gif => "gif",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        })
    }
}

impl FromStr for ImageFormat {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gif" => Ok(ImageFormat::Gif),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            other => Err(ImageError::invalid_enum("image format", other)),
        }
    }
}

/// Caller-facing options for [`text`](super::session::ImageSession::text).
#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
    pub text: String,
    /// TrueType/OpenType font file.
    pub font: PathBuf,
    /// Glyph size in pixels.
    pub size: f32,
    pub color: Color,
    pub corner: Corner,
    pub offset: Point,
    /// Counter-clockwise rotation in degrees. Placement uses the box from
    /// [`text_box`](crate::imaging::text_box), which is empty at 90.
    pub angle: f32,
    /// Translucency level, 0 (opaque) to 127.
    pub alpha: u8,
}

impl TextOptions {
    pub fn new(text: impl Into<String>, font: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            font: font.into(),
            size: 12.0,
            color: Color::BLACK,
            corner: Corner::LeftTop,
            offset: Point::default(),
            angle: 0.0,
            alpha: 0,
        }
    }
}

/// Caller-facing options for [`watermark`](super::session::ImageSession::watermark).
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkOptions {
    pub file: PathBuf,
    pub offset: Point,
    pub corner: Corner,
    /// Scale the mark to fit `zoom * max(width, height)` on both axes.
    pub zoom: Option<f64>,
}

impl WatermarkOptions {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            offset: Point::default(),
            corner: Corner::RightBottom,
            zoom: None,
        }
    }
}

/// Caller-facing options for [`save`](super::session::ImageSession::save).
///
/// Unset fields fall back to the session's source path and loaded format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOptions {
    pub path: Option<PathBuf>,
    pub format: Option<ImageFormat>,
    pub quality: Quality,
    /// Copy the source file's modification time onto the written file.
    pub touch: bool,
}

/// Fully resolved watermark placement.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkParams {
    pub source: PathBuf,
    /// Size the mark is drawn at (after zoom).
    pub size: Size,
    pub position: Point,
}

/// Fully resolved text placement.
#[derive(Debug, Clone, Copy)]
pub struct TextParams<'a> {
    pub text: &'a str,
    pub font: &'a Font,
    pub size: f32,
    pub color: Color,
    pub position: Point,
    pub angle: f32,
}

/// Cover-then-crop plan for an adaptive thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbParams {
    pub target: Size,
    /// Intermediate size that covers `target`.
    pub scaled: Size,
    /// Centered region of `scaled`, always exactly `target`.
    pub crop: Rect,
    pub background: Color,
}

/// Shrink-to-fit-canvas plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasParams {
    pub canvas: Size,
    pub content: Size,
    pub position: Point,
    pub background: Color,
}

/// Fully resolved save target.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveParams {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 0);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_75() {
        assert_eq!(Quality::default().value(), 75);
    }

    #[test]
    fn color_hex_is_lowercase_rrggbb() {
        assert_eq!(Color::rgb(255, 0, 16).to_hex(), "#ff0010");
        assert_eq!(Color::BLACK.to_hex(), "#000000");
    }

    #[test]
    fn color_parses_hex() {
        assert_eq!("#FF8000".parse::<Color>().unwrap(), Color::rgb(255, 128, 0));
        assert_eq!("00ff00".parse::<Color>().unwrap(), Color::rgb(0, 255, 0));
        assert!("#fff".parse::<Color>().is_err());
        assert!("#gggggg".parse::<Color>().is_err());
    }

    #[test]
    fn color_opacity_maps_seven_bit_alpha() {
        assert_eq!(Color::BLACK.opacity(), 255);
        assert_eq!(Color::BLACK.with_alpha(127).opacity(), 0);
        assert_eq!(Color::BLACK.with_alpha(200).alpha, 127);
        let half = Color::BLACK.with_alpha(64).opacity();
        assert!((126..=128).contains(&half), "got {half}");
    }

    #[test]
    fn color_deserializes_from_all_forms() {
        #[derive(Deserialize)]
        struct Holder {
            a: Color,
            b: Color,
            c: Color,
        }
        let holder: Holder =
            toml::from_str("a = \"#010203\"\nb = [4, 5, 6]\nc = [7, 8, 9, 100]").unwrap();
        assert_eq!(holder.a, Color::rgb(1, 2, 3));
        assert_eq!(holder.b, Color::rgb(4, 5, 6));
        assert_eq!(holder.c, Color::rgb(7, 8, 9).with_alpha(100));
    }

    #[test]
    fn color_rejects_out_of_range_alpha() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Holder {
            c: Color,
        }
        assert!(toml::from_str::<Holder>("c = [0, 0, 0, 200]").is_err());
    }

    #[test]
    fn corner_tags_cover_all_ten_anchors() {
        assert_eq!(Corner::from_tag(1).unwrap(), Corner::LeftTop);
        assert_eq!(Corner::from_tag(4).unwrap(), Corner::RightBottom);
        assert_eq!(Corner::from_tag(10).unwrap(), Corner::Tile);
        assert!(matches!(
            Corner::from_tag(11),
            Err(ImageError::InvalidEnumValue { .. })
        ));
        assert!(Corner::from_tag(0).is_err());
    }

    #[test]
    fn flip_mode_tags() {
        assert_eq!(FlipMode::from_tag(3).unwrap(), FlipMode::Both);
        assert!(matches!(
            FlipMode::from_tag(4),
            Err(ImageError::InvalidEnumValue { .. })
        ));
    }

    #[test]
    fn format_tags_roundtrip_and_reject_unknown() {
        for format in [ImageFormat::Gif, ImageFormat::Jpeg, ImageFormat::Png] {
            assert_eq!(ImageFormat::from_tag(format.tag()).unwrap(), format);
        }
        assert!(ImageFormat::from_tag(4).is_err());
    }

    #[test]
    fn format_naming() {
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Jpeg.magick_coder(), "JPG");
        assert_eq!(ImageFormat::Png.magick_coder(), "PNG");
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert!("webp".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn text_options_defaults() {
        let opts = TextOptions::new("hello", "/fonts/a.ttf");
        assert_eq!(opts.size, 12.0);
        assert_eq!(opts.color, Color::BLACK);
        assert_eq!(opts.corner, Corner::LeftTop);
        assert_eq!(opts.alpha, 0);
    }

    #[test]
    fn watermark_defaults_to_right_bottom() {
        let opts = WatermarkOptions::new("/mark.png");
        assert_eq!(opts.corner, Corner::RightBottom);
        assert_eq!(opts.zoom, None);
    }
}
