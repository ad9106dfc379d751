//! # Image Handler
//!
//! Load a GIF, JPEG or PNG, chain transforms on it, and write the result.
//!
//! ```text
//! load ──► resize / thumb / crop / flip / rotate / grayscale
//!          text / watermark / adaptive_thumb / resize_canvas ──► save | show
//! ```
//!
//! # Two Engines, One Geometry
//!
//! Every transform goes through an [`ImageSession`](imaging::ImageSession),
//! which computes sizes, crop regions and anchor positions itself and only
//! then hands the resolved values to an engine:
//!
//! - **raster** decodes the image into memory with the `image` crate and
//!   applies each call immediately.
//! - **magick** builds an ImageMagick `convert` command line instead and runs
//!   it when the result is saved. Each transform *replaces* the pending
//!   command, so only the last transform before a save takes effect. Save
//!   between steps to compose them.
//!
//! Both engines see the same numbers, so a recipe lands pixels in the same
//! places whichever engine runs it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Session, geometry, the two engines and the error taxonomy |
//! | [`config`] | `HandlerConfig` TOML loading, merging and validation |
//! | [`recipe`] | Ordered transform lists read from TOML, applied to a session |
//!
//! # Errors
//!
//! Every fallible call returns a `Result`. A failure stops the chain and
//! leaves the session in the state the last successful call produced.

pub mod config;
pub mod imaging;
pub mod recipe;

#[cfg(test)]
pub(crate) mod test_helpers;
