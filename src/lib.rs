// lib.rs
//
// image-dsl: a fluent, chainable image transformation API.
//
// Design goals:
// - One handle per encoded image, replaced wholesale by each transform
// - Failed transforms never corrupt the handle
// - Processing behind a narrow trait so the facade can run on any engine
// - Buffer reuse through an explicit, bounded pool

//! Fluent image transformations over encoded buffers.
//!
//! ```no_run
//! use image_dsl::{file, Gravity, Image};
//!
//! # fn main() -> image_dsl::Result<()> {
//! let mut image = Image::new(file::read("photo.jpg")?);
//! image.resize(800, 600)?;
//! image.crop(400, 400, Gravity::North)?;
//! file::write("out.jpg", image.image())?;
//!
//! // Several steps, committed only if all of them succeed
//! image.pipeline().thumbnail(200).flop().run()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod file;
pub mod ops;
pub mod options;
pub mod pool;

pub use config::EngineConfig;
pub use dsl::{Image, Pipeline};
pub use engine::{Limits, NativeEngine, Processor};
pub use error::{ErrorCategory, ImageError, Result};
pub use options::{
    Angle, Color, Extend, Gravity, ImageMetadata, ImageSize, ImageType, Interpolator,
    Interpretation, Options, EXTRACT_TOP_UNSET, THUMBNAIL_QUALITY,
};
pub use pool::BufferPool;

/// Detect the container type of an encoded buffer by its magic bytes.
pub fn determine_image_type(buf: &[u8]) -> ImageType {
    engine::detect_image_type(buf)
}

/// Lower-case name of [`determine_image_type`], `"unknown"` when unrecognised.
pub fn determine_image_type_name(buf: &[u8]) -> &'static str {
    determine_image_type(buf).name()
}
