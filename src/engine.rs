// src/engine.rs
//
// The processing side of image-dsl:
// 1. `Processor` is the narrow capability interface the Image handle consumes
// 2. `NativeEngine` implements it with decode -> plan -> apply -> encode
//
// This file is a facade over the modules in engine/

use crate::error::Result;
use crate::options::{ImageMetadata, ImageSize, ImageType, Interpretation, Options};
use std::sync::Arc;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod common;
pub mod decoder;
pub mod encoder;
pub mod icc;
pub mod limits;
mod native;
pub mod pipeline;

pub use decoder::{detect_exif_orientation, detect_image_type, Header};
pub use encoder::{EncodeSettings, QualitySettings};
pub use icc::extract_icc_profile;
pub use limits::{LimitPolicy, Limits, MAX_DIMENSION, MAX_PIXELS};
pub use native::NativeEngine;
pub use pipeline::{
    apply_ops, calc_cover_resize_dimensions, calc_resize_dimensions, fast_resize_owned,
    gravity_offset, plan_operations, ResizeError,
};

// =============================================================================
// PROCESSOR
// =============================================================================

/// Everything the Image handle needs from an image library.
///
/// Implementations must not keep references to the input buffer past the
/// call. `resize` returns a new, complete encoded image.
pub trait Processor {
    /// Apply `options` to `buf` and return the re-encoded result.
    fn resize(&self, buf: &[u8], options: &Options) -> Result<Vec<u8>>;

    fn metadata(&self, buf: &[u8]) -> Result<ImageMetadata>;

    fn size(&self, buf: &[u8]) -> Result<ImageSize>;

    fn interpretation(&self, buf: &[u8]) -> Result<Interpretation>;

    fn colourspace_is_supported(&self, buf: &[u8]) -> Result<bool>;

    /// Container type by magic bytes. Never fails; unknown data is
    /// [`ImageType::Unknown`].
    fn image_type(&self, buf: &[u8]) -> ImageType {
        detect_image_type(buf)
    }
}

impl<P: Processor + ?Sized> Processor for &P {
    fn resize(&self, buf: &[u8], options: &Options) -> Result<Vec<u8>> {
        (**self).resize(buf, options)
    }

    fn metadata(&self, buf: &[u8]) -> Result<ImageMetadata> {
        (**self).metadata(buf)
    }

    fn size(&self, buf: &[u8]) -> Result<ImageSize> {
        (**self).size(buf)
    }

    fn interpretation(&self, buf: &[u8]) -> Result<Interpretation> {
        (**self).interpretation(buf)
    }

    fn colourspace_is_supported(&self, buf: &[u8]) -> Result<bool> {
        (**self).colourspace_is_supported(buf)
    }

    fn image_type(&self, buf: &[u8]) -> ImageType {
        (**self).image_type(buf)
    }
}

impl<P: Processor + ?Sized> Processor for Arc<P> {
    fn resize(&self, buf: &[u8], options: &Options) -> Result<Vec<u8>> {
        (**self).resize(buf, options)
    }

    fn metadata(&self, buf: &[u8]) -> Result<ImageMetadata> {
        (**self).metadata(buf)
    }

    fn size(&self, buf: &[u8]) -> Result<ImageSize> {
        (**self).size(buf)
    }

    fn interpretation(&self, buf: &[u8]) -> Result<Interpretation> {
        (**self).interpretation(buf)
    }

    fn colourspace_is_supported(&self, buf: &[u8]) -> Result<bool> {
        (**self).colourspace_is_supported(buf)
    }

    fn image_type(&self, buf: &[u8]) -> ImageType {
        (**self).image_type(buf)
    }
}
