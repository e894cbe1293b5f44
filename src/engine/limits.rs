// src/engine/limits.rs
//
// Input limits enforced by NativeEngine before and after decoding.

use crate::error::ImageError;

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_PIXELS: u64 = 75_000_000;
const STRICT_MAX_BYTES: u64 = 32 * 1024 * 1024;
const LENIENT_MAX_BYTES: u64 = 48 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitPolicy {
    Default,
    Strict,
    Lenient,
    Custom,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub policy: LimitPolicy,
    pub max_dimension: u32,
    pub max_pixels: u64,
    /// Encoded input size cap; `None` disables the check
    pub max_bytes: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            policy: LimitPolicy::Default,
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
            max_bytes: None,
        }
    }
}

impl Limits {
    pub fn strict() -> Self {
        Self {
            policy: LimitPolicy::Strict,
            max_dimension: MAX_DIMENSION,
            max_pixels: STRICT_MAX_PIXELS,
            max_bytes: Some(STRICT_MAX_BYTES),
        }
    }

    pub fn lenient() -> Self {
        Self {
            policy: LimitPolicy::Lenient,
            max_dimension: MAX_DIMENSION,
            max_pixels: LENIENT_MAX_PIXELS,
            max_bytes: Some(LENIENT_MAX_BYTES),
        }
    }

    pub fn custom(max_dimension: u32, max_pixels: u64, max_bytes: Option<u64>) -> Self {
        Self {
            policy: LimitPolicy::Custom,
            max_dimension,
            max_pixels,
            max_bytes,
        }
    }

    pub fn apply_policy(policy: LimitPolicy) -> Self {
        match policy {
            LimitPolicy::Default | LimitPolicy::Custom => Self::default(),
            LimitPolicy::Strict => Self::strict(),
            LimitPolicy::Lenient => Self::lenient(),
        }
    }

    pub fn enforce_source_len(&self, len: usize) -> Result<(), ImageError> {
        if let Some(limit) = self.max_bytes {
            let len_u64 = len as u64;
            if len_u64 > limit {
                return Err(ImageError::input_too_large(len_u64, limit));
            }
        }
        Ok(())
    }

    /// Reject images whose dimensions exceed the limits.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), ImageError> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(ImageError::dimension_exceeds_limit(
                width.max(height),
                self.max_dimension,
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_pixels {
            return Err(ImageError::pixel_count_exceeds_limit(pixels, self.max_pixels));
        }
        Ok(())
    }
}
