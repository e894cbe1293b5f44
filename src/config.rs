// src/config.rs
//
// NativeEngine configuration: limits plus encoder defaults.
// Values can be overridden from IMAGE_DSL_* environment variables.

use crate::engine::limits::Limits;
use crate::error::{ImageError, Result};
use tracing::debug;

/// JPEG/WebP quality used when Options::quality is 0.
pub const DEFAULT_QUALITY: u8 = 75;

/// PNG compression level used when Options::compression is 0.
pub const DEFAULT_COMPRESSION: u8 = 6;

pub const ENV_MAX_DIMENSION: &str = "IMAGE_DSL_MAX_DIMENSION";
pub const ENV_MAX_PIXELS: &str = "IMAGE_DSL_MAX_PIXELS";
pub const ENV_MAX_BYTES: &str = "IMAGE_DSL_MAX_BYTES";
pub const ENV_QUALITY: &str = "IMAGE_DSL_QUALITY";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub limits: Limits,
    pub default_quality: u8,
    pub default_compression: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            default_quality: DEFAULT_QUALITY,
            default_compression: DEFAULT_COMPRESSION,
        }
    }
}

impl EngineConfig {
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Defaults overridden by any IMAGE_DSL_* variable that is set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_DIMENSION) {
            config.limits.max_dimension = parse_var(ENV_MAX_DIMENSION, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_PIXELS) {
            config.limits.max_pixels = parse_var(ENV_MAX_PIXELS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_BYTES) {
            config.limits.max_bytes = Some(parse_var(ENV_MAX_BYTES, &raw)?);
        }
        if let Some(raw) = lookup(ENV_QUALITY) {
            let quality: u8 = parse_var(ENV_QUALITY, &raw)?;
            if !(1..=100).contains(&quality) {
                return Err(ImageError::invalid_argument(
                    ENV_QUALITY,
                    raw,
                    "quality must be between 1 and 100",
                ));
            }
            config.default_quality = quality;
        }

        debug!(target: "image_dsl::config", ?config, "engine config loaded");
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        ImageError::invalid_argument(name, raw.to_string(), "expected an unsigned integer")
    })
}
