// src/engine/native.rs
//
// NativeEngine: decode -> plan -> apply -> encode, all in-process.

use crate::config::EngineConfig;
use crate::engine::common::EngineResult;
use crate::engine::decoder::{
    decode_image, detect_exif_orientation, detect_image_type, interpretation_for, read_header,
};
use crate::engine::encoder::{encode, EncodeSettings};
use crate::engine::icc::{embed_icc, extract_icc_profile};
use crate::engine::pipeline::{apply_ops, plan_operations};
use crate::engine::Processor;
use crate::error::ImageError;
use crate::options::{ImageMetadata, ImageSize, ImageType, Interpretation, Options};
use crate::pool::BufferPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Default [`Processor`] backed by the `image` ecosystem crates.
///
/// Holds no per-call state, so one engine can serve many handles and threads.
#[derive(Clone, Debug, Default)]
pub struct NativeEngine {
    config: EngineConfig,
    pool: Option<Arc<BufferPool>>,
}

impl NativeEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, pool: None }
    }

    /// Encoder output buffers are taken from `pool`.
    pub fn with_pool(config: EngineConfig, pool: Arc<BufferPool>) -> Self {
        Self {
            config,
            pool: Some(pool),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> Option<&Arc<BufferPool>> {
        self.pool.as_ref()
    }

    fn encode_settings(&self, options: &Options) -> EncodeSettings {
        EncodeSettings {
            quality: match options.quality {
                0 => self.config.default_quality,
                q => q.min(100),
            },
            compression: match options.compression {
                0 => self.config.default_compression,
                c => c.min(9),
            },
            interlace: options.interlace,
            lossless: options.lossless,
        }
    }

    fn check_requested_dimensions(&self, options: &Options) -> EngineResult<()> {
        if options.width == 0 && options.height == 0 {
            return Ok(());
        }
        self.config
            .limits
            .check_dimensions(options.width.max(1), options.height.max(1))
    }

    fn header_of(&self, buf: &[u8]) -> EngineResult<crate::engine::decoder::Header> {
        self.config.limits.enforce_source_len(buf.len())?;
        read_header(buf)
    }
}

impl Processor for NativeEngine {
    fn resize(&self, buf: &[u8], options: &Options) -> EngineResult<Vec<u8>> {
        let started = Instant::now();
        let limits = &self.config.limits;
        limits.enforce_source_len(buf.len())?;

        let source_type = detect_image_type(buf);
        if source_type == ImageType::Unknown {
            return Err(ImageError::unsupported_format(source_type.name()));
        }
        let target_type = options.output_type.unwrap_or(source_type);
        self.check_requested_dimensions(options)?;

        let (img, _) = decode_image(buf, limits)?;
        let orientation = if options.no_auto_rotate {
            None
        } else {
            detect_exif_orientation(buf)
        };

        let ops = plan_operations(options, img.width(), img.height(), orientation, limits)?;
        let img = apply_ops(img, &ops)?;
        limits.check_dimensions(img.width(), img.height())?;

        let settings = self.encode_settings(options);
        let pool = self.pool.as_deref();
        let encoded = encode(&img, target_type, &settings, pool)?;

        let icc = if options.strip_metadata {
            None
        } else {
            extract_icc_profile(buf)
        };
        let output = match icc {
            Some(icc) => match embed_icc(target_type, &encoded, &icc, pool)? {
                Some(tagged) => {
                    if let Some(pool) = pool {
                        pool.release(encoded);
                    }
                    tagged
                }
                None => encoded,
            },
            None => encoded,
        };

        debug!(
            target: "image_dsl::engine",
            from = source_type.name(),
            to = target_type.name(),
            ops = ops.len(),
            input_bytes = buf.len(),
            output_bytes = output.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "processed image"
        );
        Ok(output)
    }

    fn metadata(&self, buf: &[u8]) -> EngineResult<ImageMetadata> {
        let header = self.header_of(buf)?;
        Ok(ImageMetadata {
            orientation: detect_exif_orientation(buf).unwrap_or(0),
            channels: header.color.channel_count(),
            alpha: header.color.has_alpha(),
            profile: extract_icc_profile(buf).is_some(),
            image_type: header.image_type,
            space: interpretation_for(header.color),
            size: ImageSize {
                width: header.width,
                height: header.height,
            },
        })
    }

    fn size(&self, buf: &[u8]) -> EngineResult<ImageSize> {
        let header = self.header_of(buf)?;
        Ok(ImageSize {
            width: header.width,
            height: header.height,
        })
    }

    fn interpretation(&self, buf: &[u8]) -> EngineResult<Interpretation> {
        Ok(interpretation_for(self.header_of(buf)?.color))
    }

    fn colourspace_is_supported(&self, buf: &[u8]) -> EngineResult<bool> {
        let space = self.interpretation(buf)?;
        Ok(!matches!(
            space,
            Interpretation::Multiband | Interpretation::Error
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::limits::Limits;
    use crate::options::{Angle, Gravity};
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_with(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 50]));
        encode_with(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 60, 30]));
        encode_with(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
    }

    fn decoded(buf: &[u8]) -> DynamicImage {
        image::load_from_memory(buf).unwrap()
    }

    #[test]
    fn resize_keeps_source_type() {
        let engine = NativeEngine::default();
        let out = engine.resize(&jpeg(200, 100), &Options::resize(100, 100)).unwrap();
        assert_eq!(detect_image_type(&out), ImageType::Jpeg);
        assert_eq!(decoded(&out).dimensions(), (100, 100));
    }

    #[test]
    fn small_image_resize_pads_to_box() {
        let engine = NativeEngine::default();
        let out = engine.resize(&png(4, 4), &Options::resize(100, 100)).unwrap();
        assert_eq!(
            engine.size(&out).unwrap(),
            ImageSize {
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn convert_changes_container() {
        let engine = NativeEngine::default();
        let out = engine
            .resize(&png(10, 10), &Options::convert(ImageType::Webp))
            .unwrap();
        assert_eq!(detect_image_type(&out), ImageType::Webp);
        assert_eq!(decoded(&out).dimensions(), (10, 10));
    }

    #[test]
    fn convert_to_unsupported_target_fails() {
        let engine = NativeEngine::default();
        let err = engine
            .resize(&png(10, 10), &Options::convert(ImageType::Avif))
            .unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat { .. }));
    }

    #[test]
    fn unknown_input_is_rejected() {
        let engine = NativeEngine::default();
        let err = engine
            .resize(b"definitely not an image", &Options::default())
            .unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat { .. }));
        assert!(engine.size(b"").is_err());
    }

    #[test]
    fn limits_are_enforced() {
        let config = EngineConfig::default().with_limits(Limits::custom(64, 64 * 64, Some(1 << 20)));
        let engine = NativeEngine::new(config);
        let err = engine.resize(&png(65, 2), &Options::default()).unwrap_err();
        assert!(matches!(err, ImageError::DimensionExceedsLimit { .. }));

        let err = engine
            .resize(&png(8, 8), &Options::enlarge(1000, 1000))
            .unwrap_err();
        assert!(matches!(err, ImageError::DimensionExceedsLimit { .. }));

        let tiny = NativeEngine::new(
            EngineConfig::default().with_limits(Limits::custom(64, 4096, Some(16))),
        );
        let err = tiny.resize(&png(8, 8), &Options::default()).unwrap_err();
        assert!(matches!(err, ImageError::InputTooLarge { .. }));
    }

    #[test]
    fn smart_crop_and_gravity_crop_hit_the_box() {
        let engine = NativeEngine::default();
        let out = engine.resize(&png(300, 200), &Options::smart_crop(50, 50)).unwrap();
        assert_eq!(decoded(&out).dimensions(), (50, 50));
        let out = engine
            .resize(&png(300, 200), &Options::crop(80, 40, Gravity::East))
            .unwrap();
        assert_eq!(decoded(&out).dimensions(), (80, 40));
    }

    #[test]
    fn rotate_swaps_dimensions() {
        let engine = NativeEngine::default();
        let out = engine
            .resize(&png(30, 10), &Options::rotate(Angle::D270))
            .unwrap();
        assert_eq!(decoded(&out).dimensions(), (10, 30));
    }

    #[test]
    fn quality_defaults_come_from_config() {
        let engine = NativeEngine::new(EngineConfig {
            default_quality: 42,
            ..EngineConfig::default()
        });
        let settings = engine.encode_settings(&Options::default());
        assert_eq!(settings.quality, 42);
        assert_eq!(settings.compression, crate::config::DEFAULT_COMPRESSION);
        let settings = engine.encode_settings(&Options::thumbnail(10));
        assert_eq!(settings.quality, 95);
    }

    #[test]
    fn icc_profile_survives_unless_stripped() {
        let engine = NativeEngine::default();
        let icc = crate::engine::icc::test_icc_profile(200);
        let source = embed_icc(ImageType::Png, &png(20, 20), &icc, None)
            .unwrap()
            .unwrap();
        assert!(engine.metadata(&source).unwrap().profile);

        let kept = engine.resize(&source, &Options::resize(10, 10)).unwrap();
        assert_eq!(extract_icc_profile(&kept), Some(icc));

        let stripped = engine
            .resize(
                &source,
                &Options {
                    strip_metadata: true,
                    ..Options::resize(10, 10)
                },
            )
            .unwrap();
        assert!(extract_icc_profile(&stripped).is_none());
    }

    #[test]
    fn header_inspection() {
        let engine = NativeEngine::default();
        let rgba = RgbaImage::from_pixel(7, 5, Rgba([1, 2, 3, 4]));
        let buf = encode_with(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let meta = engine.metadata(&buf).unwrap();
        assert_eq!(meta.size, ImageSize { width: 7, height: 5 });
        assert_eq!(meta.channels, 4);
        assert!(meta.alpha);
        assert!(!meta.profile);
        assert_eq!(meta.orientation, 0);
        assert_eq!(meta.image_type, ImageType::Png);
        assert_eq!(meta.space, Interpretation::Srgb);
        assert!(engine.colourspace_is_supported(&buf).unwrap());
        assert_eq!(engine.image_type(&buf), ImageType::Png);
    }

    #[test]
    fn grey_png_reports_bw() {
        let engine = NativeEngine::default();
        let grey = DynamicImage::ImageLuma8(image::GrayImage::new(3, 3));
        let buf = encode_with(grey, ImageFormat::Png);
        assert_eq!(engine.interpretation(&buf).unwrap(), Interpretation::BW);
    }

    #[test]
    fn pooled_engine_still_encodes() {
        let pool = Arc::new(BufferPool::new());
        let engine = NativeEngine::with_pool(EngineConfig::default(), Arc::clone(&pool));
        let out = engine.resize(&jpeg(40, 40), &Options::resize(20, 20)).unwrap();
        assert_eq!(decoded(&out).dimensions(), (20, 20));
        assert!(engine.pool().is_some());
    }

    #[test]
    fn pooled_engine_recycles_untagged_jpeg() {
        let icc = crate::engine::icc::test_icc_profile(200);
        let source = embed_icc(ImageType::Jpeg, &jpeg(40, 40), &icc, None)
            .unwrap()
            .unwrap();
        let pool = Arc::new(BufferPool::new());
        let engine = NativeEngine::with_pool(EngineConfig::default(), Arc::clone(&pool));

        let out = engine.resize(&source, &Options::resize(20, 20)).unwrap();
        assert_eq!(extract_icc_profile(&out), Some(icc.clone()));
        // The mozjpeg output was copied into a tagged buffer and handed back.
        assert_eq!(pool.len(), 1);

        // Both idle buffers are reused; only the untagged one comes back.
        pool.release(out);
        let again = engine.resize(&source, &Options::resize(20, 20)).unwrap();
        assert_eq!(extract_icc_profile(&again), Some(icc));
        assert_eq!(pool.len(), 1);
    }
}
