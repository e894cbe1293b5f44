// src/engine/encoder.rs
//
// Encoders: JPEG (mozjpeg), PNG (image + oxipng), WebP (libwebp), GIF/TIFF (image)

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::error::ImageError;
use crate::options::ImageType;
use crate::pool::BufferPool;
use image::{DynamicImage, ImageFormat};
use mozjpeg::{ColorSpace, Compress, ScanMode};
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// Quality bands shared by the lossy encoders. WebP filter strength keeps its
/// own 80/60 thresholds.
#[derive(Debug, Clone, Copy)]
pub struct QualitySettings {
    quality: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QualityBand {
    High,
    Balanced,
    Fast,
    Fastest,
}

impl QualitySettings {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100) as f32,
        }
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    fn band(&self) -> QualityBand {
        if self.quality >= 85.0 {
            QualityBand::High
        } else if self.quality >= 70.0 {
            QualityBand::Balanced
        } else if self.quality >= 50.0 {
            QualityBand::Fast
        } else {
            QualityBand::Fastest
        }
    }

    pub fn jpeg_smoothing(&self) -> u8 {
        match self.band() {
            QualityBand::High if self.quality >= 90.0 => 0,
            QualityBand::High | QualityBand::Balanced => 5,
            QualityBand::Fast if self.quality >= 60.0 => 10,
            QualityBand::Fast | QualityBand::Fastest => 18,
        }
    }

    pub fn webp_sns_strength(&self) -> i32 {
        match self.band() {
            QualityBand::High => 50,
            QualityBand::Balanced => 70,
            QualityBand::Fast | QualityBand::Fastest => 80,
        }
    }

    pub fn webp_filter_strength(&self) -> i32 {
        if self.quality >= 80.0 {
            20
        } else if self.quality >= 60.0 {
            30
        } else {
            40
        }
    }

    pub fn webp_filter_sharpness(&self) -> i32 {
        match self.band() {
            QualityBand::High => 2,
            QualityBand::Balanced | QualityBand::Fast | QualityBand::Fastest => 0,
        }
    }
}

/// Per-call encoder knobs, resolved from Options and EngineConfig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    /// 1-100
    pub quality: u8,
    /// zlib-style level 0-9
    pub compression: u8,
    pub interlace: bool,
    pub lossless: bool,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            quality: crate::config::DEFAULT_QUALITY,
            compression: crate::config::DEFAULT_COMPRESSION,
            interlace: false,
            lossless: false,
        }
    }
}

/// Encode `img` as `image_type`.
pub fn encode(
    img: &DynamicImage,
    image_type: ImageType,
    settings: &EncodeSettings,
    pool: Option<&BufferPool>,
) -> EngineResult<Vec<u8>> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ImageError::encode_failed(
            image_type.name(),
            "image has a zero dimension",
        ));
    }
    debug!(
        target: "image_dsl::encoder",
        format = image_type.name(),
        quality = settings.quality,
        width = img.width(),
        height = img.height(),
        "encoding"
    );
    match image_type {
        ImageType::Jpeg => encode_jpeg(img, settings, pool),
        ImageType::Png => encode_png(img, settings),
        ImageType::Webp => encode_webp(img, settings),
        ImageType::Gif => encode_with_image_crate(img, ImageFormat::Gif, "gif"),
        ImageType::Tiff => encode_with_image_crate(img, ImageFormat::Tiff, "tiff"),
        other => Err(ImageError::unsupported_format(other.name())),
    }
}

/// Encode to JPEG using mozjpeg. Progressive scans when `interlace` is set.
pub fn encode_jpeg(
    img: &DynamicImage,
    settings: &EncodeSettings,
    pool: Option<&BufferPool>,
) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let rgb: Cow<'_, image::RgbImage> = match img {
            DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
            _ => Cow::Owned(img.to_rgb8()),
        };
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        let expected_len = (w as usize) * (h as usize) * 3;
        if pixels.len() != expected_len {
            return Err(ImageError::corrupted_image());
        }

        let quality = QualitySettings::new(settings.quality);
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(quality.quality());
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));

        if settings.interlace {
            comp.set_progressive_mode();
            comp.set_optimize_scans(true);
            comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);
        } else {
            comp.set_optimize_scans(false);
        }
        comp.set_optimize_coding(true);
        comp.set_smoothing_factor(quality.jpeg_smoothing());

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = match pool {
            Some(pool) => pool.acquire(estimated_size),
            None => Vec::with_capacity(estimated_size),
        };

        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                ImageError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
            })?;

            let stride = w as usize * 3;
            for row in pixels.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    ImageError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                ImageError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }

        Ok(output)
    })
}

/// Map a zlib-style level (0-9) onto an oxipng preset (0-6).
fn oxipng_preset(compression: u8) -> u8 {
    (compression.min(9) as u32 * 6 / 9) as u8
}

/// Encode to PNG with the image crate, then recompress losslessly with oxipng.
pub fn encode_png(img: &DynamicImage, settings: &EncodeSettings) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| ImageError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let mut options = oxipng::Options::from_preset(oxipng_preset(settings.compression));
        // ICC is handled separately; keep everything else as written
        options.strip = oxipng::StripChunks::None;

        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            ImageError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode to WebP with libwebp. Alpha is kept only when the image has it.
pub fn encode_webp(img: &DynamicImage, settings: &EncodeSettings) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let (w, h) = (img.width(), img.height());
        let pixels: Cow<'_, [u8]>;
        let encoder = if img.color().has_alpha() {
            pixels = match img {
                DynamicImage::ImageRgba8(rgba) => Cow::Borrowed(rgba.as_raw().as_slice()),
                _ => Cow::Owned(img.to_rgba8().into_raw()),
            };
            webp::Encoder::from_rgba(&pixels, w, h)
        } else {
            pixels = match img {
                DynamicImage::ImageRgb8(rgb) => Cow::Borrowed(rgb.as_raw().as_slice()),
                _ => Cow::Owned(img.to_rgb8().into_raw()),
            };
            webp::Encoder::from_rgb(&pixels, w, h)
        };

        let mut config = webp::WebPConfig::new()
            .map_err(|_| ImageError::internal_panic("failed to create WebPConfig"))?;

        let quality = QualitySettings::new(settings.quality);
        config.quality = quality.quality();
        config.method = 4;
        config.pass = 1;
        config.preprocessing = 0;
        config.sns_strength = quality.webp_sns_strength();
        config.autofilter = 1;
        config.filter_strength = quality.webp_filter_strength();
        config.filter_sharpness = quality.webp_filter_sharpness();
        if settings.lossless {
            config.lossless = 1;
        }

        let mem = encoder.encode_advanced(&config).map_err(|e| {
            ImageError::encode_failed("webp", format!("WebP encode failed: {e:?}"))
        })?;

        Ok(mem.to_vec())
    })
}

fn encode_with_image_crate(
    img: &DynamicImage,
    format: ImageFormat,
    name: &'static str,
) -> EngineResult<Vec<u8>> {
    run_with_panic_policy("encode:image", || {
        let img: Cow<'_, DynamicImage> = match (format, img) {
            // GIF frames are RGBA8
            (ImageFormat::Gif, DynamicImage::ImageRgba8(_)) => Cow::Borrowed(img),
            (ImageFormat::Gif, _) => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
            _ => Cow::Borrowed(img),
        };
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .map_err(|e| ImageError::encode_failed(name, format!("{e}")))?;
        Ok(buf)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decoder::detect_image_type;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn create_test_image_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 200])
        }))
    }

    fn settings(quality: u8) -> EncodeSettings {
        EncodeSettings {
            quality,
            ..EncodeSettings::default()
        }
    }

    mod quality_tests {
        use super::*;

        #[test]
        fn test_quality_is_clamped() {
            assert_eq!(QualitySettings::new(0).quality(), 1.0);
            assert_eq!(QualitySettings::new(250).quality(), 100.0);
        }

        #[test]
        fn test_bands() {
            assert_eq!(QualitySettings::new(95).jpeg_smoothing(), 0);
            assert_eq!(QualitySettings::new(85).jpeg_smoothing(), 5);
            assert_eq!(QualitySettings::new(75).jpeg_smoothing(), 5);
            assert_eq!(QualitySettings::new(65).jpeg_smoothing(), 10);
            assert_eq!(QualitySettings::new(30).jpeg_smoothing(), 18);
            assert_eq!(QualitySettings::new(90).webp_sns_strength(), 50);
            assert_eq!(QualitySettings::new(40).webp_filter_strength(), 40);
        }

        #[test]
        fn test_oxipng_preset_mapping() {
            assert_eq!(oxipng_preset(0), 0);
            assert_eq!(oxipng_preset(6), 4);
            assert_eq!(oxipng_preset(9), 6);
            assert_eq!(oxipng_preset(200), 6);
        }
    }

    mod encode_tests {
        use super::*;

        #[test]
        fn test_encode_jpeg_produces_valid_jpeg() {
            let result = encode_jpeg(&create_test_image(100, 100), &settings(80), None).unwrap();
            assert_eq!(&result[0..2], &[0xFF, 0xD8]);
            assert_eq!(&result[result.len() - 2..], &[0xFF, 0xD9]);
        }

        #[test]
        fn test_encode_jpeg_progressive() {
            let progressive = EncodeSettings {
                interlace: true,
                ..settings(80)
            };
            let result = encode_jpeg(&create_test_image(64, 64), &progressive, None).unwrap();
            // SOF2 marks a progressive frame
            assert!(result.windows(2).any(|m| m == [0xFF, 0xC2]));
            let decoded = image::load_from_memory(&result).unwrap();
            assert_eq!(decoded.dimensions(), (64, 64));
        }

        #[test]
        fn test_encode_jpeg_into_pooled_buffer() {
            let pool = BufferPool::new();
            let result =
                encode_jpeg(&create_test_image(32, 32), &settings(70), Some(&pool)).unwrap();
            assert_eq!(&result[0..2], &[0xFF, 0xD8]);
        }

        #[test]
        fn test_encode_jpeg_drops_alpha() {
            let result = encode_jpeg(&create_test_image_rgba(10, 10), &settings(80), None).unwrap();
            let decoded = image::load_from_memory(&result).unwrap();
            assert!(!decoded.color().has_alpha());
        }

        #[test]
        fn test_encode_png_roundtrip() {
            let img = create_test_image(50, 40);
            let result = encode_png(&img, &EncodeSettings::default()).unwrap();
            assert_eq!(&result[0..4], &[0x89, 0x50, 0x4E, 0x47]);
            let decoded = image::load_from_memory(&result).unwrap();
            assert_eq!(decoded.to_rgb8().into_raw(), img.to_rgb8().into_raw());
        }

        #[test]
        fn test_encode_png_preserves_alpha() {
            let result = encode_png(&create_test_image_rgba(8, 8), &EncodeSettings::default())
                .unwrap();
            let decoded = image::load_from_memory(&result).unwrap();
            assert!(decoded.color().has_alpha());
        }

        #[test]
        fn test_encode_webp_lossy_and_lossless() {
            let img = create_test_image(40, 30);
            let lossy = encode_webp(&img, &settings(80)).unwrap();
            assert_eq!(detect_image_type(&lossy), ImageType::Webp);

            let lossless = EncodeSettings {
                lossless: true,
                ..settings(80)
            };
            let exact = encode_webp(&img, &lossless).unwrap();
            let decoded = image::load_from_memory(&exact).unwrap();
            assert_eq!(decoded.to_rgb8().into_raw(), img.to_rgb8().into_raw());
        }

        #[test]
        fn test_encode_webp_with_alpha() {
            let result = encode_webp(&create_test_image_rgba(16, 16), &settings(80)).unwrap();
            let decoded = image::load_from_memory(&result).unwrap();
            assert_eq!(decoded.dimensions(), (16, 16));
        }

        #[test]
        fn test_encode_dispatches_gif_and_tiff() {
            let img = create_test_image(6, 6);
            let gif = encode(&img, ImageType::Gif, &EncodeSettings::default(), None).unwrap();
            assert_eq!(detect_image_type(&gif), ImageType::Gif);
            let tiff = encode(&img, ImageType::Tiff, &EncodeSettings::default(), None).unwrap();
            assert_eq!(detect_image_type(&tiff), ImageType::Tiff);
        }

        #[test]
        fn test_encode_rejects_unsupported_targets() {
            let img = create_test_image(4, 4);
            for target in [ImageType::Avif, ImageType::Heif, ImageType::Pdf, ImageType::Unknown] {
                let err = encode(&img, target, &EncodeSettings::default(), None).unwrap_err();
                assert!(matches!(err, ImageError::UnsupportedFormat { .. }));
            }
        }

        #[test]
        fn test_encode_rejects_empty_image() {
            let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
            let err = encode(&img, ImageType::Png, &EncodeSettings::default(), None).unwrap_err();
            assert!(matches!(err, ImageError::EncodeFailed { .. }));
        }
    }
}
