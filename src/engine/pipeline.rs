// src/engine/pipeline.rs
//
// Pipeline: plan operations from Options, apply them, resize calculations

use crate::engine::limits::Limits;
use crate::error::ImageError;
use crate::ops::Operation;
use crate::options::{Angle, Color, Extend, Gravity, Interpolator, Options};
use fast_image_resize::{self as fir, PixelType, ResizeOptions};
use image::{imageops::FilterType, DynamicImage, Rgba, RgbImage, RgbaImage};
use tracing::{debug, trace};

// Always ImageError so pipeline failures keep their category.
type PipelineResult<T> = std::result::Result<T, ImageError>;

#[derive(Debug)]
pub struct ResizeError {
    pub source_dims: (u32, u32),
    pub target_dims: (u32, u32),
    pub reason: String,
}

impl ResizeError {
    pub fn new(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_dims,
            target_dims,
            reason: reason.into(),
        }
    }

    pub fn into_image_error(self) -> ImageError {
        ImageError::resize_failed(self.source_dims, self.target_dims, self.reason)
    }
}

/// Calculate resize dimensions maintaining aspect ratio (fit = inside semantics)
pub fn calc_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    target_w: Option<u32>,
    target_h: Option<u32>,
) -> (u32, u32) {
    let (w, h) = match (target_w, target_h) {
        (Some(w), Some(h)) => {
            let orig_ratio = orig_w as f64 / orig_h as f64;
            let target_ratio = w as f64 / h as f64;

            if orig_ratio > target_ratio {
                // wider than the box: fit to width
                let ratio = w as f64 / orig_w as f64;
                (w, (orig_h as f64 * ratio).round() as u32)
            } else {
                let ratio = h as f64 / orig_h as f64;
                ((orig_w as f64 * ratio).round() as u32, h)
            }
        }
        (Some(w), None) => {
            let ratio = w as f64 / orig_w as f64;
            (w, (orig_h as f64 * ratio).round() as u32)
        }
        (None, Some(h)) => {
            let ratio = h as f64 / orig_h as f64;
            ((orig_w as f64 * ratio).round() as u32, h)
        }
        (None, None) => (orig_w, orig_h),
    };
    (w.max(1), h.max(1))
}

/// Smallest size covering `target_w x target_h` while keeping aspect ratio.
pub fn calc_cover_resize_dimensions(
    orig_w: u32,
    orig_h: u32,
    target_w: u32,
    target_h: u32,
) -> (u32, u32) {
    if orig_w == 0 || orig_h == 0 {
        return (target_w.max(1), target_h.max(1));
    }
    let scale_w = target_w as f64 / orig_w as f64;
    let scale_h = target_h as f64 / orig_h as f64;
    let scale = scale_w.max(scale_h);
    let resize_w = ((orig_w as f64 * scale).ceil() as u32).max(1);
    let resize_h = ((orig_h as f64 * scale).ceil() as u32).max(1);
    (resize_w, resize_h)
}

/// Top-left corner of a `crop_w x crop_h` window anchored by `gravity`.
pub fn gravity_offset(
    img_w: u32,
    img_h: u32,
    crop_w: u32,
    crop_h: u32,
    gravity: Gravity,
) -> (u32, u32) {
    let spare_w = img_w.saturating_sub(crop_w);
    let spare_h = img_h.saturating_sub(crop_h);
    match gravity {
        Gravity::North => (spare_w / 2, 0),
        Gravity::South => (spare_w / 2, spare_h),
        Gravity::East => (spare_w, spare_h / 2),
        Gravity::West => (0, spare_h / 2),
        // No saliency detection; smart crops anchor at the centre.
        Gravity::Centre | Gravity::Smart => (spare_w / 2, spare_h / 2),
    }
}

fn validate_resize_dimensions(width: u32, height: u32) -> PipelineResult<()> {
    if width == 0 || height == 0 {
        return Err(ImageError::invalid_resize_dimensions(width, height));
    }
    Ok(())
}

/// Fill in a missing target dimension from the source aspect ratio.
fn complete_target(src_w: u32, src_h: u32, width: u32, height: u32) -> (u32, u32) {
    match (width, height) {
        (0, 0) => (src_w, src_h),
        (w, 0) => calc_resize_dimensions(src_w, src_h, Some(w), None),
        (0, h) => calc_resize_dimensions(src_w, src_h, None, Some(h)),
        (w, h) => (w, h),
    }
}

/// Turn an Options record into the ordered list of pixel operations.
///
/// `width`/`height` are the stored dimensions of the decoded image and
/// `orientation` its EXIF orientation, if any. Every size the plan resamples
/// or pads to is checked against `limits` before anything is allocated.
pub fn plan_operations(
    options: &Options,
    width: u32,
    height: u32,
    orientation: Option<u16>,
    limits: &Limits,
) -> PipelineResult<Vec<Operation>> {
    let mut ops = Vec::new();
    let (mut cur_w, mut cur_h) = (width, height);

    if !options.no_auto_rotate {
        if let Some(orientation) = orientation.filter(|o| (2..=8).contains(o)) {
            ops.push(Operation::AutoOrient { orientation });
            if orientation >= 5 {
                std::mem::swap(&mut cur_w, &mut cur_h);
            }
        }
    }
    if options.auto_rotate_only {
        return Ok(ops);
    }

    if options.wants_extract() {
        let (area_w, area_h) = (options.area_width, options.area_height);
        if area_w == 0 || area_h == 0 {
            return Err(ImageError::invalid_extract_area(area_w, area_h));
        }
        let x = options.left.max(0) as u32;
        let y = options.top.max(0) as u32;
        if x as u64 + area_w as u64 > cur_w as u64 || y as u64 + area_h as u64 > cur_h as u64 {
            return Err(ImageError::invalid_crop_bounds(
                x, y, area_w, area_h, cur_w, cur_h,
            ));
        }
        ops.push(Operation::Extract {
            x,
            y,
            width: area_w,
            height: area_h,
        });
        cur_w = area_w;
        cur_h = area_h;
    }

    if options.width > 0 || options.height > 0 {
        let (target_w, target_h) = complete_target(cur_w, cur_h, options.width, options.height);
        validate_resize_dimensions(target_w, target_h)?;
        let interpolator = options.interpolator;

        if options.force {
            if (target_w, target_h) != (cur_w, cur_h) {
                limits.check_dimensions(target_w, target_h)?;
                ops.push(Operation::Resize {
                    width: target_w,
                    height: target_h,
                    interpolator,
                });
            }
        } else if options.crop {
            let (mut resize_w, mut resize_h) =
                calc_cover_resize_dimensions(cur_w, cur_h, target_w, target_h);
            if !options.enlarge && (resize_w > cur_w || resize_h > cur_h) {
                resize_w = cur_w;
                resize_h = cur_h;
            }
            if (resize_w, resize_h) != (cur_w, cur_h) {
                limits.check_dimensions(resize_w, resize_h)?;
                ops.push(Operation::Resize {
                    width: resize_w,
                    height: resize_h,
                    interpolator,
                });
                cur_w = resize_w;
                cur_h = resize_h;
            }
            let crop_w = target_w.min(cur_w);
            let crop_h = target_h.min(cur_h);
            if (crop_w, crop_h) != (cur_w, cur_h) {
                ops.push(Operation::CropGravity {
                    width: crop_w,
                    height: crop_h,
                    gravity: options.gravity,
                });
            }
        } else {
            let fits = cur_w <= target_w && cur_h <= target_h;
            if options.enlarge || !fits {
                let (resize_w, resize_h) =
                    calc_resize_dimensions(cur_w, cur_h, Some(target_w), Some(target_h));
                if (resize_w, resize_h) != (cur_w, cur_h) {
                    limits.check_dimensions(resize_w, resize_h)?;
                    ops.push(Operation::Resize {
                        width: resize_w,
                        height: resize_h,
                        interpolator,
                    });
                    cur_w = resize_w;
                    cur_h = resize_h;
                }
            }
            if options.embed && (cur_w, cur_h) != (target_w, target_h) {
                limits.check_dimensions(target_w, target_h)?;
                ops.push(Operation::Embed {
                    width: target_w,
                    height: target_h,
                    extend: options.extend,
                    background: options.background,
                });
            }
        }
    }

    if options.rotate != Angle::D0 {
        ops.push(Operation::Rotate {
            angle: options.rotate,
        });
    }
    if options.flip {
        ops.push(Operation::FlipV);
    }
    if options.flop {
        ops.push(Operation::FlipH);
    }

    trace!(target: "image_dsl::pipeline", ?ops, "planned operations");
    Ok(ops)
}

/// Apply planned operations in order.
pub fn apply_ops(img: DynamicImage, ops: &[Operation]) -> PipelineResult<DynamicImage> {
    let mut img = img;

    for op in ops {
        debug!(
            target: "image_dsl::pipeline",
            op = op.name(),
            width = img.width(),
            height = img.height(),
            "applying operation"
        );
        img = match op {
            Operation::AutoOrient { orientation } => match orientation {
                2 => img.fliph(),
                3 => img.rotate180(),
                4 => img.flipv(),
                5 => img.rotate90().fliph(), // transpose
                6 => img.rotate90(),
                7 => img.rotate270().fliph(), // transverse
                8 => img.rotate270(),
                _ => img,
            },

            Operation::Extract {
                x,
                y,
                width,
                height,
            } => {
                if *width == 0 || *height == 0 {
                    return Err(ImageError::invalid_extract_area(*width, *height));
                }
                let (img_w, img_h) = (img.width(), img.height());
                if *x as u64 + *width as u64 > img_w as u64
                    || *y as u64 + *height as u64 > img_h as u64
                {
                    return Err(ImageError::invalid_crop_bounds(
                        *x, *y, *width, *height, img_w, img_h,
                    ));
                }
                img.crop_imm(*x, *y, *width, *height)
            }

            Operation::Resize {
                width,
                height,
                interpolator,
            } => {
                validate_resize_dimensions(*width, *height)?;
                if (*width, *height) == (img.width(), img.height()) {
                    img
                } else {
                    fast_resize_owned(img, *width, *height, *interpolator)
                        .map_err(|err| err.into_image_error())?
                }
            }

            Operation::CropGravity {
                width,
                height,
                gravity,
            } => {
                let crop_w = (*width).min(img.width()).max(1);
                let crop_h = (*height).min(img.height()).max(1);
                let (x, y) = gravity_offset(img.width(), img.height(), crop_w, crop_h, *gravity);
                img.crop_imm(x, y, crop_w, crop_h)
            }

            Operation::Embed {
                width,
                height,
                extend,
                background,
            } => embed(&img, *width, *height, *extend, *background)?,

            Operation::Rotate { angle } => match angle {
                Angle::D0 => img,
                Angle::D90 => img.rotate90(),
                Angle::D180 => img.rotate180(),
                Angle::D270 => img.rotate270(),
            },

            Operation::FlipV => img.flipv(),
            Operation::FlipH => img.fliph(),
        };
    }
    Ok(img)
}

/// Centre `img` on a `width x height` canvas, filling the margins per `extend`.
fn embed(
    img: &DynamicImage,
    width: u32,
    height: u32,
    extend: Extend,
    background: Color,
) -> PipelineResult<DynamicImage> {
    validate_resize_dimensions(width, height)?;
    let has_alpha = img.color().has_alpha();
    let src = img.to_rgba8();
    let (src_w, src_h) = src.dimensions();
    let off_x = (width.saturating_sub(src_w) / 2) as i64;
    let off_y = (height.saturating_sub(src_h) / 2) as i64;

    let fill = match extend {
        Extend::Black => Rgba([0, 0, 0, 255]),
        Extend::White => Rgba([255, 255, 255, 255]),
        Extend::Background => Rgba([background.r, background.g, background.b, 255]),
        Extend::Copy => Rgba([0, 0, 0, 0]),
    };

    let canvas = RgbaImage::from_fn(width, height, |x, y| {
        let sx = x as i64 - off_x;
        let sy = y as i64 - off_y;
        let inside = sx >= 0 && sy >= 0 && sx < src_w as i64 && sy < src_h as i64;
        if inside {
            *src.get_pixel(sx as u32, sy as u32)
        } else if extend == Extend::Copy {
            // replicate the nearest edge pixel
            let cx = sx.clamp(0, src_w as i64 - 1) as u32;
            let cy = sy.clamp(0, src_h as i64 - 1) as u32;
            *src.get_pixel(cx, cy)
        } else {
            fill
        }
    });

    Ok(if has_alpha {
        DynamicImage::ImageRgba8(canvas)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    })
}

fn resize_options(interpolator: Interpolator) -> ResizeOptions {
    let alg = match interpolator {
        Interpolator::Lanczos3 => fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3),
        Interpolator::Bicubic => fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
        Interpolator::Bilinear => fir::ResizeAlg::Convolution(fir::FilterType::Bilinear),
        Interpolator::Nearest => fir::ResizeAlg::Nearest,
    };
    ResizeOptions::new().resize_alg(alg)
}

fn fallback_filter(interpolator: Interpolator) -> FilterType {
    match interpolator {
        Interpolator::Lanczos3 => FilterType::Lanczos3,
        Interpolator::Bicubic => FilterType::CatmullRom,
        Interpolator::Bilinear => FilterType::Triangle,
        Interpolator::Nearest => FilterType::Nearest,
    }
}

/// Resize to exactly `dst_width x dst_height`.
///
/// Non-8-bit input is narrowed to RGB8, or RGBA8 when it has alpha. The SIMD
/// resizer runs first; if it rejects the buffer the image crate does the work.
pub fn fast_resize_owned(
    img: DynamicImage,
    dst_width: u32,
    dst_height: u32,
    interpolator: Interpolator,
) -> std::result::Result<DynamicImage, ResizeError> {
    let (src_width, src_height) = (img.width(), img.height());
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(ResizeError::new(
            (src_width, src_height),
            (dst_width, dst_height),
            "invalid dimensions for resize",
        ));
    }

    let img = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };

    match fir_resize(&img, dst_width, dst_height, interpolator) {
        Ok(resized) => Ok(resized),
        Err(reason) => {
            debug!(target: "image_dsl::pipeline", %reason, "fast resize failed, using image crate");
            Ok(img.resize_exact(dst_width, dst_height, fallback_filter(interpolator)))
        }
    }
}

/// fast_image_resize over an RGB8/RGBA8 image. Alpha is premultiplied by
/// the resizer itself (`ResizeOptions` default).
fn fir_resize(
    src: &DynamicImage,
    dst_width: u32,
    dst_height: u32,
    interpolator: Interpolator,
) -> std::result::Result<DynamicImage, String> {
    let pixel_type = match src {
        DynamicImage::ImageRgb8(_) => PixelType::U8x3,
        DynamicImage::ImageRgba8(_) => PixelType::U8x4,
        other => return Err(format!("unsupported pixel layout {:?}", other.color())),
    };
    let src_view = fir::images::ImageRef::new(src.width(), src.height(), src.as_bytes(), pixel_type)
        .map_err(|e| format!("fir source image error: {e:?}"))?;
    let mut dst = fir::images::Image::new(dst_width, dst_height, pixel_type);
    fir::Resizer::new()
        .resize(&src_view, &mut dst, &resize_options(interpolator))
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    let pixels = dst.into_vec();
    let resized = match pixel_type {
        PixelType::U8x3 => {
            RgbImage::from_raw(dst_width, dst_height, pixels).map(DynamicImage::ImageRgb8)
        }
        _ => RgbaImage::from_raw(dst_width, dst_height, pixels).map(DynamicImage::ImageRgba8),
    };
    resized.ok_or_else(|| "resized buffer has the wrong length".to_string())
}
