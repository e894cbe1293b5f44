// src/options.rs
//
// The flat options record submitted to a Processor, plus the small value
// types it and the inspection calls use.
// Options are cheap to build and never retained by the engine.

use std::fmt;

/// Top offset dispatched by [`Options::extract`] when both offsets are zero.
pub const EXTRACT_TOP_UNSET: i32 = -1;

/// Quality used by [`Options::thumbnail`].
pub const THUMBNAIL_QUALITY: u8 = 95;

/// Anchor used when cropping to a target box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Gravity {
    #[default]
    Centre,
    North,
    East,
    South,
    West,
    /// Focus on the salient region. The saliency search belongs to the engine.
    Smart,
}

/// Rotation applied after resizing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Angle {
    #[default]
    D0,
    D90,
    D180,
    D270,
}

impl Angle {
    pub fn degrees(self) -> u32 {
        match self {
            Angle::D0 => 0,
            Angle::D90 => 90,
            Angle::D180 => 180,
            Angle::D270 => 270,
        }
    }
}

/// How the padding around an embedded image is filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Extend {
    #[default]
    Black,
    White,
    /// Repeat the nearest edge pixel.
    Copy,
    /// Use [`Options::background`].
    Background,
}

/// Resampling kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpolator {
    #[default]
    Lanczos3,
    Bicubic,
    Bilinear,
    Nearest,
}

/// RGB colour used for [`Extend::Background`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Encoded image container type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageType {
    #[default]
    Unknown,
    Jpeg,
    Webp,
    Png,
    Tiff,
    Gif,
    Pdf,
    Svg,
    Magick,
    Heif,
    Avif,
    Jxl,
}

impl ImageType {
    /// Lowercase type name; `"unknown"` for unrecognised buffers.
    pub fn name(self) -> &'static str {
        match self {
            ImageType::Unknown => "unknown",
            ImageType::Jpeg => "jpeg",
            ImageType::Webp => "webp",
            ImageType::Png => "png",
            ImageType::Tiff => "tiff",
            ImageType::Gif => "gif",
            ImageType::Pdf => "pdf",
            ImageType::Svg => "svg",
            ImageType::Magick => "magick",
            ImageType::Heif => "heif",
            ImageType::Avif => "avif",
            ImageType::Jxl => "jxl",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let t = match name.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => ImageType::Jpeg,
            "webp" => ImageType::Webp,
            "png" => ImageType::Png,
            "tiff" | "tif" => ImageType::Tiff,
            "gif" => ImageType::Gif,
            "pdf" => ImageType::Pdf,
            "svg" => ImageType::Svg,
            "magick" => ImageType::Magick,
            "heif" | "heic" => ImageType::Heif,
            "avif" => ImageType::Avif,
            "jxl" => ImageType::Jxl,
            _ => return None,
        };
        Some(t)
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Colour interpretation of the decoded bands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interpretation {
    #[default]
    Error,
    Multiband,
    BW,
    Cmyk,
    Rgb,
    Srgb,
    Rgb16,
    Grey16,
    Scrgb,
    Lab,
    Xyz,
}

impl Interpretation {
    pub fn name(self) -> &'static str {
        match self {
            Interpretation::Error => "error",
            Interpretation::Multiband => "multiband",
            Interpretation::BW => "b-w",
            Interpretation::Cmyk => "cmyk",
            Interpretation::Rgb => "rgb",
            Interpretation::Srgb => "srgb",
            Interpretation::Rgb16 => "rgb16",
            Interpretation::Grey16 => "grey16",
            Interpretation::Scrgb => "scrgb",
            Interpretation::Lab => "lab",
            Interpretation::Xyz => "xyz",
        }
    }
}

/// Pixel dimensions of an encoded image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Header-level facts about an encoded image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// EXIF orientation (1-8), 0 when absent
    pub orientation: u16,
    pub channels: u8,
    pub alpha: bool,
    /// True when an ICC profile is embedded
    pub profile: bool,
    pub image_type: ImageType,
    pub space: Interpretation,
    pub size: ImageSize,
}

/// One requested transformation. Zero means "unset" for every numeric field
/// except `top`/`left`, where negative values mean "unset".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub width: u32,
    pub height: u32,
    pub area_width: u32,
    pub area_height: u32,
    pub top: i32,
    pub left: i32,
    /// 1-100; 0 selects the engine default
    pub quality: u8,
    /// PNG compression level 0-9; 0 selects the engine default
    pub compression: u8,
    pub crop: bool,
    pub force: bool,
    pub embed: bool,
    pub enlarge: bool,
    pub gravity: Gravity,
    pub auto_rotate_only: bool,
    pub no_auto_rotate: bool,
    /// Mirror vertically
    pub flip: bool,
    /// Mirror horizontally
    pub flop: bool,
    pub rotate: Angle,
    /// Target container; `None` keeps the source type
    pub output_type: Option<ImageType>,
    pub interlace: bool,
    pub lossless: bool,
    pub strip_metadata: bool,
    pub extend: Extend,
    pub background: Color,
    pub interpolator: Interpolator,
}

impl Options {
    /// Fit inside `width x height` and pad to exactly that box.
    pub fn resize(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            embed: true,
            ..Self::default()
        }
    }

    /// Resample to exactly `width x height`, ignoring aspect ratio.
    pub fn force_resize(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            force: true,
            ..Self::default()
        }
    }

    pub fn resize_and_crop(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            embed: true,
            crop: true,
            ..Self::default()
        }
    }

    pub fn smart_crop(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            crop: true,
            gravity: Gravity::Smart,
            ..Self::default()
        }
    }

    /// Extract an area at (`left`, `top`).
    ///
    /// When both offsets are zero the dispatched `top` is
    /// [`EXTRACT_TOP_UNSET`] rather than 0. Whether that was meant as
    /// "offset not given" or is an accident of history is unknown; it is
    /// kept as is, and [`crate::engine::NativeEngine`] reads a negative
    /// offset as 0.
    pub fn extract(top: i32, left: i32, width: u32, height: u32) -> Self {
        let mut options = Self {
            top,
            left,
            area_width: width,
            area_height: height,
            ..Self::default()
        };
        if top == 0 && left == 0 {
            options.top = EXTRACT_TOP_UNSET;
        }
        options
    }

    pub fn enlarge(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            enlarge: true,
            ..Self::default()
        }
    }

    pub fn enlarge_and_crop(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            enlarge: true,
            crop: true,
            ..Self::default()
        }
    }

    pub fn crop(width: u32, height: u32, gravity: Gravity) -> Self {
        Self {
            width,
            height,
            gravity,
            crop: true,
            ..Self::default()
        }
    }

    pub fn crop_by_width(width: u32) -> Self {
        Self {
            width,
            crop: true,
            ..Self::default()
        }
    }

    pub fn crop_by_height(height: u32) -> Self {
        Self {
            height,
            crop: true,
            ..Self::default()
        }
    }

    /// Square crop of `pixels x pixels` at [`THUMBNAIL_QUALITY`].
    pub fn thumbnail(pixels: u32) -> Self {
        Self {
            width: pixels,
            height: pixels,
            crop: true,
            quality: THUMBNAIL_QUALITY,
            ..Self::default()
        }
    }

    /// Apply the EXIF orientation and nothing else.
    pub fn auto_rotate() -> Self {
        Self {
            auto_rotate_only: true,
            ..Self::default()
        }
    }

    pub fn rotate(angle: Angle) -> Self {
        Self {
            rotate: angle,
            ..Self::default()
        }
    }

    pub fn flip() -> Self {
        Self {
            flip: true,
            ..Self::default()
        }
    }

    pub fn flop() -> Self {
        Self {
            flop: true,
            ..Self::default()
        }
    }

    pub fn convert(image_type: ImageType) -> Self {
        Self {
            output_type: Some(image_type),
            ..Self::default()
        }
    }

    /// True when an area extraction was requested.
    pub fn wants_extract(&self) -> bool {
        self.top != 0 || self.left != 0 || self.area_width != 0 || self.area_height != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_at_origin_dispatches_unset_top() {
        let o = Options::extract(0, 0, 10, 20);
        assert_eq!(o.top, EXTRACT_TOP_UNSET);
        assert_eq!(o.left, 0);
        assert_eq!((o.area_width, o.area_height), (10, 20));
        let direct = Options {
            top: -1,
            area_width: 10,
            area_height: 20,
            ..Options::default()
        };
        assert_eq!(o, direct);
    }

    #[test]
    fn extract_keeps_explicit_offsets() {
        assert_eq!(Options::extract(5, 0, 10, 10).top, 5);
        let o = Options::extract(0, 7, 10, 10);
        assert_eq!((o.top, o.left), (0, 7));
    }

    #[test]
    fn thumbnail_shape_holds_for_zero() {
        for n in [0, 1, 150, u32::MAX] {
            let o = Options::thumbnail(n);
            assert_eq!((o.width, o.height), (n, n));
            assert!(o.crop);
            assert_eq!(o.quality, 95);
            assert!(!o.embed && !o.force && !o.enlarge);
        }
    }

    #[test]
    fn constructors_set_only_their_flags() {
        let o = Options::resize(100, 50);
        assert!(o.embed && !o.crop && !o.force);
        let o = Options::force_resize(100, 50);
        assert!(o.force && !o.embed);
        let o = Options::resize_and_crop(1, 2);
        assert!(o.embed && o.crop);
        let o = Options::smart_crop(1, 2);
        assert!(o.crop && o.gravity == Gravity::Smart);
        let o = Options::enlarge_and_crop(1, 2);
        assert!(o.enlarge && o.crop);
        let o = Options::crop(3, 4, Gravity::North);
        assert_eq!(o.gravity, Gravity::North);
        assert_eq!(Options::crop_by_width(9).height, 0);
        assert_eq!(Options::crop_by_height(9).width, 0);
        assert!(Options::auto_rotate().auto_rotate_only);
    }

    #[test]
    fn wants_extract_sees_sentinel() {
        assert!(Options::extract(0, 0, 0, 0).wants_extract());
        assert!(!Options::resize(10, 10).wants_extract());
    }

    #[test]
    fn image_type_names_roundtrip() {
        for t in [
            ImageType::Jpeg,
            ImageType::Webp,
            ImageType::Png,
            ImageType::Tiff,
            ImageType::Gif,
            ImageType::Pdf,
            ImageType::Svg,
            ImageType::Magick,
            ImageType::Heif,
            ImageType::Avif,
            ImageType::Jxl,
        ] {
            assert_eq!(ImageType::from_name(t.name()), Some(t));
        }
        assert_eq!(ImageType::Unknown.name(), "unknown");
        assert_eq!(ImageType::from_name("bmp"), None);
    }
}
