// src/engine/decoder.rs
//
// Type detection, header inspection and decoding.

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::limits::Limits;
use crate::error::ImageError;
use crate::options::{ImageType, Interpretation};
use image::{ColorType, DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;

/// Detect the container type from magic bytes. Never fails.
pub fn detect_image_type(bytes: &[u8]) -> ImageType {
    if bytes.len() >= 3 && bytes[..3] == [0xFF, 0xD8, 0xFF] {
        return ImageType::Jpeg;
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return ImageType::Png;
    }
    if bytes.starts_with(b"GIF8") {
        return ImageType::Gif;
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return ImageType::Webp;
    }
    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return ImageType::Tiff;
    }
    if bytes.starts_with(b"%PDF") {
        return ImageType::Pdf;
    }
    if bytes.starts_with(&[0xFF, 0x0A])
        || bytes.starts_with(&[0, 0, 0, 0x0C, b'J', b'X', b'L', b' ', 0x0D, 0x0A, 0x87, 0x0A])
    {
        return ImageType::Jxl;
    }
    if let Some(t) = detect_isobmff(bytes) {
        return t;
    }
    if bytes.starts_with(b"BM") || bytes.starts_with(b"8BPS") || bytes.starts_with(&[0, 0, 1, 0]) {
        return ImageType::Magick;
    }
    if is_svg(bytes) {
        return ImageType::Svg;
    }
    ImageType::Unknown
}

/// AVIF/HEIF share the ISOBMFF 'ftyp' box; tell them apart by brand.
fn detect_isobmff(bytes: &[u8]) -> Option<ImageType> {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return None;
    }
    let ftyp_size = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if ftyp_size < 12 || ftyp_size > bytes.len() {
        return None;
    }

    let mut brands = vec![&bytes[8..12]];
    let mut offset = 16;
    while offset + 4 <= ftyp_size {
        brands.push(&bytes[offset..offset + 4]);
        offset += 4;
    }

    if brands.iter().any(|b| *b == b"avif" || *b == b"avis") {
        return Some(ImageType::Avif);
    }
    const HEIF_BRANDS: [&[u8; 4]; 8] = [
        b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
    ];
    if brands.iter().any(|b| HEIF_BRANDS.iter().any(|h| *b == &h[..])) {
        return Some(ImageType::Heif);
    }
    None
}

fn is_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let text = text.trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

fn to_image_format(t: ImageType) -> Option<ImageFormat> {
    match t {
        ImageType::Jpeg => Some(ImageFormat::Jpeg),
        ImageType::Png => Some(ImageFormat::Png),
        ImageType::Webp => Some(ImageFormat::WebP),
        ImageType::Gif => Some(ImageFormat::Gif),
        ImageType::Tiff => Some(ImageFormat::Tiff),
        _ => None,
    }
}

/// Header facts read without decoding pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub image_type: ImageType,
    pub width: u32,
    pub height: u32,
    pub color: ColorType,
}

pub fn read_header(bytes: &[u8]) -> EngineResult<Header> {
    let image_type = detect_image_type(bytes);
    let format = to_image_format(image_type)
        .ok_or_else(|| ImageError::unsupported_format(image_type.name()))?;

    run_with_panic_policy("decode:header", || {
        let reader = ImageReader::with_format(Cursor::new(bytes), format);
        let decoder = reader
            .into_decoder()
            .map_err(|e| ImageError::decode_failed(format!("failed to read image header: {e}")))?;
        let (width, height) = decoder.dimensions();
        Ok(Header {
            image_type,
            width,
            height,
            color: decoder.color_type(),
        })
    })
}

/// Decode a whole image after checking its header against `limits`.
pub fn decode_image(bytes: &[u8], limits: &Limits) -> EngineResult<(DynamicImage, ImageType)> {
    let header = read_header(bytes)?;
    limits.check_dimensions(header.width, header.height)?;

    let format = to_image_format(header.image_type)
        .ok_or_else(|| ImageError::unsupported_format(header.image_type.name()))?;

    let img = run_with_panic_policy("decode:image", || {
        image::load_from_memory_with_format(bytes, format)
            .map_err(|e| ImageError::decode_failed(format!("decode failed: {e}")))
    })?;

    // The header can lie; check what actually came out.
    limits.check_dimensions(img.width(), img.height())?;
    Ok((img, header.image_type))
}

/// Extract EXIF Orientation tag (1-8). Returns None if missing or invalid.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    if (1..=8).contains(&orientation) {
        Some(orientation)
    } else {
        None
    }
}

pub fn interpretation_for(color: ColorType) -> Interpretation {
    match color {
        ColorType::L8 | ColorType::La8 => Interpretation::BW,
        ColorType::L16 | ColorType::La16 => Interpretation::Grey16,
        ColorType::Rgb8 | ColorType::Rgba8 => Interpretation::Srgb,
        ColorType::Rgb16 | ColorType::Rgba16 => Interpretation::Rgb16,
        ColorType::Rgb32F | ColorType::Rgba32F => Interpretation::Scrgb,
        _ => Interpretation::Multiband,
    }
}
