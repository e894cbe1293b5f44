// src/engine/icc.rs
//
// ICC profile extraction and re-embedding (JPEG APP2, PNG iCCP, WebP ICCP).

use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::error::ImageError;
use crate::options::ImageType;
use crate::pool::BufferPool;
use img_parts::{jpeg::Jpeg, png::Png, webp::WebP, Bytes, ImageICC};

/// Extract a validated ICC profile from encoded data.
pub fn extract_icc_profile(data: &[u8]) -> Option<Vec<u8>> {
    let bytes = Bytes::copy_from_slice(data);
    let icc = match crate::engine::decoder::detect_image_type(data) {
        ImageType::Jpeg => Jpeg::from_bytes(bytes).ok()?.icc_profile(),
        ImageType::Png => Png::from_bytes(bytes).ok()?.icc_profile(),
        ImageType::Webp => WebP::from_bytes(bytes).ok()?.icc_profile(),
        _ => None,
    }?;
    let icc = icc.to_vec();
    validate_icc_profile(&icc).then_some(icc)
}

/// Validate the 128-byte ICC header.
pub(crate) fn validate_icc_profile(icc_data: &[u8]) -> bool {
    if icc_data.len() < 128 {
        return false;
    }

    let profile_size =
        u32::from_be_bytes([icc_data[0], icc_data[1], icc_data[2], icc_data[3]]) as usize;
    if profile_size != icc_data.len() {
        return false;
    }

    // CMM type, class, colour space and PCS signatures are ASCII (or NUL).
    let ascii = |range: std::ops::Range<usize>| {
        icc_data[range]
            .iter()
            .all(|&b| (32..=126).contains(&b) || b == 0)
    };
    if !ascii(4..8) || !ascii(12..16) || !ascii(16..20) || !ascii(20..24) {
        return false;
    }

    // Major version is 2, 4 or 5 in practice.
    icc_data[8] <= 10
}

/// Whether `image_type` can carry an embedded ICC profile.
pub fn supports_icc(image_type: ImageType) -> bool {
    matches!(image_type, ImageType::Jpeg | ImageType::Png | ImageType::Webp)
}

/// Embed `icc` into already encoded data of type `image_type`.
///
/// The tagged copy is written into a buffer taken from `pool` when one is
/// given. Returns `None` for types without ICC support.
pub fn embed_icc(
    image_type: ImageType,
    data: &[u8],
    icc: &[u8],
    pool: Option<&BufferPool>,
) -> EngineResult<Option<Vec<u8>>> {
    if !supports_icc(image_type) {
        return Ok(None);
    }
    run_with_panic_policy("encode:embed_icc", || {
        let profile = Some(Bytes::copy_from_slice(icc));
        let bytes = Bytes::copy_from_slice(data);
        let capacity = data.len() + icc.len() + 32;
        let mut output = match pool {
            Some(pool) => pool.acquire(capacity),
            None => Vec::with_capacity(capacity),
        };
        let name = image_type.name();
        let write_err =
            |e: std::io::Error| ImageError::encode_failed(name, format!("failed to write ICC: {e}"));
        let parse_err = |e: img_parts::Error| {
            ImageError::decode_failed(format!("failed to parse {name} for ICC: {e}"))
        };

        match image_type {
            ImageType::Jpeg => {
                let mut jpeg = Jpeg::from_bytes(bytes).map_err(parse_err)?;
                jpeg.set_icc_profile(profile);
                jpeg.encoder().write_to(&mut output).map_err(write_err)?;
            }
            ImageType::Png => {
                let mut png = Png::from_bytes(bytes).map_err(parse_err)?;
                png.set_icc_profile(profile);
                png.encoder().write_to(&mut output).map_err(write_err)?;
            }
            _ => {
                let mut webp = WebP::from_bytes(bytes).map_err(parse_err)?;
                webp.set_icc_profile(profile);
                webp.encoder().write_to(&mut output).map_err(write_err)?;
            }
        }
        Ok(Some(output))
    })
}

#[cfg(test)]
pub(crate) fn test_icc_profile(len: usize) -> Vec<u8> {
    let size = len.max(128);
    let mut data = vec![0u8; size];
    data[..4].copy_from_slice(&(size as u32).to_be_bytes());
    data[4..8].copy_from_slice(b"TEST");
    data[8] = 2;
    data[12..16].copy_from_slice(b"mntr");
    data[16..20].copy_from_slice(b"RGB ");
    data[20..24].copy_from_slice(b"XYZ ");
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(2, 2, |x, y| Rgb([x as u8, y as u8, 0]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn jpeg_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([9, 8, 7])))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[test]
    fn test_validate_icc_profile_too_small() {
        assert!(!validate_icc_profile(&[0u8; 127]));
    }

    #[test]
    fn test_validate_icc_profile_minimal_valid() {
        assert!(validate_icc_profile(&test_icc_profile(128)));
    }

    #[test]
    fn test_validate_icc_profile_size_mismatch() {
        let mut data = test_icc_profile(200);
        data[3] = 0xFF;
        assert!(!validate_icc_profile(&data));
    }

    #[test]
    fn test_validate_icc_profile_invalid_version() {
        let mut data = test_icc_profile(128);
        data[8] = 42;
        assert!(!validate_icc_profile(&data));
    }

    #[test]
    fn test_no_profile_in_plain_images() {
        assert!(extract_icc_profile(&png_bytes()).is_none());
        assert!(extract_icc_profile(&jpeg_bytes()).is_none());
        assert!(extract_icc_profile(b"garbage").is_none());
        assert!(extract_icc_profile(&[]).is_none());
    }

    #[test]
    fn test_png_roundtrip() {
        let icc = test_icc_profile(256);
        let out = embed_icc(ImageType::Png, &png_bytes(), &icc, None)
            .unwrap()
            .unwrap();
        assert_eq!(extract_icc_profile(&out), Some(icc));
    }

    #[test]
    fn test_jpeg_roundtrip() {
        let icc = test_icc_profile(300);
        let out = embed_icc(ImageType::Jpeg, &jpeg_bytes(), &icc, None)
            .unwrap()
            .unwrap();
        assert_eq!(extract_icc_profile(&out), Some(icc));
        assert!(image::load_from_memory(&out).is_ok());
    }

    #[test]
    fn test_unsupported_type_is_skipped() {
        let out = embed_icc(ImageType::Gif, b"GIF89a", &test_icc_profile(128), None).unwrap();
        assert!(out.is_none());
        assert!(!supports_icc(ImageType::Tiff));
    }

    #[test]
    fn test_output_comes_from_pool() {
        let pool = BufferPool::with_limits(4, 1 << 20);
        pool.release(Vec::with_capacity(64 * 1024));
        assert_eq!(pool.len(), 1);

        let icc = test_icc_profile(256);
        let out = embed_icc(ImageType::Png, &png_bytes(), &icc, Some(&pool))
            .unwrap()
            .unwrap();
        assert_eq!(pool.len(), 0);
        assert!(out.capacity() >= 64 * 1024);
        assert_eq!(extract_icc_profile(&out), Some(icc));
    }
}
