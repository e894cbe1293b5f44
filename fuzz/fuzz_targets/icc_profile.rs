#![no_main]

//! ICC profile extraction from JPEG, PNG and WebP containers.

use image_dsl::engine::extract_icc_profile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let _ = extract_icc_profile(data);

    // JPEG prefix (0xFF 0xD8)
    let mut jpeg_data = vec![0xFF, 0xD8];
    jpeg_data.extend_from_slice(data);
    let _ = extract_icc_profile(&jpeg_data);

    // PNG signature
    let mut png_data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    png_data.extend_from_slice(data);
    let _ = extract_icc_profile(&png_data);

    // RIFF....WEBP
    let mut webp_data = vec![
        0x52, 0x49, 0x46, 0x46, // RIFF
        0x00, 0x00, 0x00, 0x00, // size placeholder
        0x57, 0x45, 0x42, 0x50, // WEBP
    ];
    webp_data.extend_from_slice(data);
    let _ = extract_icc_profile(&webp_data);
});
