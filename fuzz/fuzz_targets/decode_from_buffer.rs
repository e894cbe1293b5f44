#![no_main]

use image_dsl::{EngineConfig, Image, Limits, NativeEngine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Small limits keep hostile headers from allocating gigabytes.
    let engine = NativeEngine::new(
        EngineConfig::default().with_limits(Limits::custom(2048, 2048 * 2048, Some(1 << 22))),
    );
    let original = data.to_vec();
    let mut img = Image::with_processor(original.clone(), engine);

    let _ = img.image_type();
    let _ = img.metadata();
    let _ = img.size();
    let _ = img.interpretation();

    if img.thumbnail(16).is_err() {
        assert_eq!(img.image(), original.as_slice());
    }
});
