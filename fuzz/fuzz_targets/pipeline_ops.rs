#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use image::{DynamicImage, GenericImageView, RgbaImage};
use image_dsl::engine::{apply_ops, plan_operations, Limits};
use image_dsl::{Angle, Gravity, ImageType, Options};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct OptionsSeed {
    kind: u8,
    a: i32,
    b: i32,
    c: u16,
    d: u16,
    gravity: u8,
    orientation: u8,
}

fn build_image(data: &[u8]) -> DynamicImage {
    let width = data.first().copied().unwrap_or(0) as u32 % 64 + 1;
    let height = data.get(1).copied().unwrap_or(0) as u32 % 64 + 1;
    let mut buffer = vec![0u8; (width * height * 4) as usize];
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = data.get(i % data.len()).copied().unwrap_or(0);
    }

    let rgba = RgbaImage::from_raw(width, height, buffer)
        .unwrap_or_else(|| RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255])));
    DynamicImage::ImageRgba8(rgba)
}

fn gravity(seed: u8) -> Gravity {
    match seed % 6 {
        0 => Gravity::Centre,
        1 => Gravity::North,
        2 => Gravity::East,
        3 => Gravity::South,
        4 => Gravity::West,
        _ => Gravity::Smart,
    }
}

fn seed_to_options(seed: &OptionsSeed) -> Options {
    let w = u32::from(seed.c % 512);
    let h = u32::from(seed.d % 512);
    match seed.kind % 14 {
        0 => Options::resize(w, h),
        1 => Options::force_resize(w, h),
        2 => Options::resize_and_crop(w, h),
        3 => Options::smart_crop(w, h),
        4 => Options::extract(seed.a % 128, seed.b % 128, w, h),
        5 => Options::enlarge(w, h),
        6 => Options::enlarge_and_crop(w, h),
        7 => Options::crop(w, h, gravity(seed.gravity)),
        8 => Options::crop_by_width(w),
        9 => Options::crop_by_height(h),
        10 => Options::thumbnail(w),
        11 => Options::auto_rotate(),
        12 => Options::rotate(match seed.a.rem_euclid(4) {
            0 => Angle::D0,
            1 => Angle::D90,
            2 => Angle::D180,
            _ => Angle::D270,
        }),
        _ => Options {
            flip: seed.a & 1 == 1,
            flop: seed.b & 1 == 1,
            ..Options::convert(ImageType::Png)
        },
    }
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seeds: Vec<OptionsSeed> = match Vec::arbitrary(&mut unstructured) {
        Ok(v) => v,
        Err(_) => return,
    };

    let limits = Limits::custom(4096, 4096 * 4096, None);
    let mut img = build_image(data);
    for seed in seeds.iter().take(8) {
        let options = seed_to_options(seed);
        let (w, h) = img.dimensions();
        let orientation = Some(u16::from(seed.orientation % 10));
        // Planning errors are expected for bad requests; only panics matter.
        let Ok(ops) = plan_operations(&options, w, h, orientation, &limits) else {
            continue;
        };
        match apply_ops(img.clone(), &ops) {
            Ok(next) => img = next,
            Err(_) => continue,
        }
    }
});
