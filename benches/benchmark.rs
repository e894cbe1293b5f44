use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use image_dsl::engine::{apply_ops, plan_operations, Limits};
use image_dsl::{BufferPool, Image, NativeEngine, Options, Processor};
use std::hint::black_box;
use std::io::Cursor;
use std::sync::Arc;

fn source_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    source_image(width, height)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

fn engine_benchmark(c: &mut Criterion) {
    let jpeg = encoded(1600, 1200, ImageFormat::Jpeg);
    let png = encoded(800, 600, ImageFormat::Png);
    let engine = NativeEngine::default();

    let mut group = c.benchmark_group("engine");
    group.sample_size(20);
    group.bench_function("jpeg_thumbnail_200", |b| {
        b.iter(|| engine.resize(black_box(&jpeg), &Options::thumbnail(200)).unwrap())
    });
    group.bench_function("jpeg_resize_800x600", |b| {
        b.iter(|| engine.resize(black_box(&jpeg), &Options::resize(800, 600)).unwrap())
    });
    group.bench_function("png_smart_crop_256", |b| {
        b.iter(|| engine.resize(black_box(&png), &Options::smart_crop(256, 256)).unwrap())
    });
    group.finish();
}

fn plan_apply_benchmark(c: &mut Criterion) {
    let img = source_image(1024, 768);
    let options = Options::enlarge_and_crop(300, 300);
    let limits = Limits::default();

    c.bench_function("plan_apply_cover_crop", |b| {
        b.iter_batched(
            || img.clone(),
            |img| {
                let ops = plan_operations(&options, img.width(), img.height(), None, &limits).unwrap();
                apply_ops(img, &ops).unwrap()
            },
            BatchSize::LargeInput,
        )
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let jpeg = encoded(1600, 1200, ImageFormat::Jpeg);
    let pool = Arc::new(BufferPool::new());

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    group.bench_function("thumbnail_flop_pooled", |b| {
        b.iter_batched(
            || Image::new(jpeg.clone()).with_pool(Arc::clone(&pool)),
            |mut img| {
                img.pipeline().thumbnail(200).flop().run().unwrap();
                img.into_inner()
            },
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

fn pool_benchmark(c: &mut Criterion) {
    let pool = BufferPool::new();
    pool.release(Vec::with_capacity(1 << 20));

    c.bench_function("pool_acquire_release_1mb", |b| {
        b.iter(|| {
            let buf = pool.acquire(black_box(1 << 20));
            pool.release(buf)
        })
    });
    c.bench_function("fresh_alloc_1mb", |b| {
        b.iter(|| Vec::<u8>::with_capacity(black_box(1 << 20)))
    });
}

criterion_group!(
    benches,
    engine_benchmark,
    plan_apply_benchmark,
    pipeline_benchmark,
    pool_benchmark
);
criterion_main!(benches);
