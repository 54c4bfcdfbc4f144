//! Benchmarks for the progress pool, watermark placement and helpers

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use utilkit_core::watermark::{mark_image, PositionCalculator};
use utilkit_core::{PhaseParam, ProgressBar, ProgressConfig, Units, WatermarkPosition, Watermarker};

fn benchmark_tracker_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bar = ProgressBar::with_config(
        1_000_000,
        vec![
            PhaseParam::new("scan", 4, Units::Count),
            PhaseParam::new("copy", 4, Units::Bytes),
        ],
        &ProgressConfig::hidden(),
    )
    .unwrap();

    c.bench_function("acquire_and_release_tracker", |b| {
        b.to_async(&rt).iter(|| async {
            let tracker = bar.create_tracker(1, "bench", 1024).await.unwrap();
            tracker.increment(black_box(1024));
            bar.mark_as_done(tracker).unwrap();
        });
    });

    c.bench_function("try_acquire_tracker", |b| {
        b.iter(|| {
            let tracker = bar.try_create_tracker(0, "bench", 1).unwrap().unwrap();
            bar.mark_as_done(tracker).unwrap();
        });
    });
}

fn benchmark_watermark(c: &mut Criterion) {
    let bg = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1920, 1080, Rgba([255, 255, 255, 255])));
    let marker = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 80, Rgba([255, 0, 0, 128])));

    c.bench_function("calculate_position", |b| {
        b.iter(|| {
            for position in WatermarkPosition::ALL {
                black_box(PositionCalculator::calculate_position(
                    position,
                    black_box(1920),
                    black_box(1080),
                    200,
                    80,
                    10,
                    10,
                ));
            }
        });
    });

    c.bench_function("mark_image_1080p", |b| {
        b.iter(|| mark_image(black_box(&bg), &marker, 1.0, WatermarkPosition::BottomRight, 10, 10).unwrap());
    });

    let watermarker = Watermarker::new(marker.clone());
    c.bench_function("mark_image_scaled_half", |b| {
        b.iter(|| mark_image(black_box(&bg), watermarker.marker(), 0.5, WatermarkPosition::Center, 0, 0).unwrap());
    });
}

fn benchmark_helpers(c: &mut Criterion) {
    use std::time::Duration;
    use utilkit_core::progress::percent_of;
    use utilkit_core::utils::{performance, validation};

    c.bench_function("percent_of", |b| {
        b.iter(|| percent_of(black_box(123), black_box(4567)));
    });

    c.bench_function("validate_dimensions", |b| {
        b.iter(|| validation::validate_dimensions(black_box(1920), black_box(1080)));
    });

    c.bench_function("calculate_throughput", |b| {
        b.iter(|| performance::calculate_throughput(black_box(1024 * 1024), black_box(Duration::from_millis(250))));
    });
}

criterion_group!(benches, benchmark_tracker_cycle, benchmark_watermark, benchmark_helpers);
criterion_main!(benches);
