//! Performance benchmarks for the per-frame capture path
//!
//! Run with: cargo bench
//!
//! Every captured screenshot is header-parsed, colour-converted and written
//! to the container, so these establish baselines for that hot path.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use std::io::Cursor;
use std::time::Duration;
use virtcap::ppm;
use virtcap::recording::IvfWriter;
use virtcap::testing::synthetic_ppm_frame;
use virtcap::yuv::{chroma_dimensions, rgb_to_yuv420, PlanarImage};
use virtcap::Timebase;

const RESOLUTIONS: [(&str, u32, u32); 4] = [
    ("480p", 640, 480),
    ("768p", 1024, 768),
    ("720p", 1280, 720),
    ("1080p", 1920, 1080),
];

fn bench_rgb_to_yuv420(c: &mut Criterion) {
    let mut group = c.benchmark_group("RGB to I420");
    group.measurement_time(Duration::from_secs(5));

    for (name, width, height) in RESOLUTIONS {
        let frame = synthetic_ppm_frame(0, width, height);
        let desc = ppm::parse_header(&frame).unwrap();
        let rgb = ppm::pixel_payload(&frame, &desc).unwrap();

        let luma_len = (width * height) as usize;
        let (cw, ch) = chroma_dimensions(width, height);
        let mut y = vec![0u8; luma_len];
        let mut u = vec![0u8; cw * ch];
        let mut v = vec![0u8; cw * ch];

        group.throughput(Throughput::Bytes(rgb.len() as u64));
        group.bench_with_input(BenchmarkId::new("planes", name), &rgb, |b, rgb| {
            b.iter(|| {
                rgb_to_yuv420(black_box(rgb), width, height, &mut y, &mut u, &mut v);
            })
        });
    }

    group.finish();
}

fn bench_capture_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("Capture Frame");

    for (name, width, height) in RESOLUTIONS {
        let frame = synthetic_ppm_frame(7, width, height);
        let mut image = PlanarImage::new(width, height);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("parse_and_convert", name), &frame, |b, frame| {
            b.iter(|| {
                let desc = ppm::parse_header(black_box(frame)).unwrap();
                let rgb = ppm::pixel_payload(frame, &desc).unwrap();
                image.fill_from_rgb(rgb).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_ivf_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("IVF Append");

    for payload_len in [1_024usize, 16_384, 131_072] {
        let payload = vec![0x5Au8; payload_len];
        group.throughput(Throughput::Bytes(payload_len as u64));
        group.bench_with_input(
            BenchmarkId::new("write_frame", payload_len),
            &payload,
            |b, payload| {
                b.iter_batched(
                    || {
                        IvfWriter::new(
                            Cursor::new(Vec::with_capacity(payload.len() + 64)),
                            *b"H264",
                            1024,
                            768,
                            Timebase::default(),
                        )
                        .unwrap()
                    },
                    |mut writer| {
                        writer.write_frame(black_box(payload), 0).unwrap();
                        writer
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_rgb_to_yuv420,
    bench_capture_frame,
    bench_ivf_append
);
criterion_main!(benches);
