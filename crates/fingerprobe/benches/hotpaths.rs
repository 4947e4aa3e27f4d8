use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fingerprobe::{
    detect_edges, sorted_crossings, wire_widths, CrossingOrder, EdgeConfig, HoughLineDetector,
    LineDetector,
};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Slanted wires with noise, similar to a cropped SEM frame.
fn make_micrograph(w: u32, h: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let slope = 30f32.to_radians().tan();
    GrayImage::from_fn(w, h, |x, y| {
        let u = x as f32 - slope * y as f32;
        let wire = (u.rem_euclid(40.0)) < 14.0;
        let base = if wire { 190.0 } else { 60.0 };
        let noise = rng.gen_range(-20.0f32..20.0f32);
        Luma([(base + noise).clamp(0.0, 255.0) as u8])
    })
}

/// Random sparse mask plus a one-pixel diagonal line.
fn make_masks(w: u32, h: u32, seed: u64) -> (GrayImage, GrayImage) {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = GrayImage::from_fn(w, h, |_, _| {
        if rng.gen_bool(0.08) {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let line = GrayImage::from_fn(w, h, |x, y| {
        if x * h / w == y {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    (noise, line)
}

fn bench_crossings(c: &mut Criterion) {
    let (noise, line) = make_masks(1024, 690, 7);

    c.bench_function("sorted_crossings_1024x690", |b| {
        b.iter(|| {
            let crossings =
                sorted_crossings(black_box(&noise), black_box(&line), CrossingOrder::Ascending)
                    .expect("equal mask sizes");
            black_box(wire_widths(&crossings, 0.1).len())
        })
    });
}

fn bench_edges(c: &mut Criterion) {
    let img = make_micrograph(1024, 690, 11);
    let cfg = EdgeConfig::default();

    c.bench_function("detect_edges_1024x690", |b| {
        b.iter(|| black_box(detect_edges(black_box(&img), black_box(&cfg))))
    });
}

fn bench_hough(c: &mut Criterion) {
    let edges = detect_edges(&make_micrograph(512, 400, 13), &EdgeConfig::default());
    let detector = HoughLineDetector::default();

    c.bench_function("hough_lines_512x400", |b| {
        b.iter(|| black_box(detector.detect_lines(black_box(&edges)).len()))
    });
}

criterion_group!(hotpaths, bench_crossings, bench_edges, bench_hough);
criterion_main!(hotpaths);
