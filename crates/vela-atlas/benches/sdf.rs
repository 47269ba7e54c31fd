//! Benchmarks: MSDF generation and page allocator churn.
//!
//! Run with: cargo bench --package vela-atlas

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vela_atlas::sdf::generate_msdf;
use vela_atlas::{AtlasGeometry, PageAllocator};
use vela_core::{BezierPath, Rect, Vec2};

// ── Shape generators ──

fn square() -> BezierPath {
    BezierPath::rect(Rect::new(16.0, 16.0, 32.0, 32.0))
}

/// A ring made of cubic arcs, close to the curvature of an "o".
fn ring() -> BezierPath {
    const K: f32 = 0.5523;
    let mut path = BezierPath::new();
    for (r, reverse) in [(24.0f32, false), (14.0, true)] {
        let c = Vec2::new(32.0, 32.0);
        let mut pts = [
            Vec2::new(c.x + r, c.y),
            Vec2::new(c.x, c.y + r),
            Vec2::new(c.x - r, c.y),
            Vec2::new(c.x, c.y - r),
        ];
        if reverse {
            pts.reverse();
        }
        path.move_to(pts[0]);
        for i in 0..4 {
            let a = pts[i];
            let b = pts[(i + 1) % 4];
            let ta = Vec2::new(-(a.y - c.y), a.x - c.x) * if reverse { -K } else { K };
            let tb = Vec2::new(-(b.y - c.y), b.x - c.x) * if reverse { -K } else { K };
            path.cubic_to(a + ta, b - tb, b);
        }
        path.close();
    }
    path
}

fn bench_msdf(c: &mut Criterion) {
    let shapes: &[(&str, fn() -> BezierPath)] = &[("square", square), ("ring", ring)];
    let mut group = c.benchmark_group("msdf");
    for &(name, shape) in shapes {
        let path = shape();
        group.bench_with_input(BenchmarkId::from_parameter(name), &path, |b, path| {
            b.iter(|| generate_msdf(black_box(path), 64, 64, 4.0, 0.05));
        });
    }
    group.finish();
}

fn bench_allocator(c: &mut Criterion) {
    let geometry = AtlasGeometry {
        tiles_per_layer: 128,
        layers: 4,
        tile_pixels: 64,
        border: 1,
    };
    c.bench_function("page_allocator/churn", |b| {
        let mut alloc = PageAllocator::new(geometry, 2);
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            match alloc.allocate() {
                Ok(page) => alloc.touch(page, frame),
                Err(_) => {
                    black_box(alloc.evict_until(64, frame));
                }
            }
        });
    });
}

criterion_group!(benches, bench_msdf, bench_allocator);
criterion_main!(benches);
