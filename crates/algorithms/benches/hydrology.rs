//! Benchmarks for the conditioning algorithms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use demflow_algorithms::hydrology::{
    fill_sinks, priority_flood, remove_sinks, sink_route, FillSinksParams, PriorityFloodParams,
    SinkRemovalMethod, SinkRemovalParams, SinkRouteParams,
};
use demflow_core::Raster;

/// Bowl-shaped DEM with deterministic noise so every run sees the same
/// scatter of small depressions.
fn create_basin_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    let center = size as f64 / 2.0;
    for row in 0..size {
        for col in 0..size {
            let dx = col as f64 - center;
            let dy = row as f64 - center;
            let dist = (dx * dx + dy * dy).sqrt();
            let noise = ((row * 7 + col * 13) % 17) as f64 * 0.05;
            dem.set(row, col, dist + noise).unwrap();
        }
    }
    dem
}

fn bench_priority_flood(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/priority_flood");
    for size in [128, 256, 512, 1024] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| priority_flood(black_box(&dem), PriorityFloodParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_fill_sinks(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/fill_sinks");
    for size in [128, 256, 512] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| fill_sinks(black_box(&dem), FillSinksParams { min_slope: 0.01 }).unwrap())
        });
    }
    group.finish();
}

fn bench_sink_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/sink_route");
    for size in [128, 256, 512] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| sink_route(black_box(&dem), SinkRouteParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_remove_sinks(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/remove_sinks");
    for size in [128, 256] {
        let dem = create_basin_dem(size);
        for (label, method) in [
            ("dig", SinkRemovalMethod::DigChannels),
            ("fill", SinkRemovalMethod::FillSinks),
        ] {
            group.bench_with_input(
                BenchmarkId::new(label, size),
                &size,
                |b, _| {
                    b.iter(|| {
                        remove_sinks(
                            black_box(&dem),
                            None,
                            SinkRemovalParams {
                                method,
                                min_slope: 0.01,
                                threshold: None,
                            },
                        )
                        .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_priority_flood,
    bench_fill_sinks,
    bench_sink_route,
    bench_remove_sinks,
);
criterion_main!(benches);
