//! Benchmarks for pixel cleaning, balancing and model fitting
//!
//! Run with: cargo bench --bench pipeline_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use scarp::models::{Classifier, ForestParams, RandomForest};
use scarp::pipeline::{balanced_indices, clean_pixel_table, pixel_table_from_bands, BAND_NAMES};

/// Generate a synthetic pixel table with a few out-of-range values per band
fn generate_pixel_table(n_pixels: usize, seed: u64) -> DataFrame {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let ranges: [(f64, f64); 10] = [
        (-1.0, 360.0),      // aspect
        (-30.0, 942.0),     // elevation
        (0.0, 12.0),        // geology
        (-1.0, 1.0),        // landslide_scars
        (-1.0, 1.0),        // ndvi
        (-8.0, 6.0),        // plan_curv
        (-8.8, 10.5),       // profile_curv
        (0.0, 65.0),        // slope
        (-14.5, 7.1),       // spi
        (-6900.0, 12900.0), // twi
    ];

    let bands: Vec<Vec<f64>> = ranges
        .iter()
        .enumerate()
        .map(|(band, &(lo, hi))| {
            (0..n_pixels)
                .map(|_| {
                    if band == 3 {
                        return if rng.gen::<f64>() < 0.1 { 1.0 } else { -1.0 };
                    }
                    // about 1% of values fall outside the range
                    let span = hi - lo;
                    rng.gen_range(lo - 0.005 * span..hi + 0.005 * span)
                })
                .collect()
        })
        .collect();

    pixel_table_from_bands(&BAND_NAMES, bands, 1, n_pixels).unwrap()
}

/// Two noisy Gaussian-ish blobs with `n_features` columns
fn generate_training_set(n_rows: usize, n_features: usize, seed: u64) -> (Array2<f64>, Array1<u8>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let y: Array1<u8> = (0..n_rows).map(|i| (i % 2) as u8).collect();
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, _)| {
        let centre = if y[i] == 1 { 1.0 } else { -1.0 };
        centre + rng.gen_range(-1.5..1.5)
    });
    (x, y)
}

fn benchmark_cleaning(c: &mut Criterion) {
    let mut group = c.benchmark_group("cleaning");

    for n_pixels in [10_000, 100_000] {
        let df = generate_pixel_table(n_pixels, 42);
        group.throughput(Throughput::Elements(n_pixels as u64));
        group.bench_with_input(BenchmarkId::new("clean", n_pixels), &df, |b, df| {
            b.iter(|| clean_pixel_table(black_box(df)).unwrap())
        });
    }

    group.finish();
}

fn benchmark_balancing(c: &mut Criterion) {
    let mut group = c.benchmark_group("balancing");

    for n in [10_000usize, 100_000] {
        let labels: Vec<u8> = (0..n).map(|i| u8::from(i % 10 == 0)).collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("indices", n), &labels, |b, labels| {
            b.iter(|| balanced_indices(black_box(labels), 42))
        });
    }

    group.finish();
}

fn benchmark_forest(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10);

    for n_rows in [500, 2_000] {
        let (x, y) = generate_training_set(n_rows, 9, 7);
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut forest = RandomForest::new(ForestParams::default());
                forest.fit(black_box(x.view()), black_box(y.view())).unwrap();
                forest
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_cleaning, benchmark_balancing, benchmark_forest);
criterion_main!(benches);
