//! GEMM benchmark comparison.
//!
//! Compares the blocked kernel against the naive triple loop and ndarray,
//! and the blocked kernel across scheduler backends.
//!
//! # Usage:
//! ```bash
//! cargo bench --bench gemm
//! cargo bench --bench gemm -- gemm_backends
//! ```

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use numkern::{matmul_into, Backend, GemmVariant, Matrix, Scheduler, StorageOrder};

fn random_matrix(rows: usize, cols: usize, rng: &mut StdRng) -> Matrix<f64> {
    Matrix::random(rows, cols, StorageOrder::RowMajor, rng).unwrap()
}

/// One group per size: naive, blocked and ndarray side by side.
fn bench_gemm_by_size(c: &mut Criterion) {
    let sizes = [(64, 64, 64), (128, 128, 128), (256, 256, 256), (300, 200, 100)];
    let scheduler = Scheduler::new(Backend::WorkStealing, 0).unwrap();

    for (m, k, n) in sizes {
        let mut group = c.benchmark_group(format!("gemm_{m}x{k}x{n}"));
        group.sample_size(20);
        group.throughput(Throughput::Elements((2 * m * k * n) as u64));

        let mut rng = StdRng::seed_from_u64(42);
        let a = random_matrix(m, k, &mut rng);
        let b = random_matrix(k, n, &mut rng);
        let mut out = Matrix::zeros(m, n, StorageOrder::RowMajor).unwrap();

        if m * k * n <= 128 * 128 * 128 {
            group.bench_function("naive", |bencher| {
                bencher.iter(|| {
                    matmul_into(&scheduler, GemmVariant::Naive, black_box(&a), black_box(&b), &mut out)
                        .unwrap()
                })
            });
        }

        group.bench_function("blocked", |bencher| {
            bencher.iter(|| {
                matmul_into(&scheduler, GemmVariant::Blocked, black_box(&a), black_box(&b), &mut out)
                    .unwrap()
            })
        });

        let a_nd = a.to_array();
        let b_nd = b.to_array();
        group.bench_function("ndarray", |bencher| {
            bencher.iter(|| black_box(&a_nd).dot(black_box(&b_nd)))
        });

        group.finish();
    }
}

/// The blocked kernel at one size under every backend.
fn bench_gemm_backends(c: &mut Criterion) {
    let size = 256;
    let mut group = c.benchmark_group("gemm_backends");
    group.sample_size(20);

    let mut rng = StdRng::seed_from_u64(42);
    let a = random_matrix(size, size, &mut rng);
    let b = random_matrix(size, size, &mut rng);
    let mut out = Matrix::zeros(size, size, StorageOrder::RowMajor).unwrap();

    for backend in Backend::ALL {
        // Only one scheduler may exist at a time.
        let scheduler = Scheduler::new(backend, 0).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(backend), &backend, |bencher, _| {
            bencher.iter(|| {
                matmul_into(&scheduler, GemmVariant::Blocked, black_box(&a), black_box(&b), &mut out)
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_gemm_by_size, bench_gemm_backends);
criterion_main!(benches);
