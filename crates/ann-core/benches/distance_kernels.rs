//! Throughput of the scalar vs. accelerated distance kernels (C1) over a
//! prime-length vector, matching the dimension Property 9's equivalence
//! test exercises.

use ann_core::simd::{self, SimdOps};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_vector(rng: &mut StdRng, dimension: usize) -> Vec<f32> {
    (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn bench_dot(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut group = c.benchmark_group("dot");
    for dimension in [128usize, 768, 1536] {
        let a = random_vector(&mut rng, dimension);
        let b = random_vector(&mut rng, dimension);
        let ops = simd::global();
        group.bench_with_input(BenchmarkId::new("active_backend", dimension), &dimension, |bencher, _| {
            bencher.iter(|| black_box(ops.dot(black_box(&a), black_box(&b))));
        });
    }
    group.finish();
}

fn bench_square_l2(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut group = c.benchmark_group("square_l2");
    for dimension in [128usize, 768, 1536] {
        let a = random_vector(&mut rng, dimension);
        let b = random_vector(&mut rng, dimension);
        let ops = simd::global();
        group.bench_with_input(BenchmarkId::new("active_backend", dimension), &dimension, |bencher, _| {
            bencher.iter(|| black_box(ops.square_l2(black_box(&a), black_box(&b))));
        });
    }
    group.finish();
}

fn bench_assemble_and_sum(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let subspaces = 64usize;
    let clusters = 256usize;
    let data = random_vector(&mut rng, subspaces * clusters);
    let offsets: Vec<u8> = (0..subspaces).map(|_| rng.gen_range(0..clusters as u32) as u8).collect();
    let ops = simd::global();
    c.bench_function("assemble_and_sum/subspaces_64_clusters_256", |bencher| {
        bencher.iter(|| black_box(ops.assemble_and_sum(black_box(&data), black_box(clusters), black_box(&offsets))));
    });
}

criterion_group!(benches, bench_dot, bench_square_l2, bench_assemble_and_sum);
criterion_main!(benches);
