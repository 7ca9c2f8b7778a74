//! Throughput of graph construction and query-time search (C5/C6) over a
//! synthetic dataset, at the scale Scenario E's recall check uses.

use ann_core::bits::AllBits;
use ann_core::score_provider::{BuildScoreProvider, RandomAccessScoreProvider};
use ann_core::{search, BuildParams, GraphBuilder, GraphConfig, InMemoryVectorSource, SearchParams, Similarity};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn random_vectors(rng: &mut StdRng, count: usize, dimension: usize) -> Vec<Vec<f32>> {
    (0..count).map(|_| (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect()).collect()
}

fn build_index(vectors: Vec<Vec<f32>>) -> (Arc<InMemoryVectorSource>, ann_core::graph::GraphIndex) {
    let source = Arc::new(InMemoryVectorSource::new(vectors).unwrap());
    let provider: Arc<dyn BuildScoreProvider> =
        Arc::new(RandomAccessScoreProvider::new(Arc::clone(&source), Similarity::DotProduct));
    let params = GraphConfig::default().build;
    let build_params =
        BuildParams { max_degree: params.max_degree, beam_width: params.beam_width, alpha: params.alpha, neighbor_overflow: params.neighbor_overflow, add_hierarchy: params.add_hierarchy };
    let builder = GraphBuilder::new(provider, Arc::clone(&source), build_params);
    builder.build();
    builder.cleanup();
    (source, builder.into_index())
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for size in [200usize, 1000] {
        let mut rng = StdRng::seed_from_u64(11);
        let vectors = random_vectors(&mut rng, size, 16);
        group.bench_with_input(BenchmarkId::new("concurrent", size), &size, |bencher, _| {
            bencher.iter(|| black_box(build_index(vectors.clone())));
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let vectors = random_vectors(&mut rng, 2000, 16);
    let (source, index) = build_index(vectors);
    let provider = RandomAccessScoreProvider::new(Arc::clone(&source), Similarity::DotProduct);
    let view = index.get_view();
    let accept = AllBits;
    let query: Vec<f32> = random_vectors(&mut rng, 1, 16).pop().unwrap();
    let params = SearchParams { top_k: 10, ..SearchParams::default() };

    c.bench_function("search/top_10_over_2000", |bencher| {
        bencher.iter(|| {
            let providers = provider.search_provider_for(&query);
            black_box(search(&view, &providers, &params, &accept))
        });
    });
}

criterion_group!(benches, bench_build, bench_search);
criterion_main!(benches);
