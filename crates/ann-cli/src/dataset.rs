//! Synthetic dataset generation for the benchmark harness: random base
//! vectors plus held-out queries, generated from a fixed seed so a run is
//! reproducible given the same `BenchConfig`.

use crate::bench_config::DatasetConfig;
use ann_core::InMemoryVectorSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A generated dataset: base vectors (wrapped as a ready-to-build
/// [`InMemoryVectorSource`]) and a disjoint set of query vectors.
pub struct Dataset {
    /// Base vectors the graph is built over.
    pub base: InMemoryVectorSource,
    /// Query vectors searched against the built graph.
    pub queries: Vec<Vec<f32>>,
}

fn random_vector(rng: &mut StdRng, dimension: usize) -> Vec<f32> {
    (0..dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

/// Generates `config.vectors` base vectors and `config.queries` query
/// vectors, all of `config.dimension` dimensions, from `config.seed`.
///
/// # Errors
///
/// Propagates `ann_core`'s ragged-input rejection, which cannot actually
/// trigger here since every generated vector shares `config.dimension`.
pub fn generate(config: &DatasetConfig) -> anyhow::Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let base_vectors: Vec<Vec<f32>> = (0..config.vectors).map(|_| random_vector(&mut rng, config.dimension)).collect();
    let queries: Vec<Vec<f32>> = (0..config.queries).map(|_| random_vector(&mut rng, config.dimension)).collect();
    let base = InMemoryVectorSource::new(base_vectors)?;
    Ok(Dataset { base, queries })
}
