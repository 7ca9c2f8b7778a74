//! Benchmark harness configuration, loaded the same way `ann-core`'s own
//! [`ann_core::GraphConfig`] is: layered defaults → TOML file → environment,
//! via `figment`.

use ann_core::GraphConfig;
use ann_core::Similarity;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Synthetic dataset shape the harness builds and queries against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Number of base vectors to build the graph over.
    pub vectors: usize,
    /// Dimensionality of each vector.
    pub dimension: usize,
    /// Number of held-out query vectors to run recall against.
    pub queries: usize,
    /// `top_k` used both for ground truth and for the graph search.
    pub top_k: usize,
    /// Similarity function the dataset is scored under.
    pub similarity: Similarity,
    /// PRNG seed for reproducible vector generation.
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self { vectors: 10_000, dimension: 128, queries: 100, top_k: 10, similarity: Similarity::DotProduct, seed: 0xA11C_E5EE }
    }
}

/// Top-level harness configuration: the dataset shape plus the same
/// build/search/PQ parameters `ann-core` itself accepts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BenchConfig {
    /// Synthetic dataset shape.
    pub dataset: DatasetConfig,
    /// Graph construction/search/PQ parameters.
    pub graph: GraphConfig,
}

impl BenchConfig {
    /// Loads configuration layering defaults, an optional TOML file, and
    /// `ANNBENCH_*` environment variables, in that priority order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file fails to parse or a resolved value
    /// violates a documented build-config invariant.
    pub fn load(toml_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = toml_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("ANNBENCH_").split("_"));
        let config: Self = figment.extract()?;
        config.graph.build.validate()?;
        Ok(config)
    }
}
