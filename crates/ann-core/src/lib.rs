//! A concurrently-constructed, hierarchically-layered proximity graph for
//! approximate nearest neighbor search, with optional Product Quantization
//! compression and pluggable SIMD distance kernels.
//!
//! The crate is organized around the seven components of the search
//! pipeline: distance kernels ([`simd`]), PQ compression ([`pq`]), the
//! concurrent neighbor map and layered graph ([`graph`]), incremental
//! construction ([`builder`]), beam search ([`searcher`]), and the score
//! providers ([`score_provider`]) that connect a [`vector_source`] to both.
//! [`persist`] serializes a built graph and a trained PQ codebook to a
//! stable on-disk format; [`config`] loads build/search/PQ parameters from
//! defaults, a TOML file, and the environment; [`metrics`] is the
//! recall/precision/MRR oracle the benchmark harness and test suite score
//! against.

pub mod bits;
pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod persist;
pub mod pq;
pub mod score_provider;
pub mod searcher;
pub mod simd;
pub mod vector_source;

pub use builder::{BuildParams, GraphBuilder};
pub use config::GraphConfig;
pub use error::{Error, Result};
pub use score_provider::{BuildScoreProvider, PqBuildScoreProvider, RandomAccessScoreProvider, SearchProviders};
pub use searcher::{search, SearchParams, SearchResult};
pub use vector_source::{InMemoryVectorSource, Ordinal, Similarity, VectorSource};
