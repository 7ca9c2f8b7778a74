//! Score providers (C7): bind a concrete similarity/storage combination to
//! the generic search (C6) and diversity (C3) algorithms, per `spec.md`
//! §4.7.
//!
//! New code relative to the teacher — `NativeHnsw` is generic over a
//! single `DistanceEngine`, not a swappable per-query strategy — but
//! grounded in the shape of that trait: a small object bound to one query,
//! queried per candidate, with no side effects observable from outside.

use crate::error::Result;
use crate::graph::PairwiseSimilarity;
use crate::pq::{AdcTables, EncodedVectorStore, PqCodebook, SdcTables};
use crate::vector_source::{CompressedVectors, Ordinal, Similarity, VectorSource};
use std::sync::Arc;

/// Exact scoring never applies the `[0,1]` rescale `spec.md` §4.2
/// prescribes for PQ ADC tables (that rescale exists only so dot-product
/// and L2 approximate scores combine comparably under one beam); callers
/// of a non-PQ score provider get the similarity measure's own natural
/// value. Dot product and cosine are already "higher is better", so only
/// squared L2 needs a monotonic inversion so it sorts the same direction
/// in a max-first beam.
fn exact_similarity(similarity: Similarity, a: &[f32], b: &[f32]) -> f32 {
    let ops = crate::simd::global();
    match similarity {
        Similarity::DotProduct => ops.dot(a, b),
        Similarity::SquaredL2 => -ops.square_l2(a, b),
        Similarity::Cosine => ops.dot(a, b) / (ops.dot(a, a).sqrt() * ops.dot(b, b).sqrt()),
    }
}

/// The pair of scoring functions a search needs for one query: a cheap
/// approximate one driving the beam, and an exact (or identical) one for
/// the optional rerank phase.
pub struct SearchProviders<'a> {
    /// Approximate score, used during beam expansion.
    pub approx: Box<dyn Fn(Ordinal) -> f32 + 'a>,
    /// Exact score, used to reorder the rerank buffer. Identical to
    /// `approx` when no cheaper approximation exists.
    pub rerank: Box<dyn Fn(Ordinal) -> f32 + 'a>,
}

/// Binds a similarity and a storage backend to the generic build/search
/// algorithms.
pub trait BuildScoreProvider: Send + Sync {
    /// Scoring functions for a single query.
    fn search_provider_for<'a>(&'a self, query: &'a [f32]) -> SearchProviders<'a>;

    /// A pairwise similarity function for diversity pruning around `node`.
    fn diversity_provider_for(&self, node: Ordinal) -> Box<dyn PairwiseSimilarity + '_>;
}

struct ExactPairwise<'a, V: VectorSource> {
    ravv: &'a V,
    similarity: Similarity,
    graph_to_ravv_map: Option<&'a [Ordinal]>,
}

impl<'a, V: VectorSource> ExactPairwise<'a, V> {
    fn resolve(&self, ordinal: Ordinal) -> Ordinal {
        self.graph_to_ravv_map.map_or(ordinal, |map| map[ordinal as usize])
    }
}

impl<'a, V: VectorSource> PairwiseSimilarity for ExactPairwise<'a, V> {
    fn similarity(&self, a: Ordinal, b: Ordinal) -> f32 {
        let va = self.ravv.get_vector(self.resolve(a));
        let vb = self.ravv.get_vector(self.resolve(b));
        exact_similarity(self.similarity, va, vb)
    }
}

/// Exact-only score provider over random-access vector storage, optionally
/// translating graph ordinals through a `graph_to_ravv_map` so the graph's
/// ordinal space may differ from the underlying storage's (`spec.md`
/// §4.7, Property 8).
pub struct RandomAccessScoreProvider<V: VectorSource> {
    ravv: Arc<V>,
    similarity: Similarity,
    graph_to_ravv_map: Option<Vec<Ordinal>>,
}

impl<V: VectorSource> RandomAccessScoreProvider<V> {
    /// A provider whose graph ordinals equal storage ordinals directly.
    #[must_use]
    pub fn new(ravv: Arc<V>, similarity: Similarity) -> Self {
        Self { ravv, similarity, graph_to_ravv_map: None }
    }

    /// A provider that first translates a graph ordinal through `map`
    /// before reading from storage.
    #[must_use]
    pub fn with_ordinal_map(ravv: Arc<V>, similarity: Similarity, map: Vec<Ordinal>) -> Self {
        Self { ravv, similarity, graph_to_ravv_map: Some(map) }
    }

    fn resolve(&self, ordinal: Ordinal) -> Ordinal {
        self.graph_to_ravv_map.as_ref().map_or(ordinal, |map| map[ordinal as usize])
    }

    /// The exact similarity between two graph ordinals, translated through
    /// the ordinal map if one is bound. Used directly by Property 8's test.
    #[must_use]
    pub fn similarity_to(&self, a: Ordinal, b: Ordinal) -> f32 {
        let va = self.ravv.get_vector(self.resolve(a));
        let vb = self.ravv.get_vector(self.resolve(b));
        exact_similarity(self.similarity, va, vb)
    }
}

impl<V: VectorSource> BuildScoreProvider for RandomAccessScoreProvider<V> {
    fn search_provider_for<'a>(&'a self, query: &'a [f32]) -> SearchProviders<'a> {
        let score = move |ordinal: Ordinal| {
            let vector = self.ravv.get_vector(self.resolve(ordinal));
            exact_similarity(self.similarity, query, vector)
        };
        SearchProviders { approx: Box::new(score), rerank: Box::new(score) }
    }

    fn diversity_provider_for(&self, _node: Ordinal) -> Box<dyn PairwiseSimilarity + '_> {
        Box::new(ExactPairwise {
            ravv: self.ravv.as_ref(),
            similarity: self.similarity,
            graph_to_ravv_map: self.graph_to_ravv_map.as_deref(),
        })
    }
}

struct SdcPairwise<'a> {
    table: &'a SdcTables,
    codes: &'a EncodedVectorStore,
}

impl<'a> PairwiseSimilarity for SdcPairwise<'a> {
    fn similarity(&self, a: Ordinal, b: Ordinal) -> f32 {
        self.table.score_pair(self.codes.read(a), 0, self.codes.read(b), 0)
    }
}

/// PQ-backed score provider: an approximate ADC score from encoded codes,
/// optionally reranked with an exact score from bound full-precision
/// storage, and SDC-based diversity.
pub struct PqBuildScoreProvider<V: VectorSource> {
    similarity: Similarity,
    codebook: Arc<PqCodebook>,
    codes: Arc<EncodedVectorStore>,
    ravv: Option<Arc<V>>,
}

impl<V: VectorSource> PqBuildScoreProvider<V> {
    /// A provider with no rerank source: `rerank` falls back to `approx`.
    #[must_use]
    pub fn new(similarity: Similarity, codebook: Arc<PqCodebook>, codes: Arc<EncodedVectorStore>) -> Self {
        Self { similarity, codebook, codes, ravv: None }
    }

    /// A provider that reranks against full-precision vectors in `ravv`.
    #[must_use]
    pub fn with_rerank_source(
        similarity: Similarity,
        codebook: Arc<PqCodebook>,
        codes: Arc<EncodedVectorStore>,
        ravv: Arc<V>,
    ) -> Self {
        Self { similarity, codebook, codes, ravv: Some(ravv) }
    }
}

impl<V: VectorSource> BuildScoreProvider for PqBuildScoreProvider<V> {
    fn search_provider_for<'a>(&'a self, query: &'a [f32]) -> SearchProviders<'a> {
        // Dimension mismatches are a caller contract violation (this
        // provider is always built against a fixed, already-trained
        // codebook), not a runtime condition callers need to recover
        // from, so this asserts rather than threading a `Result` through
        // a trait contract the spec documents as total.
        let table = Arc::new(
            AdcTables::build(&self.codebook, query, self.similarity)
                .expect("query dimension must match the provider's trained codebook"),
        );
        let codes = Arc::clone(&self.codes);
        let approx_table = Arc::clone(&table);
        let approx = move |ordinal: Ordinal| approx_table.score(codes.read(ordinal));

        match &self.ravv {
            Some(ravv) => {
                let ravv = Arc::clone(ravv);
                let similarity = self.similarity;
                let rerank = move |ordinal: Ordinal| exact_similarity(similarity, query, ravv.get_vector(ordinal));
                SearchProviders { approx: Box::new(approx), rerank: Box::new(rerank) }
            }
            None => {
                let codes = Arc::clone(&self.codes);
                let rerank = move |ordinal: Ordinal| table.score(codes.read(ordinal));
                SearchProviders { approx: Box::new(approx), rerank: Box::new(rerank) }
            }
        }
    }

    fn diversity_provider_for(&self, _node: Ordinal) -> Box<dyn PairwiseSimilarity + '_> {
        let table = SdcTables::build(&self.codebook, self.similarity).expect("cosine is rejected before reaching here");
        Box::new(SdcPairwiseOwned { table, codes: Arc::clone(&self.codes) })
    }
}

/// The spec's external `CompressedVectors` contract (`spec.md` §6): a
/// caller that only has PQ-encoded storage gets an approximate score
/// function per query without needing to touch `AdcTables` directly.
impl<V: VectorSource> CompressedVectors for PqBuildScoreProvider<V> {
    fn size(&self) -> usize {
        self.codes.layout().n
    }

    fn approximate_score_function(&self, query: &[f32]) -> Box<dyn Fn(Ordinal) -> f32 + '_> {
        let table = AdcTables::build(&self.codebook, query, self.similarity)
            .expect("query dimension must match the provider's trained codebook");
        let codes = Arc::clone(&self.codes);
        Box::new(move |ordinal: Ordinal| table.score(codes.read(ordinal)))
    }
}

struct SdcPairwiseOwned {
    table: SdcTables,
    codes: Arc<EncodedVectorStore>,
}

impl PairwiseSimilarity for SdcPairwiseOwned {
    fn similarity(&self, a: Ordinal, b: Ordinal) -> f32 {
        self.table.score_pair(self.codes.read(a), 0, self.codes.read(b), 0)
    }
}

/// Builds the PQ diversity table up front, surfacing its `Unsupported`
/// error instead of panicking, for callers that construct a
/// [`PqBuildScoreProvider`] with a cosine similarity ahead of time.
pub fn validate_pq_provider_similarity(similarity: Similarity, codebook: &PqCodebook) -> Result<()> {
    SdcTables::build(codebook, similarity).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_source::InMemoryVectorSource;

    /// Property 8: graph_to_ravv_map = [2,0,1], v0=[1,0], v1=[0,1],
    /// v2=[-1,0], dot product: similarity_to(0,1) == dot(v2, v0).
    #[test]
    fn property_8_ordinal_mapping_translates_before_scoring() {
        let source = Arc::new(
            InMemoryVectorSource::new(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]]).unwrap(),
        );
        let provider =
            RandomAccessScoreProvider::with_ordinal_map(source, Similarity::DotProduct, vec![2, 0, 1]);

        // dot(v2, v0) = dot([-1,0], [1,0]) = -1, exactly, with no rescale.
        let expected = -1.0f32;
        assert!((provider.similarity_to(0, 1) - expected).abs() < 1e-6);
    }

    #[test]
    fn exact_provider_rerank_matches_approx() {
        let source = Arc::new(InMemoryVectorSource::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap());
        let provider = RandomAccessScoreProvider::new(source, Similarity::DotProduct);
        let query = [1.0, 0.0];
        let providers = provider.search_provider_for(&query);
        assert!(((providers.approx)(0) - (providers.rerank)(0)).abs() < 1e-6);
    }

    /// `spec.md` §6's external `CompressedVectors` contract: the nearest
    /// encoded code to a query scores at least as high as a far-off one,
    /// driven through the trait object rather than `AdcTables` directly.
    #[test]
    fn compressed_vectors_scores_nearest_code_highest() {
        use crate::pq::codebook::PqTrainParams;

        let vectors = vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0, 0.0]];
        let codebook = Arc::new(
            PqCodebook::train(
                &vectors,
                PqTrainParams {
                    subspaces: 2,
                    clusters: 3,
                    anisotropic_threshold: None,
                    max_iterations: 10,
                    use_global_centroid: false,
                },
            )
            .unwrap(),
        );
        let source = InMemoryVectorSource::new(vectors.clone()).unwrap();
        let mut store = EncodedVectorStore::new(vectors.len(), 2).unwrap();
        store.encode_all(&source, &codebook).unwrap();

        let provider = PqBuildScoreProvider::<InMemoryVectorSource>::new(
            Similarity::DotProduct,
            Arc::clone(&codebook),
            Arc::new(store),
        );
        let compressed: &dyn CompressedVectors = &provider;
        assert_eq!(compressed.size(), vectors.len());

        let score = compressed.approximate_score_function(&vectors[0]);
        let best = score(0);
        for other in 1..vectors.len() as u32 {
            assert!(best >= score(other));
        }
    }
}
