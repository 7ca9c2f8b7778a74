//! Asymmetric (ADC) and symmetric (SDC) PQ scoring tables (`spec.md` §4.2).
//!
//! Both precompute per-subspace partial similarity tables once — per query
//! for ADC, once per codebook for SDC — then lean on the
//! [`crate::simd::SimdOps::assemble_and_sum`] / `assemble_and_sum_pq` hot
//! paths to score a candidate in `O(M)` instead of `O(M * original_dim)`.

use super::codebook::PqCodebook;
use crate::error::{Error, Result};
use crate::simd;
use crate::vector_source::Similarity;

fn convert_to_similarity(similarity: Similarity, raw: f32) -> f32 {
    match similarity {
        Similarity::DotProduct => (1.0 + raw) / 2.0,
        Similarity::SquaredL2 => 1.0 / (1.0 + raw),
        Similarity::Cosine => raw,
    }
}

/// Precomputed asymmetric (query-to-code) scoring table for one query.
pub struct AdcTables {
    subspaces: usize,
    clusters: usize,
    similarity: Similarity,
    partial_sums: Vec<f32>,
    a_magnitudes: Option<Vec<f32>>,
    b_magnitude: Option<f32>,
}

impl AdcTables {
    /// Builds the table `partial_sums[m*K+j] = sim(query_subvector_m, centroid_m_j)`
    /// for `query` against `codebook`, plus (for cosine) the per-centroid
    /// and query magnitudes `pq_decoded_cosine_similarity` needs.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if `query`'s length does not match
    /// `codebook`'s original dimension.
    pub fn build(codebook: &PqCodebook, query: &[f32], similarity: Similarity) -> Result<Self> {
        if query.len() != codebook.dimension() {
            return Err(Error::InvalidArgument(format!(
                "query dimension {} does not match codebook dimension {}",
                query.len(),
                codebook.dimension()
            )));
        }
        let centered: Vec<f32> = match codebook.global_centroid() {
            Some(c) => query.iter().zip(c).map(|(x, g)| x - g).collect(),
            None => query.to_vec(),
        };

        let ops = simd::global();
        let (offsets, sizes) = codebook.subvector_layout();
        let k = codebook.clusters();
        let m = codebook.subspaces();
        let mut partial_sums = vec![0.0f32; m * k];
        let mut a_magnitudes = (similarity == Similarity::Cosine).then(|| vec![0.0f32; m * k]);

        for s in 0..m {
            let offset = offsets[s];
            let size = sizes[s];
            let query_sub = &centered[offset..offset + size];
            let row = &codebook.centroid_rows()[s];
            for c in 0..k {
                let centroid = &row[c * size..(c + 1) * size];
                let raw = match similarity {
                    Similarity::DotProduct | Similarity::Cosine => ops.dot(query_sub, centroid),
                    Similarity::SquaredL2 => ops.square_l2(query_sub, centroid),
                };
                partial_sums[s * k + c] = if similarity == Similarity::Cosine {
                    raw
                } else {
                    convert_to_similarity(similarity, raw)
                };
                if let Some(mags) = a_magnitudes.as_mut() {
                    mags[s * k + c] = ops.dot(centroid, centroid);
                }
            }
        }

        let b_magnitude = (similarity == Similarity::Cosine).then(|| ops.dot(&centered, &centered));

        Ok(Self { subspaces: m, clusters: k, similarity, partial_sums, a_magnitudes, b_magnitude })
    }

    /// Scores `code` against the query this table was built for.
    #[must_use]
    pub fn score(&self, code: &[u8]) -> f32 {
        let ops = simd::global();
        match self.similarity {
            Similarity::Cosine => ops.pq_decoded_cosine_similarity(
                code,
                0,
                self.subspaces,
                self.clusters,
                &self.partial_sums,
                self.a_magnitudes.as_deref().expect("cosine table always carries magnitudes"),
                self.b_magnitude.expect("cosine table always carries a query magnitude"),
            ),
            Similarity::DotProduct | Similarity::SquaredL2 => {
                ops.assemble_and_sum(&self.partial_sums, self.clusters, code)
            }
        }
    }
}

/// Precomputed symmetric (code-to-code) scoring table, used by diversity
/// pruning. Supports `DotProduct` and `SquaredL2` only: the triangular
/// partial table does not decompose additively for cosine without a
/// per-pair magnitude, matching the source backend's own limitation
/// (`spec.md` §9 Open Question — the core assumes rejection).
pub struct SdcTables {
    subspaces: usize,
    clusters: usize,
    triangle_size: usize,
    partials: Vec<f32>,
}

impl SdcTables {
    /// Builds the per-`(subspace, c1<=c2)` triangular similarity table for
    /// `codebook`.
    ///
    /// # Errors
    ///
    /// `Error::Unsupported` if `similarity` is `Cosine`.
    pub fn build(codebook: &PqCodebook, similarity: Similarity) -> Result<Self> {
        if similarity == Similarity::Cosine {
            return Err(Error::Unsupported("SDC scoring does not support cosine similarity".into()));
        }
        let ops = simd::global();
        let k = codebook.clusters();
        let m = codebook.subspaces();
        let triangle_size = k * (k + 1) / 2;
        let (_, sizes) = codebook.subvector_layout();
        let mut partials = vec![0.0f32; m * triangle_size];

        for s in 0..m {
            let size = sizes[s];
            let row = &codebook.centroid_rows()[s];
            for r in 0..k {
                for c in r..k {
                    let a = &row[r * size..(r + 1) * size];
                    let b = &row[c * size..(c + 1) * size];
                    let raw = match similarity {
                        Similarity::DotProduct => ops.dot(a, b),
                        Similarity::SquaredL2 => ops.square_l2(a, b),
                        Similarity::Cosine => unreachable!("rejected above"),
                    };
                    let tri = r * k - r * r.saturating_sub(1) / 2 + (c - r);
                    partials[s * triangle_size + tri] = convert_to_similarity(similarity, raw);
                }
            }
        }

        Ok(Self { subspaces: m, clusters: k, triangle_size, partials })
    }

    /// Scores the pair of codes at `(code1, off1)` and `(code2, off2)`.
    #[must_use]
    pub fn score_pair(&self, code1: &[u8], off1: usize, code2: &[u8], off2: usize) -> f32 {
        let _ = self.triangle_size;
        simd::global().assemble_and_sum_pq(&self.partials, self.subspaces, code1, off1, code2, off2, self.clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pq::codebook::PqTrainParams;

    fn tiny_codebook() -> PqCodebook {
        let vectors = vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ];
        PqCodebook::train(
            &vectors,
            PqTrainParams {
                subspaces: 2,
                clusters: 4,
                anisotropic_threshold: None,
                max_iterations: 10,
                use_global_centroid: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn adc_scores_exact_match_highest() {
        let codebook = tiny_codebook();
        let query = vec![1.0, 0.0, 0.0, 0.0];
        let table = AdcTables::build(&codebook, &query, Similarity::DotProduct).unwrap();
        let best_code = codebook.encode(Some(&query));
        let best_score = table.score(&best_code);
        for v in [vec![0.0, 1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0, 0.0], vec![0.0, 0.0, 0.0, 1.0]] {
            let other_code = codebook.encode(Some(&v));
            assert!(best_score >= table.score(&other_code));
        }
    }

    #[test]
    fn sdc_rejects_cosine() {
        let codebook = tiny_codebook();
        let err = SdcTables::build(&codebook, Similarity::Cosine).unwrap_err();
        assert_eq!(err.code(), "ANN-004");
    }

    #[test]
    fn sdc_score_is_symmetric_in_argument_order() {
        let codebook = tiny_codebook();
        let table = SdcTables::build(&codebook, Similarity::DotProduct).unwrap();
        let a = codebook.encode(Some(&[1.0, 0.0, 0.0, 0.0]));
        let b = codebook.encode(Some(&[0.0, 1.0, 0.0, 0.0]));
        assert!((table.score_pair(&a, 0, &b, 0) - table.score_pair(&b, 0, &a, 0)).abs() < 1e-6);
    }
}
