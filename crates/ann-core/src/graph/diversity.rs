//! Vamana alpha-relaxed neighbor diversity (`spec.md` §4.3), generalized
//! from the teacher's `NativeHnsw::select_neighbors` into an explicit
//! provider so it can run against either exact or PQ-approximate
//! similarity (see [`crate::score_provider`]).

use crate::error::{Error, Result};
use crate::vector_source::Ordinal;

/// Pairwise similarity between two already-known ordinals, under whichever
/// score function (exact or PQ-SDC) the caller is driving diversity with.
pub trait PairwiseSimilarity: Send + Sync {
    /// Similarity between `a` and `b`; higher means closer.
    fn similarity(&self, a: Ordinal, b: Ordinal) -> f32;
}

/// Vamana diversity pruning: keeps a candidate only if no previously
/// accepted neighbor is closer to it (scaled by `alpha`) than the source
/// node is, per `spec.md` §4.3/§9.
#[derive(Debug, Clone, Copy)]
pub struct VamanaDiversityProvider {
    /// Relaxation factor; `1.0` is the strict Vamana rule, larger values
    /// admit more (denser, less pruned) neighbor lists.
    pub alpha: f32,
    /// Hard cap on the number of neighbors selected.
    pub max_degree: usize,
}

impl VamanaDiversityProvider {
    /// Selects at most `max_degree` diverse neighbors from `candidates`,
    /// which must already be sorted by descending similarity to the
    /// source node.
    ///
    /// # Errors
    ///
    /// `Error::InvariantViolation` if `candidates` is not sorted
    /// descending by score.
    pub fn select(
        &self,
        candidates: &[(Ordinal, f32)],
        pairwise: &dyn PairwiseSimilarity,
    ) -> Result<Vec<(Ordinal, f32)>> {
        if candidates.windows(2).any(|w| w[0].1 < w[1].1) {
            return Err(Error::InvariantViolation(
                "diversity predicate requires candidates sorted by descending score".into(),
            ));
        }

        let mut accepted: Vec<(Ordinal, f32)> = Vec::with_capacity(self.max_degree);
        for &(candidate, score) in candidates {
            if accepted.len() >= self.max_degree {
                break;
            }
            let dominated = accepted
                .iter()
                .any(|&(accepted_ord, _)| self.alpha * pairwise.similarity(candidate, accepted_ord) > score);
            if !dominated {
                accepted.push((candidate, score));
            }
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct TableSimilarity(HashMap<(Ordinal, Ordinal), f32>);

    impl PairwiseSimilarity for TableSimilarity {
        fn similarity(&self, a: Ordinal, b: Ordinal) -> f32 {
            self.0.get(&(a, b)).or_else(|| self.0.get(&(b, a))).copied().unwrap_or(0.0)
        }
    }

    #[test]
    fn rejects_unsorted_candidates() {
        let provider = VamanaDiversityProvider { alpha: 1.0, max_degree: 2 };
        let pairwise = TableSimilarity(HashMap::new());
        let err = provider.select(&[(1, 0.1), (2, 0.9)], &pairwise).unwrap_err();
        assert_eq!(err.code(), "ANN-003");
    }

    /// Scenario B: v0=[1,0], v1=[0.99,0.01], v2=[0,1], max_degree=2, alpha=1.0,
    /// dot product. Inserting v0, v1, v2 in order keeps both v1 and v2 as
    /// neighbors of v0 since alpha*sim(v1,v2) does not exceed sim(v0,v2).
    #[test]
    fn scenario_b_diversity_edge_keeps_both_neighbors() {
        let sim_v0_v1 = 0.99f32;
        let sim_v0_v2 = 0.0f32;
        let sim_v1_v2 = 0.01f32;

        let mut table = HashMap::new();
        table.insert((1u32, 2u32), sim_v1_v2);
        let pairwise = TableSimilarity(table);

        let provider = VamanaDiversityProvider { alpha: 1.0, max_degree: 2 };
        let candidates = [(1u32, sim_v0_v1), (2u32, sim_v0_v2)];
        let selected = provider.select(&candidates, &pairwise).unwrap();
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().any(|&(o, _)| o == 1));
        assert!(selected.iter().any(|&(o, _)| o == 2));
    }

    #[test]
    fn strict_alpha_prunes_a_dominated_candidate() {
        let mut table = HashMap::new();
        table.insert((1u32, 2u32), 0.95f32);
        let pairwise = TableSimilarity(table);

        let provider = VamanaDiversityProvider { alpha: 1.0, max_degree: 2 };
        let candidates = [(1u32, 0.99f32), (2u32, 0.5f32)];
        let selected = provider.select(&candidates, &pairwise).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, 1);
    }
}
