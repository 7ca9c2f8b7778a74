//! Search-quality metrics and an exact k-NN oracle, grounded in the
//! teacher's `metrics.rs` (recall@k / precision@k / MRR). `spec.md` scopes
//! exact k-NN out of the core except "as a baseline for test oracles"; this
//! module is that oracle plus the scoring the benchmark harness (`ann-cli`)
//! reports against it.

use crate::simd;
use crate::vector_source::{Ordinal, Similarity, VectorSource};
use std::collections::HashSet;
use std::hash::Hash;

fn convert_to_similarity(similarity: Similarity, raw: f32) -> f32 {
    match similarity {
        Similarity::DotProduct => (1.0 + raw) / 2.0,
        Similarity::SquaredL2 => 1.0 / (1.0 + raw),
        Similarity::Cosine => raw,
    }
}

/// Brute-force exact top-`k` search, used only as a ground-truth oracle in
/// tests and benchmarks — never on the build/search hot path
/// (`spec.md` §1 Non-goals).
#[must_use]
pub fn exact_top_k<V: VectorSource>(ravv: &V, query: &[f32], similarity: Similarity, k: usize) -> Vec<(Ordinal, f32)> {
    let ops = simd::global();
    let mut scored: Vec<(Ordinal, f32)> = (0..ravv.size() as u32)
        .map(|ordinal| {
            let vector = ravv.get_vector(ordinal);
            let raw = match similarity {
                Similarity::DotProduct | Similarity::Cosine => ops.dot(query, vector),
                Similarity::SquaredL2 => ops.square_l2(query, vector),
            };
            let score = if similarity == Similarity::Cosine {
                raw / (ops.dot(query, query).sqrt() * ops.dot(vector, vector).sqrt())
            } else {
                convert_to_similarity(similarity, raw)
            };
            (ordinal, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}

/// Recall@k: `|ground_truth ∩ results| / |ground_truth|`. `0.0` if
/// `ground_truth` is empty.
#[must_use]
pub fn recall_at_k<T: Eq + Hash + Copy>(ground_truth: &[T], results: &[T]) -> f64 {
    if ground_truth.is_empty() {
        return 0.0;
    }
    let truth: HashSet<T> = ground_truth.iter().copied().collect();
    let found = results.iter().filter(|id| truth.contains(id)).count();
    found as f64 / ground_truth.len() as f64
}

/// Precision@k: `|ground_truth ∩ results| / |results|`. `0.0` if `results`
/// is empty.
#[must_use]
pub fn precision_at_k<T: Eq + Hash + Copy>(ground_truth: &[T], results: &[T]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let truth: HashSet<T> = ground_truth.iter().copied().collect();
    let relevant = results.iter().filter(|id| truth.contains(id)).count();
    relevant as f64 / results.len() as f64
}

/// Mean Reciprocal Rank: `1 / rank_of_first_relevant_result`, `0.0` if none
/// of `results` is in `ground_truth`.
#[must_use]
pub fn mrr<T: Eq + Hash + Copy>(ground_truth: &[T], results: &[T]) -> f64 {
    let truth: HashSet<T> = ground_truth.iter().copied().collect();
    for (rank, id) in results.iter().enumerate() {
        if truth.contains(id) {
            return 1.0 / (rank + 1) as f64;
        }
    }
    0.0
}

/// Averages recall/precision/MRR across a batch of queries, returning
/// `(avg_recall, avg_precision, avg_mrr)`. `(0.0, 0.0, 0.0)` if either list
/// is empty.
#[must_use]
pub fn average_metrics<T: Eq + Hash + Copy>(ground_truths: &[Vec<T>], results_list: &[Vec<T>]) -> (f64, f64, f64) {
    if ground_truths.is_empty() || results_list.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = ground_truths.len().min(results_list.len());
    let mut total = (0.0, 0.0, 0.0);
    for (gt, res) in ground_truths.iter().zip(results_list).take(n) {
        total.0 += recall_at_k(gt, res);
        total.1 += precision_at_k(gt, res);
        total.2 += mrr(gt, res);
    }
    let n = n as f64;
    (total.0 / n, total.1 / n, total.2 / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_source::InMemoryVectorSource;

    #[test]
    fn recall_is_perfect_when_results_equal_ground_truth() {
        let gt = vec![1u32, 2, 3];
        let results = vec![1u32, 2, 3];
        assert!((recall_at_k(&gt, &results) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn recall_is_partial_when_some_items_missing() {
        let gt = vec![1u32, 2, 3, 4, 5];
        let results = vec![1u32, 3, 6, 2, 7];
        assert!((recall_at_k(&gt, &results) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn mrr_rewards_an_early_hit() {
        let gt = vec![5u32];
        assert!((mrr(&gt, &[1, 2, 5]) - (1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(mrr(&gt, &[1, 2, 3]), 0.0);
    }

    #[test]
    fn exact_top_k_orders_by_similarity() {
        let source = InMemoryVectorSource::new(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.1]]).unwrap();
        let top = exact_top_k(&source, &[1.0, 0.0], Similarity::DotProduct, 2);
        assert_eq!(top[0].0, 0);
        assert_eq!(top[1].0, 2);
    }
}
