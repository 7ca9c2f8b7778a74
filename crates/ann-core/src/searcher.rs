//! Graph searcher (C6): top-layer greedy descent, a best-first base-layer
//! beam search with a bounded results buffer, and an optional exact rerank
//! pass, per `spec.md` §4.6.
//!
//! Grounded in the teacher's `NativeHnsw::search_layer`/
//! `search_layer_single` (min-heap of candidates, bounded max-heap of
//! results, `rustc_hash::FxHashSet` visited set), generalized to: separate
//! approximate/exact score functions, an explicit `rerank_k` buffer
//! distinct from `top_k`, and visit/expand/rerank counters threaded
//! through the state machine (`spec.md` §9 "state-machine-driven search").

use crate::bits::{AllBits, Bits};
use crate::graph::GraphView;
use crate::score_provider::SearchProviders;
use crate::vector_source::Ordinal;
use rustc_hash::FxHashSet;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

/// IEEE-754 total ordering wrapper so `f32` scores can live in a
/// `BinaryHeap`, matching the teacher's `OrderedFloat`.
#[derive(Debug, Clone, Copy)]
struct OrderedFloat(f32);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for OrderedFloat {}
impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Parameters for a single search (`spec.md` §4.6 / §5 deadline note).
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Number of results to return after rerank/truncation.
    pub top_k: usize,
    /// Size of the results buffer carried through the beam search;
    /// `>= top_k`. Only the top `top_k` survive the final truncation.
    pub rerank_k: usize,
    /// Best-first candidate queue width at the base layer.
    pub beam_width: usize,
    /// Reorder the `rerank_k` buffer with the exact score function before
    /// truncating to `top_k`.
    pub rerank: bool,
    /// Gate admission of a candidate into the results buffer on a dynamic
    /// threshold relative to the current `rerank_k`-th score.
    pub pruning: bool,
    /// Stop expanding once this many nodes have been visited; `0` means
    /// unbounded.
    pub visited_budget: usize,
    /// Checked once per beam iteration; never changes result ordering when
    /// unset (`spec.md` §5 "implementations may honor a caller-supplied
    /// deadline").
    pub deadline: Option<Instant>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            rerank_k: 100,
            beam_width: 100,
            rerank: true,
            pruning: true,
            visited_budget: 0,
            deadline: None,
        }
    }
}

/// Ordered `(ordinal, score)` results plus the diagnostic counters
/// `spec.md` §3's `SearchResult` requires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    /// Results ordered by decreasing score, length `<= top_k`.
    pub results: Vec<(Ordinal, f32)>,
    /// Total nodes whose approximate score was evaluated.
    pub visited: usize,
    /// Total nodes popped off the candidate queue and expanded.
    pub expanded: usize,
    /// Of `expanded`, how many were expanded at the base layer (level 0).
    pub expanded_base_layer: usize,
    /// Nodes whose score was recomputed during the rerank phase.
    pub reranked: usize,
}

/// A bounded, best-first beam search over one [`GraphView`] layer,
/// expanding from `entry_points` until the best remaining candidate can no
/// longer improve the `rerank_k`-th result or a visit budget / deadline is
/// reached.
///
/// Returns `(results sorted descending, visited, expanded)`. `results` is
/// capped at `rerank_k`.
#[allow(clippy::too_many_arguments)]
fn beam_search(
    view: &GraphView<'_>,
    approx: &dyn Fn(Ordinal) -> f32,
    level: usize,
    entry_points: &[Ordinal],
    beam_width: usize,
    rerank_k: usize,
    pruning: bool,
    visited_budget: usize,
    deadline: Option<Instant>,
) -> (Vec<(Ordinal, f32)>, usize, usize) {
    let mut visited_set: FxHashSet<Ordinal> = FxHashSet::default();
    let mut candidates: BinaryHeap<(OrderedFloat, Ordinal)> = BinaryHeap::new();
    let mut results: BinaryHeap<Reverse<(OrderedFloat, Ordinal)>> = BinaryHeap::new();
    let mut visited = 0usize;
    let mut expanded = 0usize;

    let buffer_cap = rerank_k.max(beam_width).max(1);

    for &ep in entry_points {
        if visited_set.insert(ep) {
            let score = approx(ep);
            visited += 1;
            candidates.push((OrderedFloat(score), ep));
            results.push(Reverse((OrderedFloat(score), ep)));
            if results.len() > buffer_cap {
                results.pop();
            }
        }
    }

    while let Some((OrderedFloat(c_score), c_node)) = candidates.pop() {
        if visited_budget > 0 && visited >= visited_budget {
            break;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }

        // Termination: the best remaining candidate can no longer improve
        // the current k-th result (`spec.md` §4.6 base-layer beam).
        let kth = results.peek().map_or(f32::NEG_INFINITY, |r| (r.0).0 .0);
        if results.len() >= buffer_cap && c_score < kth {
            break;
        }

        expanded += 1;
        let is_base_layer = level == 0;
        let _ = is_base_layer; // counted by the caller, which knows `level`.

        for (neighbor, _edge_score) in view.neighbors(level, c_node) {
            if !visited_set.insert(neighbor) {
                continue;
            }
            let score = approx(neighbor);
            visited += 1;

            let kth = results.peek().map_or(f32::NEG_INFINITY, |r| (r.0).0 .0);
            let admits = results.len() < buffer_cap || score > kth;
            if pruning && !admits {
                continue;
            }
            if admits || !pruning {
                candidates.push((OrderedFloat(score), neighbor));
                results.push(Reverse((OrderedFloat(score), neighbor)));
                if results.len() > buffer_cap {
                    results.pop();
                }
            }
        }
    }

    let mut out: Vec<(Ordinal, f32)> =
        results.into_iter().map(|Reverse((OrderedFloat(s), n))| (n, s)).collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1));
    out.truncate(rerank_k);
    (out, visited, expanded)
}

/// Greedy 1-best descent from `start` down through `view`'s levels,
/// stopping once it has walked level `floor_level` (inclusive). Used both
/// by a full top-to-base search and by the builder's "find the entry point
/// at level L" step (`spec.md` §4.5 step 2, beam width 1).
///
/// Returns `(node, visited)`.
fn greedy_descend(
    view: &GraphView<'_>,
    approx: &dyn Fn(Ordinal) -> f32,
    start: Ordinal,
    from_level: usize,
    floor_level: usize,
) -> (Ordinal, usize) {
    let mut best = start;
    let mut best_score = approx(best);
    let mut visited = 1usize;

    if from_level < floor_level {
        return (best, visited);
    }

    for level in (floor_level..=from_level).rev() {
        loop {
            let mut improved = false;
            for (neighbor, _) in view.neighbors(level, best) {
                let score = approx(neighbor);
                visited += 1;
                if score > best_score {
                    best_score = score;
                    best = neighbor;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }
    }
    (best, visited)
}

/// Runs a full search: top-layer descent (if the graph has upper layers),
/// a best-first base-layer beam search, and an optional rerank phase,
/// gated by `accept_ord` at result-admission time (traversal itself is
/// never filtered — `spec.md` §4.6 "Filter").
///
/// Returns an empty [`SearchResult`] (not an error) if the graph is empty
/// or every candidate is filtered out, per `spec.md` §4.6 "Failure".
pub fn search(
    view: &GraphView<'_>,
    providers: &SearchProviders<'_>,
    params: &SearchParams,
    accept_ord: &dyn Bits,
) -> SearchResult {
    let Some((entry_level, entry_ordinal)) = view.entry_node() else {
        return SearchResult::default();
    };

    let mut visited = 0usize;
    let mut expanded = 0usize;
    let mut expanded_base_layer = 0usize;

    let (base_entry, descend_visited) = if entry_level > 0 {
        greedy_descend(view, &*providers.approx, entry_ordinal, entry_level, 1)
    } else {
        (entry_ordinal, 1)
    };
    visited += descend_visited;

    let (mut raw_results, base_visited, base_expanded) = beam_search(
        view,
        &*providers.approx,
        0,
        &[base_entry],
        params.beam_width,
        params.rerank_k.max(params.top_k),
        params.pruning,
        params.visited_budget,
        params.deadline,
    );
    visited += base_visited;
    expanded += base_expanded;
    expanded_base_layer += base_expanded;

    let mut reranked = 0usize;
    if params.rerank {
        for (ordinal, score) in &mut raw_results {
            *score = (providers.rerank)(*ordinal);
            reranked += 1;
        }
        raw_results.sort_by(|a, b| b.1.total_cmp(&a.1));
    }

    raw_results.retain(|&(ordinal, _)| accept_ord.test(ordinal));
    raw_results.truncate(params.top_k);

    tracing::trace!(
        top_k = params.top_k,
        visited,
        expanded,
        reranked,
        found = raw_results.len(),
        "search complete"
    );

    SearchResult {
        results: raw_results,
        visited,
        expanded,
        expanded_base_layer,
        reranked,
    }
}

/// Exposed for the builder (C5): locate an entry point at level `floor_level`
/// via a beam-width-1 greedy descent from the graph's current entry node.
pub(crate) fn descend_to_level(
    view: &GraphView<'_>,
    approx: &dyn Fn(Ordinal) -> f32,
    floor_level: usize,
) -> Option<(Ordinal, usize)> {
    let (entry_level, entry_ordinal) = view.entry_node()?;
    Some(greedy_descend(view, approx, entry_ordinal, entry_level, floor_level + 1))
}

/// Exposed for the builder (C5): the per-level best-first beam collecting
/// `beam_width` candidates for diversity-pruned neighbor selection.
pub(crate) fn beam_at_level(
    view: &GraphView<'_>,
    approx: &dyn Fn(Ordinal) -> f32,
    level: usize,
    entry_points: &[Ordinal],
    beam_width: usize,
) -> (Vec<(Ordinal, f32)>, usize) {
    let (results, visited, _expanded) =
        beam_search(view, approx, level, entry_points, beam_width, beam_width, false, 0, None);
    (results, visited)
}
