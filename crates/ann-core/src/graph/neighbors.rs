//! Concurrent per-node neighbor list (`spec.md` §4.3's `NodeArray`/`C3`
//! operations), grounded in the teacher's `RwLock`-wrapped per-row
//! neighbor storage in `index/hnsw/native/layer.rs`.

use super::diversity::{PairwiseSimilarity, VamanaDiversityProvider};
use super::node_array::NodeArray;
use crate::error::Result;
use crate::vector_source::Ordinal;
use parking_lot::RwLock;

/// One node's neighbor list, safe to read and mutate from many threads.
///
/// Capacity is `floor(max_degree * neighbor_overflow)`: the overflow
/// window `insert_diverse`/`replace_deleted_neighbors` may temporarily
/// fill before the next `enforce_degree` pass prunes back to `max_degree`.
#[derive(Debug)]
pub struct Neighbors {
    inner: RwLock<NodeArray>,
    max_degree: usize,
}

impl Neighbors {
    /// Creates an empty neighbor list for a node with degree bound
    /// `max_degree`, sized to also hold `neighbor_overflow`'s temporary
    /// excess.
    #[must_use]
    pub fn new(max_degree: usize, neighbor_overflow: f32) -> Self {
        let capacity = ((max_degree as f32) * neighbor_overflow).floor() as usize;
        Self { inner: RwLock::new(NodeArray::new(capacity.max(max_degree))), max_degree }
    }

    /// A point-in-time copy of the current neighbor list, descending by
    /// score.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Ordinal, f32)> {
        self.inner.read().as_slice().to_vec()
    }

    /// Current neighbor count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// `true` if no neighbors are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    fn overflow_capacity(&self) -> usize {
        self.inner.read().capacity()
    }

    /// Merges `candidates` into the existing neighbor list, then applies
    /// Vamana diversity pruning relaxed to the overflow capacity (not yet
    /// the strict `max_degree`), preserving score-descending order.
    ///
    /// # Errors
    ///
    /// `Error::InvariantViolation` if `candidates` is not sorted by
    /// descending score.
    pub fn insert_diverse(
        &self,
        candidates: &[(Ordinal, f32)],
        alpha: f32,
        pairwise: &dyn PairwiseSimilarity,
    ) -> Result<()> {
        let mut guard = self.inner.write();
        let capacity = guard.capacity();
        let mut merged = NodeArray::new(capacity);
        for &(ordinal, score) in guard.as_slice() {
            merged.insert(ordinal, score);
        }
        for &(ordinal, score) in candidates {
            merged.insert(ordinal, score);
        }

        let overflow_provider = VamanaDiversityProvider { alpha, max_degree: capacity };
        let selected = overflow_provider.select(merged.as_slice(), pairwise)?;
        let mut replacement = NodeArray::new(capacity);
        for (ordinal, score) in selected {
            replacement.insert(ordinal, score);
        }
        *guard = replacement;
        Ok(())
    }

    /// Wholesale replacement of the neighbor list, used by the graph
    /// builder's `connect_node` once a level's diversified neighbor set has
    /// already been computed elsewhere.
    pub fn replace_all(&self, entries: &[(Ordinal, f32)]) {
        let mut guard = self.inner.write();
        let capacity = guard.capacity();
        let mut replacement = NodeArray::new(capacity);
        for &(ordinal, score) in entries {
            replacement.insert(ordinal, score);
        }
        *guard = replacement;
    }

    /// Best-effort backlink: attempts to add `(ordinal, score)`, skipping
    /// silently if this list is already at its overflow capacity.
    pub fn try_backlink(&self, ordinal: Ordinal, score: f32) -> bool {
        self.inner.write().insert_no_evict(ordinal, score)
    }

    /// Re-applies diversity pruning and truncates to the strict
    /// `max_degree`, published atomically under the write lock.
    ///
    /// # Errors
    ///
    /// `Error::InvariantViolation` from the diversity predicate.
    pub fn enforce_degree(&self, alpha: f32, pairwise: &dyn PairwiseSimilarity) -> Result<()> {
        let mut guard = self.inner.write();
        let capacity = guard.capacity();
        let strict_provider = VamanaDiversityProvider { alpha, max_degree: self.max_degree };
        let selected = strict_provider.select(guard.as_slice(), pairwise)?;
        let mut replacement = NodeArray::new(capacity);
        for (ordinal, score) in selected {
            replacement.insert(ordinal, score);
        }
        *guard = replacement;
        Ok(())
    }

    /// Removes edges whose endpoint satisfies `is_deleted`, merges in
    /// `candidates` as diversified replacements, and leaves degree at most
    /// `max_degree`.
    ///
    /// # Errors
    ///
    /// `Error::InvariantViolation` from the diversity predicate.
    pub fn replace_deleted_neighbors(
        &self,
        is_deleted: impl Fn(Ordinal) -> bool,
        candidates: &[(Ordinal, f32)],
        alpha: f32,
        pairwise: &dyn PairwiseSimilarity,
    ) -> Result<()> {
        let mut guard = self.inner.write();
        let capacity = guard.capacity();
        let mut merged = NodeArray::new(capacity);
        for &(ordinal, score) in guard.as_slice().iter().filter(|&&(o, _)| !is_deleted(o)) {
            merged.insert(ordinal, score);
        }
        for &(ordinal, score) in candidates {
            if !is_deleted(ordinal) {
                merged.insert(ordinal, score);
            }
        }

        let strict_provider = VamanaDiversityProvider { alpha, max_degree: self.max_degree };
        let selected = strict_provider.select(merged.as_slice(), pairwise)?;
        let mut replacement = NodeArray::new(capacity);
        for (ordinal, score) in selected {
            replacement.insert(ordinal, score);
        }
        *guard = replacement;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ZeroSimilarity;
    impl PairwiseSimilarity for ZeroSimilarity {
        fn similarity(&self, _a: Ordinal, _b: Ordinal) -> f32 {
            0.0
        }
    }

    #[test]
    fn insert_diverse_fills_up_to_overflow_capacity() {
        let neighbors = Neighbors::new(2, 1.5);
        assert_eq!(neighbors.overflow_capacity(), 3);
        neighbors.insert_diverse(&[(1, 0.9), (2, 0.8), (3, 0.7)], 1.0, &ZeroSimilarity).unwrap();
        assert_eq!(neighbors.len(), 3);
    }

    #[test]
    fn enforce_degree_truncates_to_max_degree() {
        let neighbors = Neighbors::new(2, 1.5);
        neighbors.insert_diverse(&[(1, 0.9), (2, 0.8), (3, 0.7)], 1.0, &ZeroSimilarity).unwrap();
        neighbors.enforce_degree(1.0, &ZeroSimilarity).unwrap();
        assert_eq!(neighbors.len(), 2);
    }

    #[test]
    fn try_backlink_skips_once_full() {
        let neighbors = Neighbors::new(1, 1.0);
        assert!(neighbors.try_backlink(1, 0.5));
        assert!(!neighbors.try_backlink(2, 0.9));
    }

    #[test]
    fn replace_deleted_neighbors_drops_tombstoned_endpoints() {
        let neighbors = Neighbors::new(2, 1.0);
        neighbors.insert_diverse(&[(1, 0.9), (2, 0.8)], 1.0, &ZeroSimilarity).unwrap();
        neighbors
            .replace_deleted_neighbors(|o| o == 1, &[(3, 0.6)], 1.0, &ZeroSimilarity)
            .unwrap();
        let snapshot = neighbors.snapshot();
        assert!(snapshot.iter().all(|&(o, _)| o != 1));
        assert!(snapshot.iter().any(|&(o, _)| o == 3));
    }
}
