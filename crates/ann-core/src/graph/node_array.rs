//! Fixed-capacity, score-descending neighbor list (`spec.md` §3's
//! `NodeArray`). Capacities stay in the tens-to-low-hundreds range, so a
//! linear insertion position search is cheaper than a tree structure.

use crate::vector_source::Ordinal;

/// A capacity-bounded list of `(ordinal, score)` pairs kept sorted by
/// descending score.
#[derive(Debug, Clone)]
pub struct NodeArray {
    capacity: usize,
    entries: Vec<(Ordinal, f32)>,
}

impl NodeArray {
    /// Creates an empty array that will hold at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Vec::with_capacity(capacity.min(64)) }
    }

    /// Current entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum entries this array will retain.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries in descending-score order.
    #[must_use]
    pub fn as_slice(&self) -> &[(Ordinal, f32)] {
        &self.entries
    }

    /// `true` if `ordinal` is already present.
    #[must_use]
    pub fn contains(&self, ordinal: Ordinal) -> bool {
        self.entries.iter().any(|&(o, _)| o == ordinal)
    }

    /// Inserts `(ordinal, score)`, preserving descending order, dropping
    /// the lowest-scoring tail entry if the array is already at capacity
    /// and the new entry outranks it. Returns `true` if the entry was
    /// retained.
    pub fn insert(&mut self, ordinal: Ordinal, score: f32) -> bool {
        if self.contains(ordinal) {
            return false;
        }
        if self.capacity == 0 {
            return false;
        }
        let position = self.entries.partition_point(|&(_, s)| s >= score);
        if position == self.capacity {
            return false;
        }
        self.entries.insert(position, (ordinal, score));
        self.entries.truncate(self.capacity);
        true
    }

    /// Inserts `(ordinal, score)` only if there is spare capacity; never
    /// evicts an existing (possibly lower-scoring) entry. Used by
    /// best-effort backlinking, where a full neighbor list means the
    /// attempt is simply skipped rather than displacing anything.
    pub fn insert_no_evict(&mut self, ordinal: Ordinal, score: f32) -> bool {
        if self.contains(ordinal) || self.entries.len() >= self.capacity {
            return false;
        }
        let position = self.entries.partition_point(|&(_, s)| s >= score);
        self.entries.insert(position, (ordinal, score));
        true
    }

    /// Removes `ordinal` if present. Returns `true` if it was removed.
    pub fn remove(&mut self, ordinal: Ordinal) -> bool {
        if let Some(pos) = self.entries.iter().position(|&(o, _)| o == ordinal) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Drops all entries whose ordinal fails `keep`.
    pub fn retain(&mut self, keep: impl FnMut(Ordinal) -> bool) {
        let mut keep = keep;
        self.entries.retain(|&(o, _)| keep(o));
    }

    /// Truncates to `len` highest-scoring entries.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}
