//! The layered graph index itself (`spec.md` §4.4): owns every layer's
//! neighbor lists, the entry node, the completion clock, and the
//! soft-delete bitset; hands out snapshot-isolated or frozen views for
//! reading.
//!
//! Grounded in the teacher's `NativeHnsw` struct (`RwLock<Vec<Layer>>`
//! entry point, `AtomicUsize` max-layer) generalized with an explicit view
//! type, since the teacher's search reads the live structure directly.

use super::completion::CompletionTracker;
use super::layer::GraphLayer;
use crate::bits::{DeletedSet, LiveNodes};
use crate::error::{Error, Result};
use crate::vector_source::Ordinal;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns every layer of the graph plus its entry node and completion clock.
pub struct GraphIndex {
    layers: RwLock<Vec<GraphLayer>>,
    entry: RwLock<Option<(usize, Ordinal)>>,
    completion: CompletionTracker,
    deleted: Arc<DeletedSet>,
    max_ordinal_exclusive: RwLock<u32>,
    max_degree: usize,
    neighbor_overflow: f32,
    mutations_completed: AtomicBool,
}

impl GraphIndex {
    /// Creates an empty index (a dense layer 0 only) for the given degree
    /// bound and overflow ratio.
    #[must_use]
    pub fn new(max_degree: usize, neighbor_overflow: f32) -> Self {
        let layer0 = GraphLayer::dense(max_degree, neighbor_overflow);
        Self {
            layers: RwLock::new(vec![layer0]),
            entry: RwLock::new(None),
            completion: CompletionTracker::new(),
            deleted: Arc::new(DeletedSet::new()),
            max_ordinal_exclusive: RwLock::new(0),
            max_degree,
            neighbor_overflow,
            mutations_completed: AtomicBool::new(false),
        }
    }

    /// Highest layer index currently materialized (`0` if only layer 0
    /// exists).
    #[must_use]
    pub fn max_level(&self) -> usize {
        self.layers.read().len() - 1
    }

    /// The current entry node as `(level, ordinal)`, or `None` for an
    /// empty graph.
    #[must_use]
    pub fn entry_node(&self) -> Option<(usize, Ordinal)> {
        *self.entry.read()
    }

    /// Shared access to this index's completion clock.
    #[must_use]
    pub fn completion_tracker(&self) -> &CompletionTracker {
        &self.completion
    }

    /// Inserts empty neighbor lists for `ordinal` into layers `0..=level`,
    /// growing the layer stack if `level` exceeds the current maximum.
    pub fn add_node(&self, level: usize, ordinal: Ordinal) {
        {
            let guard = self.layers.read();
            if level < guard.len() {
                for layer in guard.iter().take(level + 1) {
                    layer.add_node(ordinal);
                }
                drop(guard);
                self.bump_max_ordinal(ordinal);
                return;
            }
        }
        let mut guard = self.layers.write();
        while guard.len() <= level {
            guard.push(GraphLayer::sparse(self.max_degree, self.neighbor_overflow));
        }
        for layer in guard.iter().take(level + 1) {
            layer.add_node(ordinal);
        }
        drop(guard);
        self.bump_max_ordinal(ordinal);
    }

    fn bump_max_ordinal(&self, ordinal: Ordinal) {
        let mut guard = self.max_ordinal_exclusive.write();
        if ordinal + 1 > *guard {
            *guard = ordinal + 1;
        }
    }

    /// Replaces `level`'s neighbor list for `ordinal`.
    ///
    /// # Errors
    ///
    /// `Error::IndexOutOfBounds` if `level` exceeds the current layer
    /// count.
    pub fn connect_node(&self, level: usize, ordinal: Ordinal, neighbors: &[(Ordinal, f32)]) -> Result<()> {
        let guard = self.layers.read();
        let layer = guard.get(level).ok_or(Error::IndexOutOfBounds { ordinal: level as u32, size: guard.len() as u32 })?;
        layer.connect_node(ordinal, neighbors);
        Ok(())
    }

    /// Reads `ordinal`'s raw (unfiltered) neighbor list at `level`.
    #[must_use]
    pub fn raw_neighbors(&self, level: usize, ordinal: Ordinal) -> Vec<(Ordinal, f32)> {
        let guard = self.layers.read();
        guard.get(level).and_then(|layer| layer.with_neighbors(ordinal, super::neighbors::Neighbors::snapshot)).unwrap_or_default()
    }

    /// Runs `f` against `ordinal`'s neighbor list at `level`, if present.
    pub fn with_neighbors<R>(&self, level: usize, ordinal: Ordinal, f: impl FnOnce(&super::neighbors::Neighbors) -> R) -> Option<R> {
        let guard = self.layers.read();
        guard.get(level).and_then(|layer| layer.with_neighbors(ordinal, f))
    }

    /// Records `ordinal`'s completion at `level`, then advances the entry
    /// node if `level` exceeds the current entry's level (the monotonic
    /// compare-and-swap rule of `spec.md` §5).
    pub fn mark_complete(&self, ordinal: Ordinal, level: usize) {
        self.completion.mark_complete(ordinal);
        let mut guard = self.entry.write();
        let should_advance = match *guard {
            None => true,
            Some((current_level, _)) => level > current_level,
        };
        if should_advance {
            *guard = Some((level, ordinal));
        }
    }

    /// Unconditionally sets the entry node, bypassing the monotonic
    /// advance-only rule of [`Self::mark_complete`]. Used only by
    /// [`crate::persist::graph_format`] when reconstructing a graph whose
    /// entry node was recorded explicitly on disk, where replaying
    /// completions in an order that reproduces the original CAS race is
    /// neither possible nor necessary.
    pub(crate) fn force_entry(&self, level: usize, ordinal: Ordinal) {
        *self.entry.write() = Some((level, ordinal));
    }

    /// Flips `ordinal`'s soft-delete bit.
    pub fn mark_deleted(&self, ordinal: Ordinal) {
        self.deleted.mark(ordinal);
    }

    /// An admission filter over every live (non-soft-deleted, in-range)
    /// ordinal.
    #[must_use]
    pub fn live_nodes(&self) -> LiveNodes {
        LiveNodes::new(Arc::clone(&self.deleted), *self.max_ordinal_exclusive.read())
    }

    /// A point-in-time copy of the soft-delete bitset, for a rewiring pass.
    #[must_use]
    pub fn deleted_snapshot(&self) -> roaring::RoaringBitmap {
        self.deleted.snapshot()
    }

    /// All ordinals with a (possibly empty) entry in `level`, in no
    /// particular order. Empty if `level` exceeds the current layer count.
    #[must_use]
    pub fn layer_ordinals(&self, level: usize) -> Vec<Ordinal> {
        self.layers.read().get(level).map(GraphLayer::ordinals).unwrap_or_default()
    }

    /// Declares that no further structural mutation will occur, switching
    /// future views to [`FrozenView`] and permitting `save()`.
    pub fn set_all_mutations_completed(&self) {
        self.mutations_completed.store(true, Ordering::Release);
    }

    /// `true` once [`Self::set_all_mutations_completed`] has been called.
    #[must_use]
    pub fn mutations_completed(&self) -> bool {
        self.mutations_completed.load(Ordering::Acquire)
    }

    /// The degree bound every layer of this index was constructed with.
    #[must_use]
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// The neighbor-list overflow ratio every layer of this index was
    /// constructed with.
    #[must_use]
    pub fn neighbor_overflow(&self) -> f32 {
        self.neighbor_overflow
    }

    /// Returns a read view appropriate to this index's current mutation
    /// state: a [`FrozenView`] if construction is finished, otherwise a
    /// snapshot-isolated [`ConcurrentView`].
    #[must_use]
    pub fn get_view(&self) -> GraphView<'_> {
        if self.mutations_completed() {
            GraphView::Frozen(FrozenView { index: self })
        } else {
            GraphView::Concurrent(ConcurrentView { index: self, clock: self.completion.clock() })
        }
    }
}

/// A read view over a [`GraphIndex`]: either every wired edge (once
/// construction is finished) or only edges whose endpoint completed
/// strictly before the view's snapshot clock.
pub enum GraphView<'a> {
    /// All structural mutation has finished; every edge is visible.
    Frozen(FrozenView<'a>),
    /// Construction is ongoing; only fully-installed nodes are reachable.
    Concurrent(ConcurrentView<'a>),
}

/// A [`GraphView`] over a fully-built index.
pub struct FrozenView<'a> {
    index: &'a GraphIndex,
}

/// A [`GraphView`] over an index still under construction, fencing out
/// nodes completed after this view was taken.
pub struct ConcurrentView<'a> {
    index: &'a GraphIndex,
    clock: u64,
}

impl<'a> GraphView<'a> {
    /// Neighbors of `ordinal` at `level`, filtered per this view's
    /// isolation rule.
    #[must_use]
    pub fn neighbors(&self, level: usize, ordinal: Ordinal) -> Vec<(Ordinal, f32)> {
        match self {
            Self::Frozen(v) => v.index.raw_neighbors(level, ordinal),
            Self::Concurrent(v) => v
                .index
                .raw_neighbors(level, ordinal)
                .into_iter()
                .filter(|&(n, _)| v.index.completion.completed_at(n) < v.clock)
                .collect(),
        }
    }

    /// The entry node as seen by this view (entry-node visibility is not
    /// itself isolation-filtered: the entry is always a completed node by
    /// construction of `mark_complete`).
    #[must_use]
    pub fn entry_node(&self) -> Option<(usize, Ordinal)> {
        match self {
            Self::Frozen(v) => v.index.entry_node(),
            Self::Concurrent(v) => v.index.entry_node(),
        }
    }

    /// Highest materialized layer index.
    #[must_use]
    pub fn max_level(&self) -> usize {
        match self {
            Self::Frozen(v) => v.index.max_level(),
            Self::Concurrent(v) => v.index.max_level(),
        }
    }
}
