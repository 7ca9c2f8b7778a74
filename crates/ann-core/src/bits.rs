//! Ordinal admission sets: live-node filters, soft-delete tracking, and the
//! search-time `accept_ord` gate.

use roaring::RoaringBitmap;
use std::sync::Arc;

/// A predicate over ordinals, used both for live-node masks and for
/// search-time result admission.
///
/// `ALL` (the default) accepts every ordinal; traversal is never gated by
/// this trait, only result admission is (see `spec.md` §4.6 "Filter").
pub trait Bits: Send + Sync {
    /// Returns `true` if `ordinal` is admitted.
    fn test(&self, ordinal: u32) -> bool;
}

/// The trivial filter that admits every ordinal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllBits;

impl Bits for AllBits {
    #[inline]
    fn test(&self, _ordinal: u32) -> bool {
        true
    }
}

/// A lock-free, set/clear/test bitset used for soft-deletion.
///
/// Readers may observe a tombstoned node briefly during concurrent removal;
/// this is the documented tolerated race in `spec.md` §5.
#[derive(Debug, Default)]
pub struct DeletedSet {
    inner: parking_lot::RwLock<RoaringBitmap>,
}

impl DeletedSet {
    /// Creates an empty deleted-set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `ordinal` as soft-deleted.
    pub fn mark(&self, ordinal: u32) {
        self.inner.write().insert(ordinal);
    }

    /// Returns `true` if `ordinal` is soft-deleted.
    #[must_use]
    pub fn is_deleted(&self, ordinal: u32) -> bool {
        self.inner.read().contains(ordinal)
    }

    /// Returns `true` if no ordinal has ever been marked deleted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Number of soft-deleted ordinals.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.read().len()
    }

    /// Snapshot of currently deleted ordinals, for a rewiring pass.
    #[must_use]
    pub fn snapshot(&self) -> RoaringBitmap {
        self.inner.read().clone()
    }
}

/// Live-node mask derived from a [`DeletedSet`]: an all-true bitset when no
/// deletions exist, otherwise the complement of the deleted set bounded by
/// `max_ordinal`.
pub struct LiveNodes {
    deleted: Arc<DeletedSet>,
    max_ordinal_exclusive: u32,
}

impl LiveNodes {
    /// Builds a live-node view over `deleted`, bounded to
    /// `[0, max_ordinal_exclusive)`.
    #[must_use]
    pub fn new(deleted: Arc<DeletedSet>, max_ordinal_exclusive: u32) -> Self {
        Self { deleted, max_ordinal_exclusive }
    }
}

impl Bits for LiveNodes {
    fn test(&self, ordinal: u32) -> bool {
        ordinal < self.max_ordinal_exclusive && !self.deleted.is_deleted(ordinal)
    }
}
