//! Logical completion clock (`spec.md` §4.4/§9): a growable array of
//! per-node completion timestamps behind a reader-preferring lock, with a
//! monotonic global tick. Grounded in the teacher's general idiom of
//! `RwLock` for structural growth plus atomics for steady-state reads —
//! the teacher has no direct `CompletionTracker` analogue, so the growth
//! strategy here is new code following that idiom.

use crate::vector_source::Ordinal;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks, per ordinal, the logical clock tick at which it became fully
/// wired into the graph. Unset ordinals read as `u64::MAX`, so they are
/// always excluded by a snapshot view taken at any finite clock value.
pub struct CompletionTracker {
    clock: AtomicU64,
    completions: RwLock<Vec<AtomicU64>>,
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionTracker {
    /// Creates a tracker with no completed nodes and clock `0`.
    #[must_use]
    pub fn new() -> Self {
        Self { clock: AtomicU64::new(0), completions: RwLock::new(Vec::new()) }
    }

    /// The current logical clock value: a snapshot taken now will only see
    /// nodes completed strictly before this value.
    #[must_use]
    pub fn clock(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    /// The tick at which `ordinal` completed, or `u64::MAX` if it never
    /// has.
    #[must_use]
    pub fn completed_at(&self, ordinal: Ordinal) -> u64 {
        let guard = self.completions.read();
        guard.get(ordinal as usize).map_or(u64::MAX, |cell| cell.load(Ordering::Acquire))
    }

    /// Marks `ordinal` complete at a freshly minted clock tick, growing the
    /// backing array first if necessary. Returns the tick assigned.
    ///
    /// The tick handed out is the clock value *before* this call advances
    /// it, so a view whose snapshot clock is sampled any time after this
    /// call returns immediately sees `ordinal` as completed (`completed_at
    /// < clock`).
    pub fn mark_complete(&self, ordinal: Ordinal) -> u64 {
        self.ensure_capacity(ordinal);
        let tick = self.clock.fetch_add(1, Ordering::AcqRel);
        let guard = self.completions.read();
        guard[ordinal as usize].store(tick, Ordering::Release);
        tick
    }

    fn ensure_capacity(&self, ordinal: Ordinal) {
        let index = ordinal as usize;
        {
            let guard = self.completions.read();
            if index < guard.len() {
                return;
            }
        }
        let mut guard = self.completions.write();
        while guard.len() <= index {
            guard.push(AtomicU64::new(u64::MAX));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_ordinal_reads_as_never_completed() {
        let tracker = CompletionTracker::new();
        assert_eq!(tracker.completed_at(42), u64::MAX);
    }

    #[test]
    fn mark_complete_advances_the_clock_monotonically() {
        let tracker = CompletionTracker::new();
        let first = tracker.mark_complete(0);
        let second = tracker.mark_complete(1);
        assert!(second > first);
        assert_eq!(tracker.completed_at(0), first);
        assert_eq!(tracker.completed_at(1), second);
    }

    /// Property 10 / Scenario groundwork: a view's clock taken before a
    /// node completes must not see that node as completed.
    #[test]
    fn snapshot_clock_excludes_later_completions() {
        let tracker = CompletionTracker::new();
        tracker.mark_complete(0);
        let clock = tracker.clock();
        tracker.mark_complete(1);
        assert!(tracker.completed_at(1) >= clock);
        assert!(tracker.completed_at(0) < clock);
    }
}
