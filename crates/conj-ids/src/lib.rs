//! # conj-ids
//!
//! Conjunction-ID allocator (CIA): a contiguous-range integer allocator
//! over the 32-bit non-zero keyspace `[1, 2^32-1]`, keyed by logical-flow
//! UUID. See spec.md §4.1.

use flowctl_core::{CtlError, CtlResult, LflowUuid};
use std::collections::{HashMap, HashSet};

/// Allocator state: which IDs are occupied, and which UUID owns which
/// range.
#[derive(Debug)]
pub struct ConjIdAllocator {
    allocations: HashSet<u32>,
    owners: HashMap<LflowUuid, (u32, u32)>,
    conflicts: u64,
    // Upper bound of the keyspace. Always `u32::MAX` in production
    // (spec.md's `[1, 2^32-1]`); overridable only by tests, since
    // exercising real exhaustion over the full 32-bit space is not
    // something a unit test can afford to probe one ID at a time.
    max_id: u32,
}

impl Default for ConjIdAllocator {
    fn default() -> Self {
        ConjIdAllocator {
            allocations: HashSet::new(),
            owners: HashMap::new(),
            conflicts: 0,
            max_id: u32::MAX,
        }
    }
}

impl ConjIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_max_id(max_id: u32) -> Self {
        ConjIdAllocator {
            max_id,
            ..Self::default()
        }
    }

    /// Number of probe collisions observed so far
    /// (`lflow_conj_conflict`, spec.md §6).
    pub fn conflict_count(&self) -> u64 {
        self.conflicts
    }

    /// Allocate `n` contiguous IDs, preferring `uuid.part0()` as the
    /// starting point. Returns the first ID of the allocated range, or
    /// `0` if `n == 0` or the keyspace is exhausted.
    pub fn alloc(&mut self, uuid: LflowUuid, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }

        let mut start = if uuid.part0() == 0 { 1 } else { uuid.part0() };
        let initial_start = start;
        // Distinguishes "first probe" from "we've wrapped all the way
        // back around" — see spec.md §9's "initial" wrap latch.
        let mut stepped = false;

        loop {
            if stepped && start == initial_start {
                return 0; // exhausted: probed the whole keyspace
            }

            match self.first_conflict(start, n) {
                None => {
                    self.commit(uuid, start, n);
                    return start;
                }
                Some(k) => {
                    self.conflicts += 1;
                    stepped = true;
                    start = self.advance_past(start, k);
                }
            }
        }
    }

    /// Attempt to allocate exactly `[start, start + n)`. Succeeds only
    /// if every ID in the range is currently free; never advances on
    /// conflict. Rejects `n == 0` and `start == 0` outright (spec.md §9
    /// open question: the historical source only asserts this
    /// internally — here it is a boundary error).
    pub fn alloc_specified(&mut self, uuid: LflowUuid, start: u32, n: u32) -> CtlResult<bool> {
        if start == 0 {
            return Err(CtlError::InvalidAllocation);
        }
        if n == 0 {
            return Ok(false);
        }
        if self.first_conflict(start, n).is_some() {
            self.conflicts += 1;
            return Ok(false);
        }
        self.commit(uuid, start, n);
        Ok(true)
    }

    /// Release the range owned by `uuid`. No-op if `uuid` is not
    /// present (tolerant of double-free after `clear`).
    pub fn free(&mut self, uuid: LflowUuid) {
        if let Some((start, n)) = self.owners.remove(&uuid) {
            for id in start..start.saturating_add(n) {
                self.allocations.remove(&id);
            }
        }
        self.assert_invariants();
    }

    /// Release all ranges; equivalent to destroy+init.
    pub fn clear(&mut self) {
        self.allocations.clear();
        self.owners.clear();
        self.assert_invariants();
    }

    /// `true` if `|allocations| == sum(owners[u].n)` and no allocated
    /// ID is zero. Used by tests; a violation here is the one condition
    /// spec.md §7 calls fatal rather than tolerable.
    pub fn check_invariants(&self) -> CtlResult<()> {
        let total: u64 = self.owners.values().map(|(_, n)| *n as u64).sum();
        if total != self.allocations.len() as u64 {
            return Err(CtlError::AllocatorInvariantBroken);
        }
        if self.allocations.contains(&0) {
            return Err(CtlError::AllocatorInvariantBroken);
        }
        Ok(())
    }

    fn first_conflict(&self, start: u32, n: u32) -> Option<u32> {
        for k in 0..n {
            let id = start as u64 + k as u64;
            if id == 0 || id > self.max_id as u64 || self.allocations.contains(&(id as u32)) {
                return Some(k);
            }
        }
        None
    }

    fn advance_past(&self, start: u32, conflicting_offset: u32) -> u32 {
        let next = start as u64 + conflicting_offset as u64 + 1;
        if next == 0 || next > self.max_id as u64 {
            1
        } else {
            next as u32
        }
    }

    fn commit(&mut self, uuid: LflowUuid, start: u32, n: u32) {
        for k in 0..n {
            self.allocations.insert(start + k);
        }
        self.owners.insert(uuid, (start, n));
        self.assert_invariants();
    }

    /// Fatal per spec.md §7: a broken byte-accounting invariant means
    /// this module corrupted its own bookkeeping, not a caller error,
    /// so it terminates the process with a diagnostic rather than
    /// returning a recoverable error.
    fn assert_invariants(&self) {
        if let Err(e) = self.check_invariants() {
            panic!(
                "{e}: allocations={}, owners_total={}",
                self.allocations.len(),
                self.owners.values().map(|(_, n)| *n as u64).sum::<u64>()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(part0: u32) -> LflowUuid {
        LflowUuid::from_part0(part0)
    }

    #[test]
    fn alloc_zero_n_returns_zero() {
        let mut a = ConjIdAllocator::new();
        assert_eq!(a.alloc(uuid(5), 0), 0);
    }

    #[test]
    fn alloc_prefers_part0() {
        let mut a = ConjIdAllocator::new();
        assert_eq!(a.alloc(uuid(42), 1), 42);
        a.check_invariants().unwrap();
    }

    #[test]
    fn alloc_zero_start_hint_advances_to_one() {
        let mut a = ConjIdAllocator::new();
        assert_eq!(a.alloc(uuid(0), 1), 1);
    }

    // S4: free then alloc on an otherwise empty allocator yields the
    // original starting id.
    #[test]
    fn free_then_alloc_is_stable() {
        let mut a = ConjIdAllocator::new();
        let u = uuid(42);
        assert_eq!(a.alloc(u, 1), 42);
        a.free(u);
        assert_eq!(a.alloc(u, 1), 42);
    }

    // S5: conflict scan steps past a pre-allocated id and bumps the
    // conflict counter.
    #[test]
    fn conflict_scan_steps_forward() {
        let mut a = ConjIdAllocator::new();
        assert!(a.alloc_specified(uuid(1), 42, 1).unwrap());
        assert_eq!(a.alloc(uuid(42), 1), 43);
        assert!(a.conflict_count() >= 1);
    }

    #[test]
    fn alloc_specified_rejects_conflicts_without_advancing() {
        let mut a = ConjIdAllocator::new();
        assert!(a.alloc_specified(uuid(1), 100, 5).unwrap());
        assert!(!a.alloc_specified(uuid(2), 102, 1).unwrap());
        // second caller owns nothing: range untouched
        assert!(!a.owners.contains_key(&uuid(2)));
    }

    #[test]
    fn alloc_specified_start_zero_is_an_error() {
        let mut a = ConjIdAllocator::new();
        assert_eq!(
            a.alloc_specified(uuid(1), 0, 1).unwrap_err(),
            CtlError::InvalidAllocation
        );
    }

    #[test]
    fn alloc_specified_rejects_n_zero() {
        let mut a = ConjIdAllocator::new();
        assert!(!a.alloc_specified(uuid(1), 10, 0).unwrap());
    }

    #[test]
    fn distinct_owners_disjoint_ranges_held_until_freed() {
        let mut a = ConjIdAllocator::new();
        assert!(a.alloc_specified(uuid(1), 10, 4).unwrap());
        assert!(!a.alloc_specified(uuid(2), 10, 4).unwrap());
        a.free(uuid(1));
        assert!(a.alloc_specified(uuid(2), 10, 4).unwrap());
    }

    #[test]
    fn clear_behaves_like_fresh_allocator() {
        let mut a = ConjIdAllocator::new();
        a.alloc(uuid(10), 5);
        a.alloc(uuid(999), 3);
        a.clear();

        let mut fresh = ConjIdAllocator::new();
        assert_eq!(a.alloc(uuid(42), 1), fresh.alloc(uuid(42), 1));
    }

    #[test]
    fn free_unknown_uuid_is_a_silent_no_op() {
        let mut a = ConjIdAllocator::new();
        a.free(uuid(123)); // must not panic
        a.check_invariants().unwrap();
    }

    #[test]
    fn exhaustion_returns_zero() {
        // A tiny bounded keyspace makes exhaustion cheap to test; the
        // probe-forward algorithm under test is identical to the
        // production `u32::MAX`-bounded one.
        let mut a = ConjIdAllocator::with_max_id(16);
        assert!(a.alloc_specified(uuid(1), 1, 16).unwrap());
        assert_eq!(a.alloc(uuid(2), 1), 0);
    }

    #[test]
    fn exhaustion_probe_wraps_around_full_bounded_space() {
        let mut a = ConjIdAllocator::with_max_id(8);
        for i in 1..=8u32 {
            assert!(a.alloc_specified(uuid(100 + i), i, 1).unwrap());
        }
        assert_eq!(a.alloc(uuid(3), 1), 0);
    }

    #[test]
    fn invariant_tracks_total_allocated_ids() {
        let mut a = ConjIdAllocator::new();
        a.alloc(uuid(1), 4);
        a.alloc(uuid(2), 6);
        a.check_invariants().unwrap();
        a.free(uuid(1));
        a.check_invariants().unwrap();
    }
}
