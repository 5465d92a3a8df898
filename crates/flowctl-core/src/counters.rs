//! A single named, lock-free counter — the building block for the
//! telemetry fields spec.md §6 requires (`lflow_cache_hit`,
//! `lflow_conj_conflict`, per-node `recompute`/`compute`/`abort`, ...).
//!
//! The teacher never reaches for a metrics crate for its own internal
//! bookkeeping (`bitmap.rs`'s ready counts are raw `AtomicU64`s); this
//! follows the same idiom rather than pulling in `prometheus` for a
//! handful of monotonic counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub const fn new() -> Self {
        Counter(AtomicU64::new(0))
    }

    #[inline]
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_add_reset() {
        let c = Counter::new();
        c.inc();
        c.add(4);
        assert_eq!(c.get(), 5);
        c.reset();
        assert_eq!(c.get(), 0);
    }
}
