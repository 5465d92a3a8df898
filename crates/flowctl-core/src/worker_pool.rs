//! Optional background worker pool (spec.md §5)
//!
//! Described in the spec "for completeness because it interacts with
//! the hashmap layout used by LFC-like structures" — it is used by
//! *other* subsystems, never by the LFC or CIA themselves, both of
//! which are strictly single-threaded cooperative (spec.md §5).
//!
//! The historical implementation coordinates a fixed worker set with a
//! pair of POSIX unnamed semaphores (`fire`/`done`). spec.md §9's
//! REDESIGN note recommends a channel-based, barrier-completion scheme
//! instead if reimplemented; that's what this is. A worker processes
//! one contiguous bucket range per round and reports its partial result
//! back to the dispatching thread, which merges all `n` results only
//! after every worker has reached the round barrier — the same
//! happens-before guarantee the semaphore scheme gives via
//! acquire/release fences around its `finished` flag, here supplied by
//! `std::sync::Barrier`.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads that process disjoint bucket
/// ranges of a caller-supplied table.
pub struct WorkerPool {
    n: usize,
    txs: Vec<mpsc::Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    must_exit: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `n` worker threads, each parked on its own job channel.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "worker pool needs at least one worker");
        let must_exit = Arc::new(AtomicBool::new(false));
        let mut txs = Vec::with_capacity(n);
        let mut handles = Vec::with_capacity(n);
        for id in 0..n {
            let (tx, rx) = mpsc::channel::<Job>();
            let exit_flag = must_exit.clone();
            let handle = thread::Builder::new()
                .name(format!("flowctl-worker-{id}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if exit_flag.load(Ordering::Acquire) {
                            break;
                        }
                        job();
                    }
                })
                .expect("failed to spawn worker thread");
            txs.push(tx);
            handles.push(handle);
        }
        WorkerPool {
            n,
            txs,
            handles,
            must_exit,
        }
    }

    /// Number of worker threads in the pool.
    pub fn size(&self) -> usize {
        self.n
    }

    /// Partition `[0, total_buckets)` into `n` roughly-equal ranges, run
    /// `worker_fn(range, must_exit)` for each on its own worker thread,
    /// wait for every worker to finish the round, then call
    /// `merge(worker_id, result)` once per worker in order.
    ///
    /// `worker_fn` receives a reference to the pool's cancellation flag
    /// so long-running callers can check it between their own
    /// sub-buckets, mirroring the historical `workers_must_exit` check.
    pub fn run_over_buckets<R, F, M>(&self, total_buckets: usize, worker_fn: F, mut merge: M)
    where
        R: Send + 'static,
        F: Fn(Range<usize>, &AtomicBool) -> R + Send + Sync + 'static,
        M: FnMut(usize, R),
    {
        let barrier = Arc::new(Barrier::new(self.n + 1));
        let results: Arc<Vec<Mutex<Option<R>>>> =
            Arc::new((0..self.n).map(|_| Mutex::new(None)).collect());
        let worker_fn = Arc::new(worker_fn);
        let chunk = total_buckets.div_ceil(self.n);

        for id in 0..self.n {
            let start = (id * chunk).min(total_buckets);
            let end = (start + chunk).min(total_buckets);
            let barrier = Arc::clone(&barrier);
            let results = Arc::clone(&results);
            let worker_fn = Arc::clone(&worker_fn);
            let exit_flag = Arc::clone(&self.must_exit);
            let job: Job = Box::new(move || {
                let r = worker_fn(start..end, &exit_flag);
                *results[id].lock().unwrap() = Some(r);
                barrier.wait();
            });
            self.txs[id]
                .send(job)
                .expect("worker thread still alive");
        }

        // Blocks until every worker has posted its result and reached
        // the barrier — the "main thread waits on done N times" step.
        barrier.wait();

        for (id, slot) in results.iter().enumerate() {
            if let Some(r) = slot.lock().unwrap().take() {
                merge(id, r);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.must_exit.store(true, Ordering::Release);
        // Dropping the senders closes each worker's channel, unblocking
        // its `recv()` so the join below can't hang.
        self.txs.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn partitions_and_merges_all_buckets() {
        let pool = WorkerPool::new(4);
        let total = 37usize;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_worker = Arc::clone(&seen);
        pool.run_over_buckets(
            total,
            |range, _exit| range.map(|b| b * 2).sum::<usize>(),
            move |_id, partial_sum| {
                seen_worker.lock().unwrap().push(partial_sum);
            },
        );
        let expected: usize = (0..total).map(|b| b * 2).sum();
        let got: usize = seen.lock().unwrap().iter().sum();
        assert_eq!(got, expected);
    }

    #[test]
    fn cancellation_flag_is_visible_to_workers() {
        let pool = WorkerPool::new(2);
        let cancelled_count = Arc::new(AtomicUsize::new(0));
        let cancelled_count2 = Arc::clone(&cancelled_count);
        pool.run_over_buckets(
            10,
            |_range, exit_flag| exit_flag.load(Ordering::Acquire),
            move |_id, was_cancelled| {
                if was_cancelled {
                    cancelled_count2.fetch_add(1, Ordering::Relaxed);
                }
            },
        );
        assert_eq!(cancelled_count.load(Ordering::Relaxed), 0);
    }
}
