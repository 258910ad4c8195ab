//! Progress accounting for the batch in flight.

use std::sync::{Condvar, Mutex};

use crate::Error;

struct Counters {
    /// Number of tasks of the current batch that have not been resolved
    /// yet. Zero means no batch is in flight.
    outstanding: usize,
    /// Highest value `outstanding` reached during the current batch.
    peak: usize,
}

/// Tracks how many tasks of the in-flight batch remain unresolved and wakes
/// the submitting thread when the count drains to zero.
///
/// The counter is only ever touched while holding the mutex the completion
/// condvar is tied to. Keeping the two together is load-bearing: with the
/// counter updated outside the lock, the waiter can evaluate its predicate
/// against a stale count, miss the final decrement's notification and sleep
/// forever.
pub(crate) struct BatchProgress {
    counters: Mutex<Counters>,
    batch_done: Condvar,
}

impl BatchProgress {
    pub fn new() -> Self {
        BatchProgress {
            counters: Mutex::new(Counters {
                outstanding: 0,
                peak: 0,
            }),
            batch_done: Condvar::new(),
        }
    }

    /// Start a batch of `task_count` top-level tasks.
    ///
    /// Fails if the previous batch has not fully drained; the counts of two
    /// batches must never mix.
    pub fn begin_batch(&self, task_count: usize) -> Result<(), Error> {
        let mut counters = self.counters.lock().unwrap();
        if counters.outstanding > 0 {
            return Err(Error::BatchInProgress);
        }
        counters.outstanding = task_count;
        counters.peak = task_count;
        Ok(())
    }

    /// One task was consumed and produced two children: one more
    /// outstanding task, net.
    ///
    /// Callers record this *before* pushing the children so the count can
    /// never under-report queued work.
    pub fn split_one(&self) {
        let mut counters = self.counters.lock().unwrap();
        counters.outstanding += 1;
        counters.peak = counters.peak.max(counters.outstanding);
    }

    /// One task ran to completion without producing children.
    pub fn resolve_one(&self) {
        let mut counters = self.counters.lock().unwrap();
        debug_assert!(
            counters.outstanding > 0,
            "resolved more tasks than were outstanding"
        );
        counters.outstanding -= 1;
        if counters.outstanding == 0 {
            self.batch_done.notify_all();
        }
    }

    /// Block until the in-flight batch has fully drained.
    ///
    /// Reusable across batches: a later `begin_batch` arms it again.
    pub fn wait_batch_complete(&self) {
        profiling::scope!("wait_batch_complete");
        let mut counters = self.counters.lock().unwrap();
        while counters.outstanding > 0 {
            counters = self.batch_done.wait(counters).unwrap();
        }
    }

    pub fn outstanding(&self) -> usize {
        self.counters.lock().unwrap().outstanding
    }

    /// Highest value the outstanding count reached during the current (or
    /// most recent) batch.
    pub fn peak_outstanding(&self) -> usize {
        self.counters.lock().unwrap().peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlapping_batches() {
        let progress = BatchProgress::new();
        progress.begin_batch(2).unwrap();
        assert_eq!(progress.begin_batch(1), Err(Error::BatchInProgress));

        progress.resolve_one();
        assert_eq!(progress.begin_batch(1), Err(Error::BatchInProgress));

        progress.resolve_one();
        assert_eq!(progress.outstanding(), 0);
        progress.begin_batch(1).unwrap();
        progress.resolve_one();
    }

    #[test]
    fn split_and_resolve_bookkeeping() {
        let progress = BatchProgress::new();
        progress.begin_batch(1).unwrap();

        // One split: the parent stays accounted for until both children are
        // resolved.
        progress.split_one();
        assert_eq!(progress.outstanding(), 2);
        progress.resolve_one();
        progress.resolve_one();
        assert_eq!(progress.outstanding(), 0);
        assert_eq!(progress.peak_outstanding(), 2);
    }

    #[test]
    fn empty_batch_completes_immediately() {
        let progress = BatchProgress::new();
        progress.begin_batch(0).unwrap();
        // Must not block.
        progress.wait_batch_complete();
    }

    #[test]
    fn wakes_the_waiter_on_the_last_resolution() {
        use std::sync::Arc;

        let progress = Arc::new(BatchProgress::new());
        progress.begin_batch(3).unwrap();

        let resolver = {
            let progress = Arc::clone(&progress);
            std::thread::spawn(move || {
                for _ in 0..3 {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                    progress.resolve_one();
                }
            })
        };

        progress.wait_batch_complete();
        assert_eq!(progress.outstanding(), 0);
        resolver.join().unwrap();
    }
}
