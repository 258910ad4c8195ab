use std::sync::Arc;
use std::thread::JoinHandle;

use log::debug;

use crate::core::{self, Shared};
use crate::task::{SequenceRef, Task};
use crate::Error;

/// A fixed-size pool of worker threads that sorts batches of sequences in
/// place by parallelizing the partition step of quicksort itself.
///
/// The threads are created once at construction and live until
/// [`SortPool::shutdown`] (or the pool's drop) joins them. At most one
/// batch can be in flight at a time per pool.
pub struct SortPool<T> {
    pub(crate) shared: Arc<Shared<T>>,
    num_workers: usize,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Ord + Clone + Send + 'static> SortPool<T> {
    /// Pool with the default number of workers: the available hardware
    /// parallelism minus one, since the submitting thread keeps a core for
    /// itself, and at least one.
    pub fn new() -> Self {
        PoolBuilder::new().build()
    }

    /// Sort every sequence of `batch` ascending, in place.
    ///
    /// Blocks until the whole batch is sorted; the sequences are borrowed
    /// by the pool for exactly that long. A submission racing against an
    /// unfinished batch fails with [`Error::BatchInProgress`] and leaves
    /// that batch undisturbed.
    pub fn sort_batch(&self, batch: &mut [Vec<T>]) -> Result<(), Error> {
        profiling::scope!("sort_batch");

        if self.workers.is_empty() {
            // Already shut down, nothing would ever drain the queue.
            return Err(Error::InvalidState);
        }

        // The whole batch is accounted for before the first task is pushed,
        // so the count cannot drain to zero while submission is under way.
        self.shared.progress.begin_batch(batch.len())?;

        for seq in batch.iter_mut() {
            let range = 0..seq.len();
            self.shared.enqueue(Task::Sort {
                seq: SequenceRef::new(seq),
                range,
            });
        }

        self.shared.progress.wait_batch_complete();

        Ok(())
    }
}

impl<T> SortPool<T> {
    /// Number of worker threads, fixed at construction.
    pub fn worker_count(&self) -> usize {
        self.num_workers
    }

    /// Stop and join all worker threads.
    ///
    /// Fails with [`Error::InvalidState`] while a batch is in flight:
    /// queued work would race against the poison tasks. Calling it again
    /// after a successful shutdown is a no-op.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        if self.shared.progress.outstanding() > 0 {
            return Err(Error::InvalidState);
        }

        self.shutdown_and_join();

        Ok(())
    }

    fn shutdown_and_join(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        // One poison per worker: each consumes exactly one and exits.
        for _ in 0..self.workers.len() {
            self.shared.queue.push(Task::Poison);
        }
        self.shared.sleep.wake_all();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }

        debug!("sort pool shut down");
    }
}

impl<T> Drop for SortPool<T> {
    fn drop(&mut self) {
        // No batch can be in flight here: `sort_batch` holds a borrow of
        // the pool for its whole duration.
        self.shutdown_and_join();
    }
}

/// Configures and builds a [`SortPool`].
pub struct PoolBuilder {
    worker_threads: Option<usize>,
    stack_size: Option<usize>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        PoolBuilder {
            worker_threads: None,
            stack_size: None,
        }
    }

    /// Override the number of worker threads. Clamped to 1..=32.
    pub fn with_worker_threads(mut self, num_threads: usize) -> Self {
        self.worker_threads = Some(num_threads.clamp(1, 32));

        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);

        self
    }

    pub fn build<T: Ord + Clone + Send + 'static>(self) -> SortPool<T> {
        let num_workers = self.worker_threads.unwrap_or_else(default_worker_count);
        let (shared, workers) = core::init(num_workers, self.stack_size);

        SortPool {
            shared,
            num_workers,
            workers,
        }
    }
}

fn default_worker_count() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);

    (parallelism - 1).clamp(1, 32)
}
