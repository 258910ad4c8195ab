//! A small fixed-size worker pool that sorts batches of independent
//! sequences in place, parallelizing the recursive partition step of
//! quicksort itself rather than farming out one sequence per thread.
//!
//! How it works:
//! - Every pending subrange is a task in a queue shared by all workers.
//!   Partitioning a subrange either resolves it or feeds two smaller
//!   subranges back into the queue, so the workers are also the producers.
//! - An outstanding-task counter, updated under the same lock as its
//!   completion signal, tells the submitting thread when a batch with a
//!   recursively-discovered task count has drained to zero.
//! - Workers park while the queue is empty and are woken as work appears;
//!   poison tasks let each of them exit cleanly on shutdown without
//!   dropping queued work.
//!
//! The pool is reusable: once `sort_batch` returns, the next batch can be
//! submitted. Only one batch can be in flight at a time.

mod core;
mod partition;
mod sync;
mod task;
mod thread_pool;

pub use partition::{partition, sequential_sort, PartitionOutcome};
pub use thread_pool::{PoolBuilder, SortPool};

/// Errors surfaced by [`SortPool`].
///
/// A malformed task range is not represented here: it can only come from a
/// bug in task generation and aborts via an assertion instead of risking
/// silently corrupted data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A batch was submitted while a previous one still had unresolved
    /// tasks. Recoverable: retry once the other submission returns.
    #[error("a previous batch has not finished yet")]
    BatchInProgress,
    /// The pool cannot do this in its current state, e.g. shutting down
    /// mid-batch or sorting after shutdown.
    #[error("invalid pool state for this operation")]
    InvalidState,
}
