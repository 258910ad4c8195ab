//! Shared pool state and the worker threads' run loop.

use std::ops::Range;
use std::sync::atomic::{fence, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_deque::{Injector, Steal};
use crossbeam_utils::sync::{Parker, Unparker};
use crossbeam_utils::CachePadded;
use log::debug;

use crate::partition::{partition, PartitionOutcome};
use crate::sync::BatchProgress;
use crate::task::{SequenceRef, Task};

/// Data accessible by the pool handle and every worker.
pub(crate) struct Shared<T> {
    pub queue: Injector<Task<T>>,
    pub sleep: Sleep,
    pub progress: BatchProgress,
}

impl<T> Shared<T> {
    /// Append a task and wake a worker to pick it up.
    pub fn enqueue(&self, task: Task<T>) {
        self.queue.push(task);
        // Pairs with the fence in the worker's pre-park recheck: either the
        // wake below sees the worker's sleepy bit, or the worker's recheck
        // sees this push.
        fence(Ordering::SeqCst);
        self.sleep.wake(1);
    }

    /// Non-blocking fetch from the shared queue.
    pub fn try_fetch(&self) -> Option<Task<T>> {
        loop {
            match self.queue.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        }
    }
}

/// Spawn the worker threads and hand back the state they all share.
pub(crate) fn init<T>(
    num_workers: usize,
    stack_size: Option<usize>,
) -> (Arc<Shared<T>>, Vec<JoinHandle<()>>)
where
    T: Ord + Clone + Send + 'static,
{
    let (sleep, mut parkers) = Sleep::new(num_workers);

    let shared = Arc::new(Shared {
        queue: Injector::new(),
        sleep,
        progress: BatchProgress::new(),
    });

    let mut handles = Vec::with_capacity(num_workers);
    for i in 0..num_workers {
        let mut worker = Worker {
            id: i as u32,
            shared: Arc::clone(&shared),
            parker: parkers[i].take().unwrap(),
        };

        let mut builder = std::thread::Builder::new().name(format!("sortie worker {}", i));
        if let Some(stack_size) = stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder
            .spawn(move || {
                profiling::register_thread!("Worker");

                worker.run();
            })
            .unwrap();

        handles.push(handle);
    }

    debug!("started {} sort workers", num_workers);

    (shared, handles)
}

struct SleepState {
    unparker: Unparker,
}

/// Lets workers block while the queue is empty instead of burning a core,
/// and lets producers wake just as many of them as there is new work.
pub(crate) struct Sleep {
    /// Atomic bitfield. The Nth bit set means the Nth worker is parked or
    /// about to park.
    sleepy_workers: AtomicU32,
    sleep_states: Vec<CachePadded<SleepState>>,
}

impl Sleep {
    fn new(num_workers: usize) -> (Self, Vec<Option<Parker>>) {
        let mut parkers = Vec::with_capacity(num_workers);
        let mut sleep_states = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let parker = Parker::new();
            sleep_states.push(CachePadded::new(SleepState {
                unparker: parker.unparker().clone(),
            }));
            parkers.push(Some(parker));
        }

        (
            Sleep {
                sleepy_workers: AtomicU32::new(0),
                sleep_states,
            },
            parkers,
        )
    }

    /// Wake up to n workers (stop early when they are all awake).
    pub fn wake(&self, mut n: u32) {
        while n > 0 {
            let mut sleepy_bits = self.sleepy_workers.load(Ordering::SeqCst);
            if sleepy_bits == 0 {
                // Everyone is already awake.
                return;
            }

            for i in 0..(self.sleep_states.len() as u32) {
                let bit = 1 << i;
                if sleepy_bits & bit == 0 {
                    continue;
                }

                let prev = self.sleepy_workers.fetch_and(!bit, Ordering::SeqCst);
                if prev & bit == 0 {
                    // Someone else woke this worker before we got to it.
                    // A good time to refresh our view of the sleepy bits.
                    sleepy_bits = self.sleepy_workers.load(Ordering::SeqCst);
                    if sleepy_bits == 0 {
                        return;
                    }
                    continue;
                }

                self.sleep_states[i as usize].unparker.unpark();
                n -= 1;
                break;
            }
        }
    }

    pub fn mark_sleepy(&self, worker: u32) {
        self.sleepy_workers.fetch_or(1 << worker, Ordering::SeqCst);
    }

    pub fn mark_awake(&self, worker: u32) {
        self.sleepy_workers.fetch_and(!(1 << worker), Ordering::SeqCst);
    }

    /// Unpark every worker regardless of the bitfield. Used during shutdown
    /// so no thread stays parked with poison tasks in the queue.
    pub fn wake_all(&self) {
        for state in &self.sleep_states {
            state.unparker.unpark();
        }
    }
}

struct Worker<T> {
    id: u32,
    shared: Arc<Shared<T>>,
    parker: Parker,
}

impl<T: Ord + Clone + Send> Worker<T> {
    fn run(&mut self) {
        loop {
            let task = match self.shared.try_fetch() {
                Some(task) => task,
                None => {
                    // The queue looked empty. Advertise that we are about to
                    // park, then look again: a task pushed between the two
                    // checks would otherwise be missed along with its wake-up.
                    self.shared.sleep.mark_sleepy(self.id);
                    fence(Ordering::SeqCst);
                    match self.shared.try_fetch() {
                        Some(task) => {
                            self.shared.sleep.mark_awake(self.id);
                            task
                        }
                        None => {
                            self.parker.park();
                            self.shared.sleep.mark_awake(self.id);
                            continue;
                        }
                    }
                }
            };

            match task {
                Task::Sort { seq, range } => self.process(seq, range),
                Task::Poison => break,
            }
        }

        debug!("sort worker {} exiting", self.id);
    }

    fn process(&mut self, seq: SequenceRef<T>, range: Range<usize>) {
        let outcome = {
            // SAFETY: queued task ranges are always disjoint, and this
            // reborrow ends before the child tasks below are enqueued.
            let elems = unsafe { seq.range_mut(range.clone()) };
            partition(elems)
        };

        match outcome {
            PartitionOutcome::NotPivoted => {
                // The subrange is fully sorted, nothing left to do for it.
                self.shared.progress.resolve_one();
            }
            PartitionOutcome::Pivoted { left, right } => {
                // Two children replace one parent. Recording the net growth
                // before the pushes keeps the invariant that a zero count
                // implies an empty queue.
                self.shared.progress.split_one();
                let base = range.start;
                self.shared.enqueue(Task::Sort {
                    seq,
                    range: base + left.start..base + left.end,
                });
                self.shared.enqueue(Task::Sort {
                    seq,
                    range: base + right.start..base + right.end,
                });
            }
        }
    }
}
