use std::ops::Range;

/// A lifetime-erased handle to a caller-owned sequence.
///
/// The pool borrows every sequence of a batch for the duration of one
/// `sort_batch` call and hands out disjoint subranges of it to the worker
/// threads. The call does not return before the last task referencing the
/// batch has been resolved, so no `SequenceRef` outlives the borrow it was
/// created from.
pub(crate) struct SequenceRef<T> {
    ptr: *mut T,
    len: usize,
}

impl<T> SequenceRef<T> {
    pub fn new(seq: &mut [T]) -> Self {
        SequenceRef {
            ptr: seq.as_mut_ptr(),
            len: seq.len(),
        }
    }

    /// Reborrow a subrange of the sequence.
    ///
    /// Safety: no other live slice may overlap `range`. The pool upholds
    /// this because the ranges held by queued tasks are always disjoint and
    /// a parent's reborrow ends before its children are enqueued.
    pub unsafe fn range_mut(&self, range: Range<usize>) -> &mut [T] {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "malformed task range {:?} for a sequence of length {}",
            range,
            self.len,
        );
        std::slice::from_raw_parts_mut(self.ptr.add(range.start), range.end - range.start)
    }
}

impl<T> Clone for SequenceRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SequenceRef<T> {}

unsafe impl<T: Send> Send for SequenceRef<T> {}

/// A unit of work sitting in the shared queue.
pub(crate) enum Task<T> {
    /// Partition `range` within the sequence, then either resolve it or
    /// feed two smaller ranges back into the queue.
    Sort {
        seq: SequenceRef<T>,
        range: Range<usize>,
    },
    /// Tells exactly one worker to exit its loop. Only queued during
    /// shutdown, one per worker.
    Poison,
}
