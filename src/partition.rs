//! The partition step of quicksort, three-way Hoare style.
//!
//! This is the only piece of the crate that touches element values. It is a
//! pure function over one mutable slice, so the worker threads can apply it
//! to disjoint subranges of the same sequence without coordination.

use std::ops::Range;

/// What happened to a subrange that was handed to [`partition`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// The range held at most two elements and is now sorted. No child
    /// ranges are produced.
    NotPivoted,
    /// The range was rearranged around a pivot. `left` and `right` are the
    /// child ranges, relative to the input slice. Both exclude the band of
    /// elements equal to the pivot sitting between them, which makes both
    /// strictly smaller than the input and guarantees that the recursion
    /// bottoms out even when every element is equal.
    Pivoted {
        left: Range<usize>,
        right: Range<usize>,
    },
}

/// Rearrange `elems` around a pivot, in place.
///
/// The pivot is the element at the midpoint index, picked before any swap.
/// On [`PartitionOutcome::Pivoted`], everything in the left child compares
/// strictly less than the pivot, everything in the right child strictly
/// greater, and the elements in between are equal to it and already in
/// their final position.
pub fn partition<T: Ord + Clone>(elems: &mut [T]) -> PartitionOutcome {
    if elems.len() <= 1 {
        return PartitionOutcome::NotPivoted;
    }
    if elems.len() == 2 {
        if elems[1] < elems[0] {
            elems.swap(0, 1);
        }
        return PartitionOutcome::NotPivoted;
    }

    // The pivot is held by value: the slot it came from moves around as
    // elements get swapped under the scan.
    let pivot = elems[elems.len() / 2].clone();

    // Invariant: elems[..l] is strictly smaller than the pivot, elems[r + 1..]
    // is strictly greater, and elems[l..i] is the band of equal elements.
    let mut l = 0;
    let mut r = elems.len() - 1;
    let mut i = 0;
    while i <= r {
        if elems[i] < pivot {
            elems.swap(i, l);
            l += 1;
            i += 1;
        } else if elems[i] > pivot {
            // r >= 1 here: the slot holding the pivot value is always within
            // elems[l..=r], so the window can't shrink to a single
            // greater-than-pivot element.
            elems.swap(i, r);
            r -= 1;
        } else {
            i += 1;
        }
    }

    PartitionOutcome::Pivoted {
        left: 0..l,
        right: r + 1..elems.len(),
    }
}

/// Recursive single-threaded partition sort.
///
/// The concurrent pool never calls this. It exists as the reference the
/// pool's output is checked against, built on the same partition step.
pub fn sequential_sort<T: Ord + Clone>(elems: &mut [T]) {
    match partition(elems) {
        PartitionOutcome::NotPivoted => {}
        PartitionOutcome::Pivoted { left, right } => {
            sequential_sort(&mut elems[left]);
            sequential_sort(&mut elems[right]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Checks the three-way postcondition without assuming which element
    // ended up as the pivot.
    fn check_pivoted(elems: &[i32], left: &Range<usize>, right: &Range<usize>) {
        assert!(left.start == 0 && right.end == elems.len());
        assert!(
            left.end < right.start,
            "the equal-to-pivot band must be non-empty: {:?} {:?}",
            left,
            right
        );
        let pivot = &elems[left.end];
        for v in &elems[left.clone()] {
            assert!(v < pivot);
        }
        for v in &elems[left.end..right.start] {
            assert!(v == pivot);
        }
        for v in &elems[right.clone()] {
            assert!(v > pivot);
        }
        // Both children are strictly smaller than the input, so the
        // recursion terminates.
        assert!(left.len() < elems.len());
        assert!(right.len() < elems.len());
    }

    #[test]
    fn tiny_ranges_are_terminal() {
        let mut empty: [i32; 0] = [];
        assert_eq!(partition(&mut empty), PartitionOutcome::NotPivoted);

        let mut one = [7];
        assert_eq!(partition(&mut one), PartitionOutcome::NotPivoted);
        assert_eq!(one, [7]);

        let mut pair = [9, 4];
        assert_eq!(partition(&mut pair), PartitionOutcome::NotPivoted);
        assert_eq!(pair, [4, 9]);

        let mut sorted_pair = [4, 9];
        assert_eq!(partition(&mut sorted_pair), PartitionOutcome::NotPivoted);
        assert_eq!(sorted_pair, [4, 9]);
    }

    #[test]
    fn splits_around_the_midpoint_pivot() {
        let mut elems = [5, 1, 3, 8, 2, 9, 3];
        match partition(&mut elems) {
            PartitionOutcome::Pivoted { left, right } => check_pivoted(&elems, &left, &right),
            other => panic!("expected a split, got {:?}", other),
        }
    }

    #[test]
    fn equal_elements_collapse_into_the_band() {
        let mut elems = [5; 64];
        match partition(&mut elems) {
            PartitionOutcome::Pivoted { left, right } => {
                assert_eq!(left, 0..0);
                assert_eq!(right, 64..64);
            }
            other => panic!("expected a split, got {:?}", other),
        }
        assert_eq!(elems, [5; 64]);
    }

    #[test]
    fn duplicates_mixed_with_distinct_values() {
        let inputs: &[&[i32]] = &[
            &[2, 1, 3, 1, 2, 3, 2],
            &[1, 1, 1, 2],
            &[3, 2, 1],
            &[10, -3, 10, -3, 10, 0],
            &[0, 0, 1, 0, 0],
        ];
        for input in inputs {
            let mut elems = input.to_vec();
            match partition(&mut elems) {
                PartitionOutcome::Pivoted { left, right } => {
                    check_pivoted(&elems, &left, &right)
                }
                other => panic!("expected a split for {:?}, got {:?}", input, other),
            }
            let mut sorted = input.to_vec();
            sorted.sort();
            elems.sort();
            assert_eq!(elems, sorted, "partition lost or duplicated elements");
        }
    }

    #[test]
    fn sequential_sort_matches_std_sort() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        for len in [0, 1, 2, 3, 10, 100, 1000] {
            let mut elems: Vec<i32> = (0..len).map(|_| rng.gen_range(-50..50)).collect();
            let mut expected = elems.clone();
            expected.sort();
            sequential_sort(&mut elems);
            assert_eq!(elems, expected);
        }

        let mut equal = vec![3u8; 1000];
        sequential_sort(&mut equal);
        assert_eq!(equal, vec![3u8; 1000]);
    }

    #[test]
    fn sequential_sort_is_idempotent() {
        let mut elems: Vec<i32> = (0..100).collect();
        sequential_sort(&mut elems);
        assert_eq!(elems, (0..100).collect::<Vec<i32>>());
    }
}
