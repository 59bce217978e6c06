//! Base-plus-remainder axis partitioning.
//!
//! The same scheme splits the producer's Z axis across P participants and
//! the consumer's first axis across Q participants, so it lives here as a
//! free function rather than inside either driver.

/// A contiguous range along one axis, owned by a single participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slab {
    /// First index of the range.
    pub start: usize,
    /// Number of indices in the range (may be zero when there are more
    /// participants than indices).
    pub count: usize,
}

/// Split `extent` indices across `parts` participants, returning the slab
/// owned by participant `index`.
///
/// Each participant receives `extent / parts` indices; the first
/// `extent % parts` participants receive one extra. Slabs are contiguous,
/// non-overlapping, ordered by participant index, and together cover
/// exactly `[0, extent)`.
pub fn partition(extent: usize, parts: u32, index: u32) -> Slab {
    debug_assert!(index < parts, "participant index {index} out of {parts}");
    let parts = parts as usize;
    let index = index as usize;
    let base = extent / parts;
    let rem = extent % parts;
    Slab {
        start: index * base + index.min(rem),
        count: base + usize::from(index < rem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn even_split() {
        assert_eq!(partition(8, 4, 0), Slab { start: 0, count: 2 });
        assert_eq!(partition(8, 4, 3), Slab { start: 6, count: 2 });
    }

    #[test]
    fn remainder_goes_to_leading_participants() {
        // 10 over 4: counts 3,3,2,2
        assert_eq!(partition(10, 4, 0), Slab { start: 0, count: 3 });
        assert_eq!(partition(10, 4, 1), Slab { start: 3, count: 3 });
        assert_eq!(partition(10, 4, 2), Slab { start: 6, count: 2 });
        assert_eq!(partition(10, 4, 3), Slab { start: 8, count: 2 });
    }

    #[test]
    fn single_participant_owns_everything() {
        assert_eq!(partition(31, 1, 0), Slab { start: 0, count: 31 });
    }

    #[test]
    fn more_parts_than_extent_yields_empty_slabs() {
        assert_eq!(partition(2, 4, 0).count, 1);
        assert_eq!(partition(2, 4, 1).count, 1);
        assert_eq!(partition(2, 4, 2).count, 0);
        assert_eq!(partition(2, 4, 3).count, 0);
    }

    proptest! {
        /// Slabs tile [0, extent) exactly: counts sum to the extent, starts
        /// are strictly increasing, and each slab begins where the previous
        /// one ended.
        #[test]
        fn slabs_tile_the_axis(extent in 0usize..2000, parts in 1u32..64) {
            let mut covered = 0usize;
            for index in 0..parts {
                let slab = partition(extent, parts, index);
                prop_assert_eq!(slab.start, covered);
                covered += slab.count;
            }
            prop_assert_eq!(covered, extent);
        }

        /// No participant's slab is more than one index larger than
        /// another's.
        #[test]
        fn slabs_are_balanced(extent in 0usize..2000, parts in 1u32..64) {
            let counts: Vec<usize> =
                (0..parts).map(|i| partition(extent, parts, i).count).collect();
            let min = counts.iter().min().unwrap();
            let max = counts.iter().max().unwrap();
            prop_assert!(max - min <= 1);
        }
    }
}
