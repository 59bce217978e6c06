//! Strongly-typed identifiers and the [`Dims`] type alias.

use smallvec::SmallVec;
use std::fmt;

/// Identifies one participant within an SPMD group.
///
/// Participants are numbered `0..ranks`; rank 0 carries the group-level
/// responsibilities (scalar emission, metric aggregation, reporting).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rank(pub u32);

impl Rank {
    /// Whether this participant is the group root.
    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Rank {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Monotonically increasing simulation step counter.
///
/// Incremented each time the integrator advances the grid by one time step.
/// The streamed scalar form is a 32-bit value; [`StepId::as_i32`] performs
/// the narrowing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub u64);

impl StepId {
    /// Narrow to the 32-bit wire representation.
    ///
    /// Returns `None` when the counter no longer fits, which callers treat
    /// as a fatal configuration error rather than wrapping silently.
    pub fn as_i32(self) -> Option<i32> {
        i32::try_from(self.0).ok()
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StepId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Dimension list for a streamed variable.
///
/// Uses `SmallVec<[usize; 4]>` so the three-axis volumes (plus headroom)
/// never touch the heap. An empty list denotes a scalar.
pub type Dims = SmallVec<[usize; 4]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_root_detection() {
        assert!(Rank(0).is_root());
        assert!(!Rank(1).is_root());
    }

    #[test]
    fn step_id_narrows_within_range() {
        assert_eq!(StepId(0).as_i32(), Some(0));
        assert_eq!(StepId(i32::MAX as u64).as_i32(), Some(i32::MAX));
    }

    #[test]
    fn step_id_rejects_overflow() {
        assert_eq!(StepId(i32::MAX as u64 + 1).as_i32(), None);
        assert_eq!(StepId(u64::MAX).as_i32(), None);
    }
}
