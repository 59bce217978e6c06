//! Error types for grid construction.

use std::error::Error;
use std::fmt;

/// Rejection reasons from [`GridLayout::new`](crate::GridLayout::new).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridError {
    /// The group has zero participants.
    EmptyGroup,
    /// The participant index is outside the group.
    InvalidRank {
        /// Offending rank.
        rank: u32,
        /// Group size.
        ranks: u32,
    },
    /// The Z extent is smaller than the participant count, so at least one
    /// participant would own no slab.
    DomainTooThin {
        /// Global Z extent.
        nz: usize,
        /// Group size.
        ranks: u32,
    },
    /// A periodic axis is too small for the 7-point stencil.
    AxisTooSmall {
        /// Axis name ("ny" or "nx").
        axis: &'static str,
        /// Offending extent.
        extent: usize,
    },
    /// The local buffer size overflows the platform size type.
    SizeOverflow,
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGroup => write!(f, "participant group is empty"),
            Self::InvalidRank { rank, ranks } => {
                write!(f, "rank {rank} outside group of {ranks}")
            }
            Self::DomainTooThin { nz, ranks } => {
                write!(f, "Z extent {nz} is smaller than the group size {ranks}")
            }
            Self::AxisTooSmall { axis, extent } => {
                write!(f, "axis {axis} must be >= 3 for the stencil, got {extent}")
            }
            Self::SizeOverflow => write!(f, "local buffer size overflows usize"),
        }
    }
}

impl Error for GridError {}
