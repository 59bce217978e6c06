//! Error types for the participant-group substrate.

use std::error::Error;
use std::fmt;

/// Failures on the point-to-point links or collectives.
///
/// Every variant is fatal for the participant group: the halo protocol has
/// no recovery path, and a missing peer leaves the collectives permanently
/// incomplete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// The peer's end of the link is gone (the participant exited or
    /// panicked).
    Disconnected {
        /// Rank of the vanished peer.
        peer: u32,
    },
    /// A delivered message carried the wrong tag, meaning the two sides of
    /// the protocol are out of phase.
    TagMismatch {
        /// Tag the receiver expected.
        expected: u16,
        /// Tag actually delivered.
        got: u16,
        /// Sending rank.
        from: u32,
    },
    /// A delivered message had the wrong kind for the collective in
    /// progress.
    Protocol {
        /// What was received instead.
        detail: String,
    },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected { peer } => write!(f, "link to rank {peer} is down"),
            Self::TagMismatch {
                expected,
                got,
                from,
            } => write!(
                f,
                "expected tag {expected} from rank {from}, got tag {got}"
            ),
            Self::Protocol { detail } => write!(f, "protocol violation: {detail}"),
        }
    }
}

impl Error for CommError {}
