//! Error types for the streaming engines.

use std::error::Error;
use std::fmt;

use crate::variable::ElementType;

/// Failures from the archive and socket engines and their collective
/// wrappers.
///
/// The variants are `Clone` so the leader of a collective operation can
/// hand the same failure to every participant; I/O errors are therefore
/// carried as rendered text rather than as `std::io::Error` values.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamError {
    /// An underlying I/O operation failed.
    Io {
        /// Rendered source error.
        detail: String,
    },
    /// Rendezvous did not complete within the configured open timeout.
    OpenTimeout {
        /// The timeout that expired, in seconds.
        seconds: u64,
    },
    /// The peer vanished mid-stream (socket closed without an
    /// end-of-stream frame, or the sender thread died).
    ConnectionLost {
        /// What was observed.
        detail: String,
    },
    /// The rendezvous contact file is missing its header line or the
    /// connection string.
    InvalidContact {
        /// What was wrong.
        detail: String,
    },
    /// The archive does not start with the expected magic bytes.
    InvalidMagic,
    /// The archive was written by an unknown format version.
    UnsupportedVersion {
        /// Version byte found.
        found: u8,
    },
    /// A step frame is truncated or internally inconsistent.
    Malformed {
        /// What was wrong.
        detail: String,
    },
    /// A variable was defined twice with different declarations.
    VariableRedefined {
        /// Variable name.
        name: String,
    },
    /// A put or get referenced a variable that was never defined, or that
    /// is absent from the current step.
    UnknownVariable {
        /// Variable name.
        name: String,
    },
    /// The element type of the data does not match the declaration.
    TypeMismatch {
        /// Variable name.
        name: String,
        /// Declared element type.
        want: ElementType,
        /// Element type of the access.
        got: ElementType,
    },
    /// Scalar-shaped data where an array was expected, or vice versa.
    ShapeMismatch {
        /// Variable name.
        name: String,
        /// What was wrong.
        detail: String,
    },
    /// A selection reaches outside the variable's global shape, or its
    /// element count disagrees with the supplied buffer.
    InvalidSelection {
        /// Variable name (empty for free-standing region operations).
        name: String,
        /// What was wrong.
        detail: String,
    },
    /// A dimension product overflows the platform size type.
    SizeOverflow,
    /// An engine operation outside an open step, or a step operation on a
    /// closed engine.
    InvalidState {
        /// What was attempted.
        detail: String,
    },
    /// The configuration record is unusable.
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { detail } => write!(f, "i/o failure: {detail}"),
            Self::OpenTimeout { seconds } => {
                write!(f, "rendezvous not completed within {seconds} s")
            }
            Self::ConnectionLost { detail } => write!(f, "connection lost: {detail}"),
            Self::InvalidContact { detail } => write!(f, "bad contact file: {detail}"),
            Self::InvalidMagic => write!(f, "not a coral archive (bad magic)"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported archive version {found}")
            }
            Self::Malformed { detail } => write!(f, "malformed step frame: {detail}"),
            Self::VariableRedefined { name } => {
                write!(f, "variable '{name}' redefined with a different declaration")
            }
            Self::UnknownVariable { name } => write!(f, "unknown variable '{name}'"),
            Self::TypeMismatch { name, want, got } => {
                write!(f, "variable '{name}' is {want}, accessed as {got}")
            }
            Self::ShapeMismatch { name, detail } => {
                write!(f, "variable '{name}' shape mismatch: {detail}")
            }
            Self::InvalidSelection { name, detail } => {
                write!(f, "invalid selection on '{name}': {detail}")
            }
            Self::SizeOverflow => write!(f, "dimension product overflows usize"),
            Self::InvalidState { detail } => write!(f, "invalid engine state: {detail}"),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl Error for StreamError {}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            detail: e.to_string(),
        }
    }
}
