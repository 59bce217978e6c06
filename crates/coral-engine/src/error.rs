//! Driver error type.

use std::error::Error;
use std::fmt;

use coral_comm::CommError;
use coral_core::ParamsError;
use coral_grid::GridError;
use coral_stream::StreamError;

/// Any failure a driver can surface.
///
/// Wraps the subsystem errors; every variant is fatal for the participant
/// group (the consumer's skip-and-continue cases are handled inside the
/// driver and never reach this type).
#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    /// Grid construction or decomposition failed.
    Grid(GridError),
    /// A link or collective failed.
    Comm(CommError),
    /// A stream engine failed.
    Stream(StreamError),
    /// The parameter set is invalid.
    Params(ParamsError),
    /// A driver-level configuration problem.
    Config {
        /// What was wrong.
        reason: String,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid(e) => write!(f, "grid: {e}"),
            Self::Comm(e) => write!(f, "communication: {e}"),
            Self::Stream(e) => write!(f, "stream: {e}"),
            Self::Params(e) => write!(f, "parameters: {e}"),
            Self::Config { reason } => write!(f, "configuration: {reason}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Grid(e) => Some(e),
            Self::Comm(e) => Some(e),
            Self::Stream(e) => Some(e),
            Self::Params(e) => Some(e),
            Self::Config { .. } => None,
        }
    }
}

impl From<GridError> for EngineError {
    fn from(e: GridError) -> Self {
        Self::Grid(e)
    }
}

impl From<CommError> for EngineError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}

impl From<StreamError> for EngineError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<ParamsError> for EngineError {
    fn from(e: ParamsError) -> Self {
        Self::Params(e)
    }
}
