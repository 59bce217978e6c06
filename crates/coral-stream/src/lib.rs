//! Step-oriented streaming transport.
//!
//! One logical *step* is a set of named variables framed by begin/end
//! brackets. Two engines speak the same wire format:
//!
//! - the **archive** engine persists steps to a file and replays them;
//! - the **stream** engine ships steps over a TCP socket with a rendezvous
//!   contact file, a bounded outbound queue (backpressure), and an explicit
//!   end-of-stream frame.
//!
//! Both are wrapped by a collective layer so a whole participant group can
//! share a single sink or source: every operation is called by every
//! participant, a barrier aligns the group, and one leader commits the
//! assembled step.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod archive;
pub mod collective;
pub mod config;
pub mod contact;
pub mod error;
pub mod selection;
pub mod sst;
pub mod variable;
pub mod wire;

pub use archive::{ArchiveReader, ArchiveWriter};
pub use collective::{
    CollectiveReader, CollectiveWriter, RawSink, RawSource, StepSink, StepSource, StepStatus,
    VarHandle,
};
pub use config::{Marshal, QueueFullPolicy, StreamConfig, Transport};
pub use error::StreamError;
pub use selection::Selection;
pub use sst::{SstIn, SstOut};
pub use variable::{ElementType, StepRecord, VarData, VarInfo, VarRecord};
