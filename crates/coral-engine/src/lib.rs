//! Drivers coupling the stencil core to the streaming transport.
//!
//! Three entry points, one per process role:
//!
//! - [`run_simulation`]: integrate the Gray–Scott system and emit a
//!   streaming step every output interval;
//! - [`run_consumer`]: receive steps, re-tile them across the consumer
//!   group, persist them to an archive sink, and record transfer metrics;
//! - [`run_relay`]: replay an existing volume archive onto the streaming
//!   transport with the same decomposition semantics.
//!
//! Each is an SPMD function: every participant of a [`coral_comm::Group`]
//! calls it with its own communicator and a clone of the shared stream
//! handles.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod consumer;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod relay;

pub use consumer::{run_consumer, ConsumerSummary};
pub use error::EngineError;
pub use metrics::{MetricsSummary, StepMetric, TransferMetrics};
pub use producer::{run_simulation, SimConfig, SimSummary};
pub use relay::{run_relay, RelaySummary};
