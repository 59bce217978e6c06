//! Coral: a distributed Gray–Scott reaction–diffusion simulation that
//! streams volumetric state over a step-oriented transport.
//!
//! This is the facade crate re-exporting the public API of the coral
//! sub-crates. For most uses, depending on `coral` alone is enough.
//!
//! # Quick start
//!
//! ```
//! use coral::prelude::*;
//!
//! // A tiny single-participant run into an in-memory record of steps.
//! let config = SimConfig::cubic(16, 10, 5);
//! let sink = CollectiveWriter::new(ArchiveWriter::new(Vec::<u8>::new()).unwrap(), 1);
//! let results = Group::run(1, |comm| run_simulation(&comm, &config, &sink).unwrap());
//! assert_eq!(results[0].outputs, 3); // steps 0, 5, and 10
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `coral-core` | IDs, dimension aliases, Gray–Scott parameters |
//! | [`grid`] | `coral-grid` | Z-slab decomposition, ghost-layered fields, seed |
//! | [`comm`] | `coral-comm` | Participant groups, links, halo exchange |
//! | [`stencil`] | `coral-stencil` | The explicit-Euler integrator |
//! | [`stream`] | `coral-stream` | Wire codec, archive and socket engines |
//! | [`engine`] | `coral-engine` | Producer, consumer, and relay drivers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and parameters (`coral-core`).
pub use coral_core as types;

/// Decomposition and field storage (`coral-grid`).
pub use coral_grid as grid;

/// Participant groups and halo exchange (`coral-comm`).
pub use coral_comm as comm;

/// The Gray–Scott integrator (`coral-stencil`).
pub use coral_stencil as stencil;

/// Streaming engines and the step contract (`coral-stream`).
pub use coral_stream as stream;

/// Drivers and metrics (`coral-engine`).
pub use coral_engine as engine;

/// The types most programs need.
pub mod prelude {
    pub use coral_comm::{Communicator, Group, HaloExchanger};
    pub use coral_core::{Params, Rank, StepId};
    pub use coral_engine::{
        run_consumer, run_relay, run_simulation, SimConfig, TransferMetrics,
    };
    pub use coral_grid::{partition, Grid, GridLayout};
    pub use coral_stencil::GrayScott;
    pub use coral_stream::{
        ArchiveReader, ArchiveWriter, CollectiveReader, CollectiveWriter, Selection, SstIn,
        SstOut, StepSink, StepSource, StepStatus, StreamConfig,
    };
}
