//! Domain decomposition and ghost-layered field storage.
//!
//! The global lattice is split into Z-slabs, one per participant. Each
//! participant owns a [`Grid`] holding its slab of the U and V fields plus
//! one ghost plane on either Z face; the ghost planes are refreshed by the
//! halo exchange before every integrator pass.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod decomp;
pub mod error;
pub mod grid;
pub mod seed;

pub use decomp::{partition, Slab};
pub use error::GridError;
pub use grid::{Grid, GridLayout, UpdateBuffers};
