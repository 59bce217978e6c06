//! Core types shared across the coral simulation workspace.
//!
//! This crate holds the strongly-typed identifiers, dimension aliases, and
//! the Gray–Scott parameter set. It is dependency-light so every other
//! crate in the workspace can build on it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod id;
pub mod params;

pub use id::{Dims, Rank, StepId};
pub use params::{Params, ParamsError};
