//! SPMD participant groups and the halo-exchange protocol.
//!
//! A [`Group`] runs P participants as scoped threads over a full mesh of
//! channel links. Every participant executes the same function,
//! distinguished only by its [`Communicator`], which offers the three
//! primitives the simulation needs: paired send/receive, a group barrier,
//! and a sum-to-root reduction. [`HaloExchanger`] builds the ghost-plane
//! refresh protocol on top of the paired exchanges.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod group;
pub mod halo;

pub use error::CommError;
pub use group::{Communicator, Group};
pub use halo::HaloExchanger;
