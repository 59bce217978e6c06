//! Ghost-plane refresh protocol.
//!
//! Before each integrator pass, every participant's two ghost planes must
//! reflect the freshest owned boundary planes of its Z neighbours, or its
//! own boundary planes at the domain ends (zero-flux). One refresh moves
//! four messages per field, with a distinct tag per direction and per field
//! so an out-of-phase peer is detected instead of silently cross-matching.

use coral_core::Rank;
use coral_grid::{Grid, GridLayout};

use crate::error::CommError;
use crate::group::Communicator;

/// Tag for U planes travelling downward (received from above).
const TAG_U_DOWN: u16 = 0;
/// Tag for U planes travelling upward (received from below).
const TAG_U_UP: u16 = 1;
/// Tag for V planes travelling downward.
const TAG_V_DOWN: u16 = 2;
/// Tag for V planes travelling upward.
const TAG_V_UP: u16 = 3;

/// Refreshes the ghost planes of a [`Grid`] against its Z neighbours.
pub struct HaloExchanger {
    below: Option<Rank>,
    above: Option<Rank>,
    plane: usize,
    local_nz: usize,
}

impl HaloExchanger {
    /// Build the exchanger for a participant's slab.
    pub fn new(layout: &GridLayout) -> Self {
        Self {
            below: layout.below(),
            above: layout.above(),
            plane: layout.plane(),
            local_nz: layout.local_nz(),
        }
    }

    /// Make both fields' ghost planes consistent.
    ///
    /// For each field: pack the owned boundary planes, exchange them with
    /// the neighbours (lower plane down / upper plane up), unpack received
    /// planes into the ghosts, then copy the local boundary plane into any
    /// ghost that has no neighbour behind it.
    ///
    /// # Errors
    ///
    /// Any link failure or tag mismatch is fatal; the caller must abort the
    /// participant group.
    pub fn refresh(&self, comm: &Communicator, grid: &mut Grid) -> Result<(), CommError> {
        let (u, v) = grid.halo_buffers();
        self.refresh_field(comm, u, TAG_U_DOWN, TAG_U_UP)?;
        self.refresh_field(comm, v, TAG_V_DOWN, TAG_V_UP)?;
        Ok(())
    }

    fn refresh_field(
        &self,
        comm: &Communicator,
        field: &mut [f64],
        tag_down: u16,
        tag_up: u16,
    ) -> Result<(), CommError> {
        let plane = self.plane;
        let lower_owned = plane..2 * plane;
        let upper_owned = self.local_nz * plane..(self.local_nz + 1) * plane;
        let upper_ghost_start = (self.local_nz + 1) * plane;

        // Owned boundary planes are contiguous; packing is a slice copy.
        let send_down = field[lower_owned.clone()].to_vec();
        let send_up = field[upper_owned.clone()].to_vec();

        let from_above = comm.send_recv(self.below, &send_down, self.above, tag_down)?;
        let from_below = comm.send_recv(self.above, &send_up, self.below, tag_up)?;

        if let Some(data) = from_above {
            field[upper_ghost_start..].copy_from_slice(&data);
        }
        if let Some(data) = from_below {
            field[..plane].copy_from_slice(&data);
        }

        // Zero-flux fill at the domain ends.
        if self.below.is_none() {
            field.copy_within(lower_owned, 0);
        }
        if self.above.is_none() {
            field.copy_within(upper_owned, upper_ghost_start);
        }
        Ok(())
    }
}
