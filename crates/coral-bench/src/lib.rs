//! Benchmark profiles for the coral simulation workspace.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use coral_core::{Params, Rank};
use coral_grid::{Grid, GridLayout};

/// Build a single-participant cubic grid with the standard seed, ghosts
/// filled by the zero-flux rule so the stencil can run immediately.
pub fn seeded_grid(extent: usize) -> Grid {
    let layout = GridLayout::new(Rank(0), 1, extent, extent, extent)
        .expect("benchmark extent is valid");
    let mut grid = Grid::new(layout);
    fill_ghosts(&mut grid);
    grid
}

/// Copy the owned boundary planes into both ghosts (the single-participant
/// form of the halo refresh).
pub fn fill_ghosts(grid: &mut Grid) {
    let layout = *grid.layout();
    let plane = layout.plane();
    let last_owned = layout.local_nz() * plane;
    let (u, v) = grid.halo_buffers();
    for field in [u, v] {
        field.copy_within(plane..2 * plane, 0);
        field.copy_within(last_owned..last_owned + plane, last_owned + plane);
    }
}

/// The reference parameter set used across the benches.
pub fn reference_params() -> Params {
    Params::default()
}
