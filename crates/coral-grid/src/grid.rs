//! Ghost-layered local subvolume.
//!
//! [`GridLayout`] fixes the participant's slab within the global lattice;
//! [`Grid`] owns the four field buffers (current and next U and V) sized
//! with one ghost plane on each Z face. Buffer pairs rotate by handle swap,
//! never by copy, so no reader of the current generation may outlive the
//! swap.

use coral_core::Rank;

use crate::decomp::partition;
use crate::error::GridError;
use crate::seed;

/// This participant's slab of the global lattice.
///
/// Layout is fixed at construction: Z is decomposed base-plus-remainder
/// across the group, Y and X are held in full everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridLayout {
    rank: Rank,
    ranks: u32,
    global_nz: usize,
    ny: usize,
    nx: usize,
    local_nz: usize,
    z_start: usize,
}

impl GridLayout {
    /// Compute the layout for participant `rank` of `ranks` over a global
    /// `(nz, ny, nx)` lattice.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the group is empty, the rank is out of range, the Z
    /// extent is smaller than the group (an empty slab cannot exchange
    /// halos), a periodic axis is below the stencil minimum of 3, or the
    /// ghost-padded buffer size overflows `usize`.
    pub fn new(
        rank: Rank,
        ranks: u32,
        nz: usize,
        ny: usize,
        nx: usize,
    ) -> Result<Self, GridError> {
        if ranks == 0 {
            return Err(GridError::EmptyGroup);
        }
        if rank.0 >= ranks {
            return Err(GridError::InvalidRank { rank: rank.0, ranks });
        }
        if nz < ranks as usize {
            return Err(GridError::DomainTooThin { nz, ranks });
        }
        if ny < 3 {
            return Err(GridError::AxisTooSmall {
                axis: "ny",
                extent: ny,
            });
        }
        if nx < 3 {
            return Err(GridError::AxisTooSmall {
                axis: "nx",
                extent: nx,
            });
        }

        let slab = partition(nz, ranks, rank.0);
        // Ghost-padded buffer must fit in usize.
        slab.count
            .checked_add(2)
            .and_then(|z| z.checked_mul(ny))
            .and_then(|zy| zy.checked_mul(nx))
            .ok_or(GridError::SizeOverflow)?;

        Ok(Self {
            rank,
            ranks,
            global_nz: nz,
            ny,
            nx,
            local_nz: slab.count,
            z_start: slab.start,
        })
    }

    /// Participant identifier.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Participant group size.
    pub fn ranks(&self) -> u32 {
        self.ranks
    }

    /// Global Z extent.
    pub fn global_nz(&self) -> usize {
        self.global_nz
    }

    /// Y extent (global and local).
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// X extent (global and local).
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Number of owned Z planes.
    pub fn local_nz(&self) -> usize {
        self.local_nz
    }

    /// Global index of the first owned Z plane.
    pub fn z_start(&self) -> usize {
        self.z_start
    }

    /// Cells in one Z plane.
    pub fn plane(&self) -> usize {
        self.ny * self.nx
    }

    /// Cells in the ghost-stripped subvolume.
    pub fn interior_len(&self) -> usize {
        self.local_nz * self.plane()
    }

    /// Cells in a field buffer including both ghost planes.
    pub fn padded_len(&self) -> usize {
        (self.local_nz + 2) * self.plane()
    }

    /// The rank owning the slab below this one, if any.
    pub fn below(&self) -> Option<Rank> {
        (self.rank.0 > 0).then(|| Rank(self.rank.0 - 1))
    }

    /// The rank owning the slab above this one, if any.
    pub fn above(&self) -> Option<Rank> {
        (self.rank.0 + 1 < self.ranks).then(|| Rank(self.rank.0 + 1))
    }

    /// Flat index into a ghost-padded buffer.
    ///
    /// `lz` includes the ghost offset: 0 is the lower ghost plane,
    /// `1..=local_nz` are owned planes, `local_nz + 1` is the upper ghost.
    #[inline(always)]
    pub fn index(&self, lz: usize, ly: usize, lx: usize) -> usize {
        lz * self.ny * self.nx + ly * self.nx + lx
    }
}

/// Split borrows over a grid for one integrator pass.
///
/// Reads come from the frozen `u`/`v` generation; writes go to
/// `u_next`/`v_next`. Produced by [`Grid::update_buffers`].
pub struct UpdateBuffers<'a> {
    /// Current U generation, including ghost planes.
    pub u: &'a [f64],
    /// Current V generation, including ghost planes.
    pub v: &'a [f64],
    /// Next U generation, written by the integrator.
    pub u_next: &'a mut [f64],
    /// Next V generation, written by the integrator.
    pub v_next: &'a mut [f64],
    /// Slab layout for index arithmetic.
    pub layout: &'a GridLayout,
}

/// A participant's ghost-layered subvolume of the U and V fields.
pub struct Grid {
    layout: GridLayout,
    u: Vec<f64>,
    v: Vec<f64>,
    u_next: Vec<f64>,
    v_next: Vec<f64>,
}

impl Grid {
    /// Allocate the four field buffers, set the uniform background
    /// (U ≡ 1, V ≡ 0), and deposit the centre-cube perturbation.
    pub fn new(layout: GridLayout) -> Self {
        let len = layout.padded_len();
        let mut u = vec![1.0; len];
        let mut v = vec![0.0; len];
        seed::deposit(&layout, &mut u, &mut v);
        Self {
            layout,
            u,
            v,
            u_next: vec![0.0; len],
            v_next: vec![0.0; len],
        }
    }

    /// Slab layout.
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Flat index into a ghost-padded buffer (see [`GridLayout::index`]).
    #[inline(always)]
    pub fn index(&self, lz: usize, ly: usize, lx: usize) -> usize {
        self.layout.index(lz, ly, lx)
    }

    /// Current U generation, including ghost planes.
    pub fn u(&self) -> &[f64] {
        &self.u
    }

    /// Current V generation, including ghost planes.
    pub fn v(&self) -> &[f64] {
        &self.v
    }

    /// Mutable access to the current U and V generations, for the halo
    /// exchange to refresh ghost planes in place.
    pub fn halo_buffers(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.u, &mut self.v)
    }

    /// Split borrows for one integrator pass.
    pub fn update_buffers(&mut self) -> UpdateBuffers<'_> {
        UpdateBuffers {
            u: &self.u,
            v: &self.v,
            u_next: &mut self.u_next,
            v_next: &mut self.v_next,
            layout: &self.layout,
        }
    }

    /// Rotate the (current, next) buffer pairs by handle.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.u, &mut self.u_next);
        std::mem::swap(&mut self.v, &mut self.v_next);
    }

    /// Ghost-stripped snapshot of U, shape `(local_nz, ny, nx)`, Z-major
    /// with X fastest.
    ///
    /// Owned planes are contiguous between the two ghost planes, so this is
    /// a single slice copy.
    pub fn interior_u(&self) -> Vec<f64> {
        let plane = self.layout.plane();
        self.u[plane..plane + self.layout.interior_len()].to_vec()
    }

    /// Ghost-stripped snapshot of V (see [`Grid::interior_u`]).
    pub fn interior_v(&self) -> Vec<f64> {
        let plane = self.layout.plane();
        self.v[plane..plane + self.layout.interior_len()].to_vec()
    }
}
