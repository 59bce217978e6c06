//! Explicit-Euler integrator for the Gray–Scott system.
//!
//! One [`GrayScott::advance`] call applies a single time step to every
//! owned cell of a [`Grid`]. Reads come exclusively from the frozen current
//! generation (ghosts included), writes go to the next generation, and the
//! buffer pairs rotate by handle at the end of the pass. The caller is
//! responsible for refreshing the ghost planes first.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use coral_core::{Params, ParamsError};
use coral_grid::Grid;

/// The Gray–Scott reaction–diffusion update.
///
/// Each step computes a 7-point discrete Laplacian per field — Z through
/// the ghost planes, Y and X periodic — and advances
///
/// ```text
/// du/dt = Du·lap(U) − u·v² + F·(1 − u)
/// dv/dt = Dv·lap(V) + u·v² − (F + k)·v
/// ```
///
/// by explicit Euler, clamping both fields to `[0, 1]`. The clamp is part
/// of the contract: the coarse default time step can overshoot slightly,
/// and downstream consumers assume bounded concentrations.
#[derive(Clone, Copy, Debug)]
pub struct GrayScott {
    params: Params,
}

impl GrayScott {
    /// Build the integrator, validating the parameter set.
    ///
    /// # Errors
    ///
    /// Returns `Err` for non-finite values, negative rates or diffusion
    /// coefficients, or non-positive `dt`/`dx`.
    pub fn new(params: Params) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// The validated parameter set.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Advance the grid by one time step and rotate its buffer pairs.
    pub fn advance(&self, grid: &mut Grid) {
        let Params {
            du,
            dv,
            feed,
            kill,
            dt,
            dx,
        } = self.params;
        let inv_dx2 = 1.0 / (dx * dx);

        {
            let bufs = grid.update_buffers();
            let layout = bufs.layout;
            let (ny, nx) = (layout.ny(), layout.nx());

            for lz in 1..=layout.local_nz() {
                for ly in 0..ny {
                    let ly_m = if ly == 0 { ny - 1 } else { ly - 1 };
                    let ly_p = if ly + 1 == ny { 0 } else { ly + 1 };
                    for lx in 0..nx {
                        let lx_m = if lx == 0 { nx - 1 } else { lx - 1 };
                        let lx_p = if lx + 1 == nx { 0 } else { lx + 1 };

                        let idx = layout.index(lz, ly, lx);
                        let uc = bufs.u[idx];
                        let vc = bufs.v[idx];

                        let lap_u = (bufs.u[layout.index(lz - 1, ly, lx)]
                            + bufs.u[layout.index(lz + 1, ly, lx)]
                            + bufs.u[layout.index(lz, ly_m, lx)]
                            + bufs.u[layout.index(lz, ly_p, lx)]
                            + bufs.u[layout.index(lz, ly, lx_m)]
                            + bufs.u[layout.index(lz, ly, lx_p)]
                            - 6.0 * uc)
                            * inv_dx2;
                        let lap_v = (bufs.v[layout.index(lz - 1, ly, lx)]
                            + bufs.v[layout.index(lz + 1, ly, lx)]
                            + bufs.v[layout.index(lz, ly_m, lx)]
                            + bufs.v[layout.index(lz, ly_p, lx)]
                            + bufs.v[layout.index(lz, ly, lx_m)]
                            + bufs.v[layout.index(lz, ly, lx_p)]
                            - 6.0 * vc)
                            * inv_dx2;

                        let uvv = uc * vc * vc;
                        let du_dt = du * lap_u - uvv + feed * (1.0 - uc);
                        let dv_dt = dv * lap_v + uvv - (feed + kill) * vc;

                        bufs.u_next[idx] = (uc + dt * du_dt).clamp(0.0, 1.0);
                        bufs.v_next[idx] = (vc + dt * dv_dt).clamp(0.0, 1.0);
                    }
                }
            }
        }

        grid.swap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coral_core::Rank;
    use coral_grid::GridLayout;

    fn make_grid(n: usize) -> Grid {
        Grid::new(GridLayout::new(Rank(0), 1, n, n, n).unwrap())
    }

    /// Single-participant stand-in for the halo exchange: copy the owned
    /// boundary planes into both ghosts (zero-flux).
    fn fill_ghosts(grid: &mut Grid) {
        let layout = *grid.layout();
        let plane = layout.plane();
        let last_owned = layout.local_nz() * plane;
        let (u, v) = grid.halo_buffers();
        for field in [u, v] {
            field.copy_within(plane..2 * plane, 0);
            field.copy_within(last_owned..last_owned + plane, last_owned + plane);
        }
    }

    fn params(du: f64, dv: f64, feed: f64, kill: f64) -> Params {
        Params {
            du,
            dv,
            feed,
            kill,
            ..Params::default()
        }
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(GrayScott::new(params(-0.1, 0.1, 0.0, 0.0)).is_err());
        assert!(GrayScott::new(Params {
            dt: 0.0,
            ..Params::default()
        })
        .is_err());
    }

    #[test]
    fn no_reaction_no_diffusion_is_identity() {
        // With all rates zero the update must reproduce the input exactly,
        // including the periodic wrap on Y and X.
        let mut grid = make_grid(8);
        fill_ghosts(&mut grid);
        let u_before = grid.u().to_vec();
        let v_before = grid.v().to_vec();

        let gs = GrayScott::new(params(0.0, 0.0, 0.0, 0.0)).unwrap();
        gs.advance(&mut grid);

        let plane = grid.layout().plane();
        let interior = plane..plane + grid.layout().interior_len();
        assert_eq!(grid.u()[interior.clone()], u_before[interior.clone()]);
        assert_eq!(grid.v()[interior.clone()], v_before[interior]);
    }

    #[test]
    fn uniform_field_stays_uniform_under_diffusion() {
        let mut grid = make_grid(8);
        // Overwrite the seed with a uniform state.
        {
            let (u, v) = grid.halo_buffers();
            u.fill(0.7);
            v.fill(0.3);
        }
        let gs = GrayScott::new(params(0.2, 0.1, 0.0, 0.0)).unwrap();
        // With F = k = 0 the only coupling is u·v², so pick V = 0.
        {
            let (_, v) = grid.halo_buffers();
            v.fill(0.0);
        }
        fill_ghosts(&mut grid);
        gs.advance(&mut grid);

        let plane = grid.layout().plane();
        for &x in &grid.u()[plane..plane + grid.layout().interior_len()] {
            assert!((x - 0.7).abs() < 1e-12, "uniform U drifted to {x}");
        }
    }

    #[test]
    fn perturbation_spreads_to_neighbours() {
        let mut grid = make_grid(8);
        {
            let (u, _) = grid.halo_buffers();
            u.fill(0.0);
        }
        let centre = grid.index(4, 4, 4);
        {
            let (u, _) = grid.halo_buffers();
            u[centre] = 1.0;
        }
        fill_ghosts(&mut grid);

        let gs = GrayScott::new(params(0.2, 0.0, 0.0, 0.0)).unwrap();
        gs.advance(&mut grid);

        assert!(grid.u()[centre] < 1.0, "centre should lose mass");
        for idx in [
            grid.index(3, 4, 4),
            grid.index(5, 4, 4),
            grid.index(4, 3, 4),
            grid.index(4, 5, 4),
            grid.index(4, 4, 3),
            grid.index(4, 4, 5),
        ] {
            assert!(grid.u()[idx] > 0.0, "neighbour at {idx} should gain mass");
        }
    }

    #[test]
    fn diffusion_conserves_mass_for_z_uniform_fields() {
        // A field constant along Z carries no flux through the zero-flux
        // faces, so diffusion alone must conserve the global sum.
        let mut grid = make_grid(8);
        let layout = *grid.layout();
        {
            let (u, v) = grid.halo_buffers();
            for lz in 0..layout.local_nz() + 2 {
                for ly in 0..layout.ny() {
                    for lx in 0..layout.nx() {
                        let idx = layout.index(lz, ly, lx);
                        u[idx] = 0.25 + 0.5 * ((ly * 8 + lx) as f64 / 64.0);
                        v[idx] = 0.0;
                    }
                }
            }
        }

        let interior = layout.plane()..layout.plane() + layout.interior_len();
        let sum_before: f64 = grid.u()[interior.clone()].iter().sum();

        let gs = GrayScott::new(params(0.2, 0.1, 0.0, 0.0)).unwrap();
        for _ in 0..10 {
            fill_ghosts(&mut grid);
            gs.advance(&mut grid);
        }

        let sum_after: f64 = grid.u()[interior].iter().sum();
        assert!(
            (sum_before - sum_after).abs() < 1e-9,
            "mass drifted: {sum_before} -> {sum_after}"
        );
    }

    #[test]
    fn fields_stay_within_unit_interval() {
        // Default (pattern-forming) parameters over many steps never leave
        // [0, 1] on any owned cell.
        let mut grid = make_grid(12);
        let gs = GrayScott::new(Params::default()).unwrap();
        for _ in 0..50 {
            fill_ghosts(&mut grid);
            gs.advance(&mut grid);
        }
        let plane = grid.layout().plane();
        let interior = plane..plane + grid.layout().interior_len();
        for (&u, &v) in grid.u()[interior.clone()]
            .iter()
            .zip(&grid.v()[interior])
        {
            assert!((0.0..=1.0).contains(&u), "U out of range: {u}");
            assert!((0.0..=1.0).contains(&v), "V out of range: {v}");
        }
    }
}
