//! Initial perturbation deposit.
//!
//! The uniform (U = 1, V = 0) background is unstable to a localized
//! disturbance; a cube of altered concentration at the domain centre kicks
//! off pattern growth. The deposit is fully deterministic, so repeated runs
//! with identical extents produce bit-identical initial states.

use crate::grid::GridLayout;

/// Deposit the centre-cube perturbation into ghost-padded U and V buffers.
///
/// The cube is centred on `(nz/2, ny/2, nx/2)` with L∞ radius
/// `min(nz, ny, nx) / 10` (integer division; a radius of zero still marks
/// the single centre cell). Owned cells inside the cube are set to
/// `U = 0.5`, `V = 0.25`; everything else is left untouched.
pub fn deposit(layout: &GridLayout, u: &mut [f64], v: &mut [f64]) {
    let cz = layout.global_nz() / 2;
    let cy = layout.ny() / 2;
    let cx = layout.nx() / 2;
    let radius = layout.global_nz().min(layout.ny()).min(layout.nx()) / 10;

    let within = |a: usize, c: usize| a.abs_diff(c) <= radius;

    for lz in 0..layout.local_nz() {
        let gz = layout.z_start() + lz;
        if !within(gz, cz) {
            continue;
        }
        for ly in 0..layout.ny() {
            if !within(ly, cy) {
                continue;
            }
            for lx in 0..layout.nx() {
                if within(lx, cx) {
                    // +1 skips the lower ghost plane.
                    let idx = layout.index(lz + 1, ly, lx);
                    u[idx] = 0.5;
                    v[idx] = 0.25;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coral_core::Rank;

    fn seeded(rank: u32, ranks: u32, n: usize) -> (GridLayout, Vec<f64>, Vec<f64>) {
        let layout = GridLayout::new(Rank(rank), ranks, n, n, n).unwrap();
        let mut u = vec![1.0; layout.padded_len()];
        let mut v = vec![0.0; layout.padded_len()];
        deposit(&layout, &mut u, &mut v);
        (layout, u, v)
    }

    #[test]
    fn centre_cell_is_perturbed() {
        let (layout, u, v) = seeded(0, 1, 16);
        let idx = layout.index(8 + 1, 8, 8);
        assert_eq!(u[idx], 0.5);
        assert_eq!(v[idx], 0.25);
    }

    #[test]
    fn cube_has_expected_volume() {
        let (_, u, _) = seeded(0, 1, 20);
        // radius = 20/10 = 2, so the cube spans 5 cells per axis.
        let perturbed = u.iter().filter(|&&x| x == 0.5).count();
        assert_eq!(perturbed, 5 * 5 * 5);
    }

    #[test]
    fn ghost_planes_are_untouched() {
        let (layout, u, v) = seeded(0, 1, 16);
        let plane = layout.plane();
        assert!(u[..plane].iter().all(|&x| x == 1.0));
        assert!(v[u.len() - plane..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn split_deposit_matches_single_participant() {
        // Concatenating the owned slabs of a 4-way split must equal the
        // single-participant deposit.
        let n = 16;
        let (whole_layout, whole_u, whole_v) = seeded(0, 1, n);
        let plane = whole_layout.plane();

        let mut stitched_u = Vec::new();
        let mut stitched_v = Vec::new();
        for rank in 0..4 {
            let (layout, u, v) = seeded(rank, 4, n);
            let lo = layout.plane();
            stitched_u.extend_from_slice(&u[lo..lo + layout.interior_len()]);
            stitched_v.extend_from_slice(&v[lo..lo + layout.interior_len()]);
        }

        assert_eq!(stitched_u, whole_u[plane..plane + n * plane].to_vec());
        assert_eq!(stitched_v, whole_v[plane..plane + n * plane].to_vec());
    }

    #[test]
    fn deposit_is_deterministic() {
        let (_, u1, v1) = seeded(0, 2, 16);
        let (_, u2, v2) = seeded(0, 2, 16);
        assert_eq!(u1, u2);
        assert_eq!(v1, v2);
    }
}
