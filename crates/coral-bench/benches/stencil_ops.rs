//! Criterion micro-benchmarks for the integrator hot path.

use coral_bench::{fill_ghosts, reference_params, seeded_grid};
use coral_stencil::GrayScott;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// One full integrator pass over a 64-cubed subvolume.
fn bench_advance_64(c: &mut Criterion) {
    let integrator = GrayScott::new(reference_params()).unwrap();
    let mut grid = seeded_grid(64);

    c.bench_function("advance_64cubed", |b| {
        b.iter(|| {
            fill_ghosts(&mut grid);
            integrator.advance(&mut grid);
            black_box(&grid);
        });
    });
}

/// Ghost-stripped snapshot extraction, the per-emission copy.
fn bench_interior_snapshot_64(c: &mut Criterion) {
    let grid = seeded_grid(64);

    c.bench_function("interior_snapshot_64cubed", |b| {
        b.iter(|| {
            let u = grid.interior_u();
            black_box(u);
        });
    });
}

criterion_group!(benches, bench_advance_64, bench_interior_snapshot_64);
criterion_main!(benches);
