//! Simulation driver: integrate, and stream one step per output interval.

use std::time::Instant;

use tracing::info;

use coral_comm::{Communicator, HaloExchanger};
use coral_core::{Params, StepId};
use coral_grid::{Grid, GridLayout};
use coral_stencil::GrayScott;
use coral_stream::{Selection, StepSink};

use crate::error::EngineError;
use crate::metrics::megabytes_f64;

/// Producer-side run configuration.
#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    /// Global Z extent.
    pub nz: usize,
    /// Global Y extent.
    pub ny: usize,
    /// Global X extent.
    pub nx: usize,
    /// Number of integrator steps to run.
    pub total_steps: u64,
    /// Emit a streaming step every this many integrator steps.
    pub output_interval: u64,
    /// Gray–Scott parameters, identical on every participant.
    pub params: Params,
}

impl SimConfig {
    /// A cubic domain with default parameters.
    pub fn cubic(extent: usize, total_steps: u64, output_interval: u64) -> Self {
        Self {
            nz: extent,
            ny: extent,
            nx: extent,
            total_steps,
            output_interval,
            params: Params::default(),
        }
    }

    /// Validate the driver-level settings (the grid extents are checked by
    /// [`GridLayout::new`], the parameters by [`GrayScott::new`]).
    ///
    /// # Errors
    ///
    /// Returns `Err` if the output interval is zero.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.output_interval == 0 {
            return Err(EngineError::Config {
                reason: "output_interval must be >= 1".into(),
            });
        }
        Ok(())
    }
}

/// What one participant did over a producer run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimSummary {
    /// Streaming steps emitted.
    pub outputs: u64,
    /// Integrator steps executed.
    pub steps: u64,
}

/// Run the simulation loop for one participant.
///
/// Loop invariant: at the top of iteration `s` the grid holds the field
/// values of simulated step `s`. The body first emits (when `s` is on the
/// output cadence), then advances, so step 0 and the final step are both
/// emitted and the emission count is `total_steps / output_interval + 1`.
/// Emission and compute alternate on this thread; end-step may stall on
/// transport backpressure and that stall is deliberately not mitigated.
///
/// # Errors
///
/// Any grid, link, or stream failure aborts the run; nothing is retried.
pub fn run_simulation<S: StepSink>(
    comm: &Communicator,
    config: &SimConfig,
    sink: &S,
) -> Result<SimSummary, EngineError> {
    config.validate()?;
    let integrator = GrayScott::new(config.params)?;
    let layout = GridLayout::new(comm.rank(), comm.ranks(), config.nz, config.ny, config.nx)?;
    let mut grid = Grid::new(layout);
    let halo = HaloExchanger::new(&layout);

    let global = [config.nz, config.ny, config.nx];
    let u_var = sink.define_f64("U", &global)?;
    let v_var = sink.define_f64("V", &global)?;
    let step_var = if comm.rank().is_root() {
        Some(sink.define_scalar_i32("step")?)
    } else {
        None
    };
    let slab = Selection::new(
        &[layout.z_start(), 0, 0],
        &[layout.local_nz(), config.ny, config.nx],
    );

    let mut outputs = 0u64;
    for s in 0..=config.total_steps {
        if s % config.output_interval == 0 {
            let begin = Instant::now();
            sink.begin_step()?;

            let u = grid.interior_u();
            let v = grid.interior_v();
            let local_elements = u.len() + v.len();
            sink.put_f64(&u_var, &slab, &u)?;
            sink.put_f64(&v_var, &slab, &v)?;
            if let Some(var) = &step_var {
                let value = StepId(s).as_i32().ok_or_else(|| EngineError::Config {
                    reason: format!("step counter {s} exceeds the 32-bit wire range"),
                })?;
                sink.put_scalar_i32(var, value)?;
            }
            sink.end_step()?;

            let seconds = begin.elapsed().as_secs_f64();
            let total_mb = comm.reduce_sum(megabytes_f64(local_elements))?;
            if let Some(megabytes) = total_mb {
                info!(
                    step = s,
                    output = outputs,
                    seconds,
                    megabytes,
                    throughput = megabytes / seconds,
                    "streamed output step"
                );
            }
            outputs += 1;
        }

        if s < config.total_steps {
            halo.refresh(comm, &mut grid)?;
            integrator.advance(&mut grid);
        }
    }

    Ok(SimSummary {
        outputs,
        steps: config.total_steps,
    })
}
