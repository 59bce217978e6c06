//! Relay driver: replay an archived volume stream onto the transport.
//!
//! The relay discovers the global shape from the first input step and
//! forwards that same step — discovery is folded into the first loop
//! iteration rather than burning an input step in a prologue, so the
//! output stream carries every archived step. Progress past open is gated
//! by the transport's rendezvous (the writer's open blocks until the
//! consumer attaches) followed by a group barrier; there is no
//! interactive confirmation anywhere.

use std::time::Instant;

use tracing::{info, warn};

use coral_comm::Communicator;
use coral_core::Dims;
use coral_grid::partition;
use coral_stream::{
    ElementType, Selection, StepSink, StepSource, StepStatus, StreamError, VarHandle,
};

use crate::error::EngineError;
use crate::metrics::megabytes_f64;

/// Output declarations, fixed on the first input step.
struct RelayDecl {
    u: VarHandle,
    v: VarHandle,
    step: Option<VarHandle>,
    dims: Dims,
    slab: Selection,
}

/// What the relay group forwarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelaySummary {
    /// Steps forwarded to the transport.
    pub steps: u64,
}

/// Run the relay loop for one participant.
///
/// The first input step must carry a 3-D f64 variable "U"; its shape fixes
/// this participant's Z-slab and the output declarations for "U", "V"
/// (distributed) and "step" (scalar, rank 0). Per step, the slab
/// selections are read from the archive and forwarded through the writer;
/// end-step inherits the writer's backpressure. "V" and "step" are
/// forwarded when present and well-shaped, and skipped with a warning
/// otherwise.
///
/// # Errors
///
/// A missing or non-3-D "U" on the first step is fatal, as is any stream
/// or link failure.
pub fn run_relay<S: StepSource, K: StepSink>(
    comm: &Communicator,
    source: &S,
    sink: &K,
) -> Result<RelaySummary, EngineError> {
    // The writer side has already completed rendezvous; align the group
    // before touching the archive.
    comm.barrier();

    let mut decl: Option<RelayDecl> = None;
    let mut steps = 0u64;

    while source.begin_step()? == StepStatus::Ok {
        let begin = Instant::now();

        if decl.is_none() {
            decl = Some(declare_outputs(comm, source, sink)?);
        }
        let Some(d) = decl.as_ref() else {
            return Err(EngineError::Config {
                reason: "output declarations missing after first step".into(),
            });
        };

        sink.begin_step()?;
        let infos = source.variables()?;
        let mut local_elements = 0usize;

        for (name, handle) in [("U", &d.u), ("V", &d.v)] {
            let present = infos
                .iter()
                .any(|i| i.name == name && i.dims.as_slice() == d.dims.as_slice());
            if !present {
                warn!(step = steps, name, "variable absent or reshaped, skipped");
                continue;
            }
            let data = source.get_f64(name, &d.slab)?;
            local_elements += data.len();
            sink.put_f64(handle, &d.slab, &data)?;
        }

        if let Some(step_var) = &d.step {
            if infos.iter().any(|i| i.name == "step" && i.dims.is_empty()) {
                let value = source.get_scalar_i32("step")?;
                sink.put_scalar_i32(step_var, value)?;
            }
        }

        let total_mb = comm.reduce_sum(megabytes_f64(local_elements))?;
        source.end_step()?;
        sink.end_step()?;

        if let Some(megabytes) = total_mb {
            let seconds = begin.elapsed().as_secs_f64();
            info!(
                step = steps,
                seconds,
                megabytes,
                throughput = megabytes / seconds,
                "relayed step"
            );
        }
        steps += 1;
    }

    Ok(RelaySummary { steps })
}

/// Fix the slab and output declarations from the first input step.
fn declare_outputs<S: StepSource, K: StepSink>(
    comm: &Communicator,
    source: &S,
    sink: &K,
) -> Result<RelayDecl, EngineError> {
    let infos = source.variables()?;
    let u = infos
        .iter()
        .find(|i| i.name == "U")
        .ok_or(EngineError::Stream(StreamError::UnknownVariable {
            name: "U".into(),
        }))?;
    if u.dtype != ElementType::F64 || u.dims.len() != 3 {
        return Err(EngineError::Stream(StreamError::ShapeMismatch {
            name: "U".into(),
            detail: format!("relay needs a 3-d f64 volume, found {}-d {}", u.dims.len(), u.dtype),
        }));
    }

    let dims = u.dims.clone();
    let slab = partition(dims[0], comm.ranks(), comm.rank().0);
    let selection = Selection::new(&[slab.start, 0, 0], &[slab.count, dims[1], dims[2]]);

    Ok(RelayDecl {
        u: sink.define_f64("U", &dims)?,
        v: sink.define_f64("V", &dims)?,
        step: if comm.rank().is_root() {
            Some(sink.define_scalar_i32("step")?)
        } else {
            None
        },
        dims,
        slab: selection,
    })
}
