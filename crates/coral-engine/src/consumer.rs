//! Consumer driver: receive steps, re-tile, persist, and measure.
//!
//! The consumer discovers the variable set from the first received step
//! and treats it as authoritative: sink variables are declared exactly
//! once, and variables appearing only in later steps are ignored. Each
//! non-scalar variable's first axis is partitioned across the consumer
//! group with the same base-plus-remainder scheme as the producer's
//! decomposition — the group sizes need not match, and re-tiling is
//! exactly why the selection model is worth having.

use std::time::Instant;

use indexmap::IndexMap;
use tracing::{info, warn};

use coral_comm::Communicator;
use coral_core::Dims;
use coral_grid::partition;
use coral_stream::selection::shape_len;
use coral_stream::{ElementType, Selection, StepSink, StepSource, StepStatus, VarHandle, VarInfo};

use crate::error::EngineError;
use crate::metrics::{megabytes_f64, TransferMetrics};

/// A sink variable declared from the first step.
struct DeclaredVar {
    handle: VarHandle,
    /// `Some(dims)` for arrays, `None` for scalars.
    dims: Option<Dims>,
}

/// What the consumer group received.
pub struct ConsumerSummary {
    /// Steps received before end-of-stream.
    pub steps: u64,
    /// Per-step metrics, populated on rank 0 only.
    pub metrics: Option<TransferMetrics>,
}

/// Run the receive loop for one participant.
///
/// Per step: enumerate variables, fetch this participant's first-axis slab
/// of every declared array (scalars on rank 0 only), forward everything to
/// the archive sink, and record timing on rank 0. Unusable variables —
/// scalar-shaped where an array is expected, changed shape, or absent from
/// a later step — are skipped for that step with a logged warning; all
/// other failures abort the group.
///
/// # Errors
///
/// Any stream or link failure is fatal; there is no resume of a partially
/// received step.
pub fn run_consumer<S: StepSource, K: StepSink>(
    comm: &Communicator,
    source: &S,
    sink: &K,
) -> Result<ConsumerSummary, EngineError> {
    let rank = comm.rank();
    let ranks = comm.ranks();
    let mut declared: Option<IndexMap<String, DeclaredVar>> = None;
    let mut metrics = rank.is_root().then(TransferMetrics::new);
    let mut steps = 0u64;

    while source.begin_step()? == StepStatus::Ok {
        let begin = Instant::now();
        sink.begin_step()?;
        let infos = source.variables()?;

        if declared.is_none() {
            declared = Some(declare_from_first_step(&infos, sink)?);
        }
        let Some(declared_set) = declared.as_ref() else {
            return Err(EngineError::Config {
                reason: "sink declarations missing after first step".into(),
            });
        };

        let mut global_elements = 0usize;
        for (name, var) in declared_set {
            let Some(info) = infos.iter().find(|i| &i.name == name) else {
                warn!(step = steps, %name, "declared variable absent, skipped");
                continue;
            };
            match &var.dims {
                Some(dims) => {
                    if info.dtype != ElementType::F64 || info.dims.as_slice() != dims.as_slice()
                    {
                        warn!(step = steps, %name, "variable no longer matches its declaration, skipped");
                        continue;
                    }
                    let slab = partition(dims[0], ranks, rank.0);
                    let mut start = vec![slab.start];
                    let mut count = vec![slab.count];
                    start.extend(std::iter::repeat(0).take(dims.len() - 1));
                    count.extend_from_slice(&dims[1..]);
                    let selection = Selection::new(&start, &count);

                    let data = source.get_f64(name, &selection)?;
                    sink.put_f64(&var.handle, &selection, &data)?;
                    global_elements += shape_len(dims)?;
                }
                None => {
                    if !info.dims.is_empty() || info.dtype != ElementType::I32 {
                        warn!(step = steps, %name, "variable no longer matches its declaration, skipped");
                        continue;
                    }
                    if rank.is_root() {
                        let value = source.get_scalar_i32(name)?;
                        sink.put_scalar_i32(&var.handle, value)?;
                    }
                }
            }
        }

        source.end_step()?;
        sink.end_step()?;

        if let Some(log) = metrics.as_mut() {
            let seconds = begin.elapsed().as_secs_f64();
            let megabytes = megabytes_f64(global_elements);
            log.record(seconds, megabytes);
            info!(
                step = steps,
                seconds,
                megabytes,
                throughput = megabytes / seconds,
                "received step"
            );
        }
        steps += 1;
    }

    Ok(ConsumerSummary { steps, metrics })
}

/// Declare sink variables from the authoritative first-step set.
fn declare_from_first_step<K: StepSink>(
    infos: &[VarInfo],
    sink: &K,
) -> Result<IndexMap<String, DeclaredVar>, EngineError> {
    let mut set = IndexMap::new();
    for info in infos {
        match (info.dtype, info.dims.is_empty()) {
            (ElementType::F64, false) => {
                let handle = sink.define_f64(&info.name, &info.dims)?;
                set.insert(
                    info.name.clone(),
                    DeclaredVar {
                        handle,
                        dims: Some(info.dims.clone()),
                    },
                );
            }
            (ElementType::I32, true) => {
                let handle = sink.define_scalar_i32(&info.name)?;
                set.insert(info.name.clone(), DeclaredVar { handle, dims: None });
            }
            _ => {
                warn!(name = %info.name, dtype = %info.dtype, "unsupported variable kind, ignored");
            }
        }
    }
    if set.is_empty() {
        warn!("first step carries no usable variables");
    }
    Ok(set)
}
