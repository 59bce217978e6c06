//! Collective wrappers over raw step engines.
//!
//! A raw engine moves whole [`StepRecord`]s: a [`RawSink`] accepts them,
//! a [`RawSource`] yields them. The collective wrappers let an SPMD group
//! share one engine: every participant holds a clone of the wrapper and
//! calls every operation; a barrier aligns the group and exactly one
//! leader touches the raw engine. Per-participant puts are assembled into
//! the global shape under a lock before the leader commits.
//!
//! Errors raised by the leader are sticky and cloned to every participant
//! at the next barrier crossing, so the whole group observes the same
//! failure and aborts together.

use std::sync::{Arc, Barrier, Mutex, MutexGuard};

use indexmap::IndexMap;

use coral_core::Dims;

use crate::error::StreamError;
use crate::selection::{copy_region, extract_region, shape_len, Selection};
use crate::variable::{ElementType, StepRecord, VarData, VarInfo, VarRecord};

/// Outcome of a consumer-side begin-step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// A step is open; variables may be fetched.
    Ok,
    /// The producer closed the stream; no step is open.
    EndOfStream,
}

/// A destination for fully assembled steps.
pub trait RawSink: Send {
    /// Accept one assembled step. May block (bounded queues are the
    /// backpressure mechanism).
    fn write_step(&mut self, step: StepRecord) -> Result<(), StreamError>;

    /// Flush and mark the stream finished.
    fn finish(&mut self) -> Result<(), StreamError>;
}

/// A source of fully assembled steps.
pub trait RawSource: Send {
    /// Yield the next step, or `None` at a clean end of stream. May block
    /// until the producer commits a step.
    fn next_step(&mut self) -> Result<Option<StepRecord>, StreamError>;

    /// Release the underlying resources.
    fn close(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

/// Handle to a defined variable, reused across steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarHandle {
    index: usize,
}

/// The sink contract consumed by the drivers.
///
/// All operations are collective across the owning participant group
/// except the defines and puts, which each participant issues for its own
/// slab (defines are idempotent so every rank may declare the shared
/// variables).
pub trait StepSink {
    /// Declare a distributed f64 array. Redeclaration with an identical
    /// shape returns the existing handle.
    fn define_f64(&self, name: &str, dims: &[usize]) -> Result<VarHandle, StreamError>;

    /// Declare an i32 scalar.
    fn define_scalar_i32(&self, name: &str) -> Result<VarHandle, StreamError>;

    /// Open a step. Collective.
    fn begin_step(&self) -> Result<(), StreamError>;

    /// Contribute one region of an array variable to the open step.
    fn put_f64(
        &self,
        var: &VarHandle,
        selection: &Selection,
        data: &[f64],
    ) -> Result<(), StreamError>;

    /// Contribute a scalar value to the open step.
    fn put_scalar_i32(&self, var: &VarHandle, value: i32) -> Result<(), StreamError>;

    /// Close the step and commit it. Collective; the single
    /// synchronization/transfer point, and the only call that may block on
    /// backpressure.
    fn end_step(&self) -> Result<(), StreamError>;

    /// Finish the stream. Collective.
    fn close(&self) -> Result<(), StreamError>;
}

/// The source contract consumed by the drivers.
pub trait StepSource {
    /// Wait for the next step (or end of stream). Collective.
    fn begin_step(&self) -> Result<StepStatus, StreamError>;

    /// Enumerate the variables of the open step, in declaration order.
    fn variables(&self) -> Result<Vec<VarInfo>, StreamError>;

    /// Fetch a region of an array variable.
    fn get_f64(&self, name: &str, selection: &Selection) -> Result<Vec<f64>, StreamError>;

    /// Fetch a scalar value.
    fn get_scalar_i32(&self, name: &str) -> Result<i32, StreamError>;

    /// Close the open step. Collective.
    fn end_step(&self) -> Result<(), StreamError>;

    /// Release the stream. Collective.
    fn close(&self) -> Result<(), StreamError>;
}

// ── Writer ──────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct VarDecl {
    name: String,
    dtype: ElementType,
    dims: Dims,
}

enum Pending {
    Array(Vec<f64>),
    Scalar(i32),
}

struct WriterState<S> {
    sink: S,
    decls: Vec<VarDecl>,
    by_name: IndexMap<String, usize>,
    pending: Vec<Option<Pending>>,
    in_step: bool,
    closed: bool,
    next_index: u64,
    fault: Option<StreamError>,
}

struct WriterShared<S> {
    gate: Barrier,
    state: Mutex<WriterState<S>>,
}

/// Group-shared writer over any [`RawSink`].
pub struct CollectiveWriter<S: RawSink> {
    shared: Arc<WriterShared<S>>,
}

impl<S: RawSink> Clone for CollectiveWriter<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: RawSink> CollectiveWriter<S> {
    /// Wrap a raw sink for a group of `ranks` participants.
    pub fn new(sink: S, ranks: u32) -> Self {
        Self {
            shared: Arc::new(WriterShared {
                gate: Barrier::new(ranks as usize),
                state: Mutex::new(WriterState {
                    sink,
                    decls: Vec::new(),
                    by_name: IndexMap::new(),
                    pending: Vec::new(),
                    in_step: false,
                    closed: false,
                    next_index: 0,
                    fault: None,
                }),
            }),
        }
    }

    /// Steps committed so far.
    pub fn steps_committed(&self) -> u64 {
        self.lock().next_index
    }

    fn lock(&self) -> MutexGuard<'_, WriterState<S>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn define(
        &self,
        name: &str,
        dtype: ElementType,
        dims: &[usize],
    ) -> Result<VarHandle, StreamError> {
        let mut state = self.lock();
        check_fault(&state.fault)?;
        if state.closed {
            return Err(StreamError::InvalidState {
                detail: format!("define '{name}' on a closed writer"),
            });
        }
        if let Some(&index) = state.by_name.get(name) {
            let decl = &state.decls[index];
            if decl.dtype == dtype && decl.dims.as_slice() == dims {
                return Ok(VarHandle { index });
            }
            return Err(StreamError::VariableRedefined {
                name: name.to_string(),
            });
        }
        shape_len(dims)?;
        let index = state.decls.len();
        state.decls.push(VarDecl {
            name: name.to_string(),
            dtype,
            dims: Dims::from_slice(dims),
        });
        state.by_name.insert(name.to_string(), index);
        state.pending.push(None);
        Ok(VarHandle { index })
    }
}

impl<S: RawSink> StepSink for CollectiveWriter<S> {
    fn define_f64(&self, name: &str, dims: &[usize]) -> Result<VarHandle, StreamError> {
        if dims.is_empty() {
            return Err(StreamError::ShapeMismatch {
                name: name.to_string(),
                detail: "arrays need at least one dimension".into(),
            });
        }
        self.define(name, ElementType::F64, dims)
    }

    fn define_scalar_i32(&self, name: &str) -> Result<VarHandle, StreamError> {
        self.define(name, ElementType::I32, &[])
    }

    fn begin_step(&self) -> Result<(), StreamError> {
        if self.shared.gate.wait().is_leader() {
            let mut state = self.lock();
            if state.fault.is_none() {
                if state.closed {
                    state.fault = Some(StreamError::InvalidState {
                        detail: "begin_step on a closed writer".into(),
                    });
                } else if state.in_step {
                    state.fault = Some(StreamError::InvalidState {
                        detail: "begin_step inside an open step".into(),
                    });
                } else {
                    for slot in &mut state.pending {
                        *slot = None;
                    }
                    state.in_step = true;
                }
            }
        }
        self.shared.gate.wait();
        check_fault(&self.lock().fault)
    }

    fn put_f64(
        &self,
        var: &VarHandle,
        selection: &Selection,
        data: &[f64],
    ) -> Result<(), StreamError> {
        let mut state = self.lock();
        check_fault(&state.fault)?;
        if !state.in_step {
            return Err(StreamError::InvalidState {
                detail: "put outside an open step".into(),
            });
        }
        let decl = state
            .decls
            .get(var.index)
            .ok_or_else(|| StreamError::UnknownVariable {
                name: format!("#{}", var.index),
            })?
            .clone();
        if decl.dtype != ElementType::F64 || decl.dims.is_empty() {
            return Err(StreamError::TypeMismatch {
                name: decl.name,
                want: decl.dtype,
                got: ElementType::F64,
            });
        }
        selection.validate(&decl.name, &decl.dims)?;
        let want = selection
            .element_count()
            .ok_or(StreamError::SizeOverflow)?;
        if data.len() != want {
            return Err(StreamError::InvalidSelection {
                name: decl.name,
                detail: format!("selection covers {want} cells, buffer has {}", data.len()),
            });
        }
        let total = shape_len(&decl.dims)?;
        let slot = &mut state.pending[var.index];
        if slot.is_none() {
            *slot = Some(Pending::Array(vec![0.0; total]));
        }
        match slot {
            Some(Pending::Array(global)) => {
                copy_region(global, &decl.dims, selection, data)?;
            }
            _ => unreachable!("array slot initialised above"),
        }
        Ok(())
    }

    fn put_scalar_i32(&self, var: &VarHandle, value: i32) -> Result<(), StreamError> {
        let mut state = self.lock();
        check_fault(&state.fault)?;
        if !state.in_step {
            return Err(StreamError::InvalidState {
                detail: "put outside an open step".into(),
            });
        }
        let decl = state
            .decls
            .get(var.index)
            .ok_or_else(|| StreamError::UnknownVariable {
                name: format!("#{}", var.index),
            })?
            .clone();
        if decl.dtype != ElementType::I32 || !decl.dims.is_empty() {
            return Err(StreamError::TypeMismatch {
                name: decl.name,
                want: decl.dtype,
                got: ElementType::I32,
            });
        }
        state.pending[var.index] = Some(Pending::Scalar(value));
        Ok(())
    }

    fn end_step(&self) -> Result<(), StreamError> {
        if self.shared.gate.wait().is_leader() {
            let mut state = self.lock();
            if state.fault.is_none() {
                if !state.in_step {
                    state.fault = Some(StreamError::InvalidState {
                        detail: "end_step without an open step".into(),
                    });
                } else {
                    let index = state.next_index;
                    let mut record = StepRecord::new(index);
                    for i in 0..state.decls.len() {
                        if let Some(pending) = state.pending[i].take() {
                            let decl = &state.decls[i];
                            let data = match pending {
                                Pending::Array(values) => VarData::F64(values),
                                Pending::Scalar(value) => VarData::I32(vec![value]),
                            };
                            record.vars.insert(
                                decl.name.clone(),
                                VarRecord {
                                    dims: decl.dims.clone(),
                                    data,
                                },
                            );
                        }
                    }
                    state.in_step = false;
                    // Commit; with a bounded queue behind the sink this is
                    // where backpressure stalls the group.
                    match state.sink.write_step(record) {
                        Ok(()) => state.next_index += 1,
                        Err(e) => state.fault = Some(e),
                    }
                }
            }
        }
        self.shared.gate.wait();
        check_fault(&self.lock().fault)
    }

    fn close(&self) -> Result<(), StreamError> {
        if self.shared.gate.wait().is_leader() {
            let mut state = self.lock();
            if state.fault.is_none() && !state.closed {
                if let Err(e) = state.sink.finish() {
                    state.fault = Some(e);
                }
                state.closed = true;
            }
        }
        self.shared.gate.wait();
        check_fault(&self.lock().fault)
    }
}

// ── Reader ──────────────────────────────────────────────────────

struct ReaderState<S> {
    source: S,
    current: Option<StepRecord>,
    finished: bool,
    closed: bool,
    fault: Option<StreamError>,
}

struct ReaderShared<S> {
    gate: Barrier,
    state: Mutex<ReaderState<S>>,
}

/// Group-shared reader over any [`RawSource`].
pub struct CollectiveReader<S: RawSource> {
    shared: Arc<ReaderShared<S>>,
}

impl<S: RawSource> Clone for CollectiveReader<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: RawSource> CollectiveReader<S> {
    /// Wrap a raw source for a group of `ranks` participants.
    pub fn new(source: S, ranks: u32) -> Self {
        Self {
            shared: Arc::new(ReaderShared {
                gate: Barrier::new(ranks as usize),
                state: Mutex::new(ReaderState {
                    source,
                    current: None,
                    finished: false,
                    closed: false,
                    fault: None,
                }),
            }),
        }
    }

    /// Step index of the open step.
    pub fn step_index(&self) -> Result<u64, StreamError> {
        let state = self.lock();
        check_fault(&state.fault)?;
        state
            .current
            .as_ref()
            .map(|s| s.index)
            .ok_or(StreamError::InvalidState {
                detail: "no step is open".into(),
            })
    }

    fn lock(&self) -> MutexGuard<'_, ReaderState<S>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: RawSource> StepSource for CollectiveReader<S> {
    fn begin_step(&self) -> Result<StepStatus, StreamError> {
        if self.shared.gate.wait().is_leader() {
            let mut state = self.lock();
            if state.fault.is_none() {
                if state.closed {
                    state.fault = Some(StreamError::InvalidState {
                        detail: "begin_step on a closed reader".into(),
                    });
                } else if !state.finished {
                    match state.source.next_step() {
                        Ok(Some(step)) => state.current = Some(step),
                        Ok(None) => {
                            state.current = None;
                            state.finished = true;
                        }
                        Err(e) => state.fault = Some(e),
                    }
                }
            }
        }
        self.shared.gate.wait();
        let state = self.lock();
        check_fault(&state.fault)?;
        if state.finished {
            Ok(StepStatus::EndOfStream)
        } else {
            Ok(StepStatus::Ok)
        }
    }

    fn variables(&self) -> Result<Vec<VarInfo>, StreamError> {
        let state = self.lock();
        check_fault(&state.fault)?;
        state
            .current
            .as_ref()
            .map(StepRecord::infos)
            .ok_or(StreamError::InvalidState {
                detail: "no step is open".into(),
            })
    }

    fn get_f64(&self, name: &str, selection: &Selection) -> Result<Vec<f64>, StreamError> {
        let state = self.lock();
        check_fault(&state.fault)?;
        let step = state.current.as_ref().ok_or(StreamError::InvalidState {
            detail: "no step is open".into(),
        })?;
        let rec = step
            .vars
            .get(name)
            .ok_or_else(|| StreamError::UnknownVariable {
                name: name.to_string(),
            })?;
        if rec.is_scalar() {
            return Err(StreamError::ShapeMismatch {
                name: name.to_string(),
                detail: "scalar accessed as array".into(),
            });
        }
        match &rec.data {
            VarData::F64(global) => extract_region(global, &rec.dims, selection),
            VarData::I32(_) => Err(StreamError::TypeMismatch {
                name: name.to_string(),
                want: ElementType::I32,
                got: ElementType::F64,
            }),
        }
    }

    fn get_scalar_i32(&self, name: &str) -> Result<i32, StreamError> {
        let state = self.lock();
        check_fault(&state.fault)?;
        let step = state.current.as_ref().ok_or(StreamError::InvalidState {
            detail: "no step is open".into(),
        })?;
        let rec = step
            .vars
            .get(name)
            .ok_or_else(|| StreamError::UnknownVariable {
                name: name.to_string(),
            })?;
        if !rec.is_scalar() {
            return Err(StreamError::ShapeMismatch {
                name: name.to_string(),
                detail: "array accessed as scalar".into(),
            });
        }
        match &rec.data {
            VarData::I32(values) => Ok(values[0]),
            VarData::F64(_) => Err(StreamError::TypeMismatch {
                name: name.to_string(),
                want: ElementType::F64,
                got: ElementType::I32,
            }),
        }
    }

    fn end_step(&self) -> Result<(), StreamError> {
        self.shared.gate.wait();
        check_fault(&self.lock().fault)
    }

    fn close(&self) -> Result<(), StreamError> {
        if self.shared.gate.wait().is_leader() {
            let mut state = self.lock();
            if !state.closed {
                if let Err(e) = state.source.close() {
                    if state.fault.is_none() {
                        state.fault = Some(e);
                    }
                }
                state.closed = true;
                state.current = None;
            }
        }
        self.shared.gate.wait();
        check_fault(&self.lock().fault)
    }
}

fn check_fault(fault: &Option<StreamError>) -> Result<(), StreamError> {
    match fault {
        Some(e) => Err(e.clone()),
        None => Ok(()),
    }
}
