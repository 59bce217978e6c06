//! Variable metadata and in-memory step records.

use std::fmt;

use coral_core::Dims;
use indexmap::IndexMap;

/// Element type of a streamed variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    /// 64-bit IEEE float.
    F64,
    /// 32-bit signed integer.
    I32,
}

impl ElementType {
    /// Size of one element on the wire, in bytes.
    pub fn byte_len(self) -> usize {
        match self {
            Self::F64 => 8,
            Self::I32 => 4,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::F64 => write!(f, "f64"),
            Self::I32 => write!(f, "i32"),
        }
    }
}

/// Typed payload of one variable within one step.
#[derive(Clone, Debug, PartialEq)]
pub enum VarData {
    /// Float array (or nothing-to-say for scalars, which are I32 here).
    F64(Vec<f64>),
    /// Integer array; scalars are a single-element vector.
    I32(Vec<i32>),
}

impl VarData {
    /// Element count.
    pub fn len(&self) -> usize {
        match self {
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element type of this payload.
    pub fn dtype(&self) -> ElementType {
        match self {
            Self::F64(_) => ElementType::F64,
            Self::I32(_) => ElementType::I32,
        }
    }
}

/// One variable's contribution to a step: global shape plus assembled data.
#[derive(Clone, Debug, PartialEq)]
pub struct VarRecord {
    /// Global dimensions; empty for scalars.
    pub dims: Dims,
    /// Assembled payload covering the full global shape (or the single
    /// scalar element).
    pub data: VarData,
}

impl VarRecord {
    /// Whether this variable is a scalar.
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }
}

/// Declared metadata of a variable visible in the current step.
#[derive(Clone, Debug, PartialEq)]
pub struct VarInfo {
    /// Variable name.
    pub name: String,
    /// Element type.
    pub dtype: ElementType,
    /// Global dimensions; empty for scalars.
    pub dims: Dims,
}

/// One fully assembled step: an ordered set of named variables.
///
/// `IndexMap` keeps enumeration in declaration order, which keeps variable
/// discovery on the consumer deterministic.
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    /// Zero-based step index assigned by the emitting engine.
    pub index: u64,
    /// Variables present in this step.
    pub vars: IndexMap<String, VarRecord>,
}

impl StepRecord {
    /// An empty step with the given index.
    pub fn new(index: u64) -> Self {
        Self {
            index,
            vars: IndexMap::new(),
        }
    }

    /// Metadata for every variable in this step, in declaration order.
    pub fn infos(&self) -> Vec<VarInfo> {
        self.vars
            .iter()
            .map(|(name, rec)| VarInfo {
                name: name.clone(),
                dtype: rec.data.dtype(),
                dims: rec.dims.clone(),
            })
            .collect()
    }
}
