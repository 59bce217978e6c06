//! Hyperslab selections and region copy/extract.
//!
//! A selection is a `(start, count)` pair per dimension. The system only
//! exercises first-axis slabs with full trailing dimensions, but the copy
//! routines handle arbitrary rectangular regions so the wire layer does
//! not constrain future tilings. All products and offsets use checked
//! arithmetic; overflow is fatal rather than wrapping.

use coral_core::Dims;
use smallvec::SmallVec;

use crate::error::StreamError;

/// A rectangular region of a multi-dimensional variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// First index along each dimension.
    pub start: Dims,
    /// Extent along each dimension.
    pub count: Dims,
}

impl Selection {
    /// Build a selection from per-dimension starts and counts.
    pub fn new(start: &[usize], count: &[usize]) -> Self {
        Self {
            start: Dims::from_slice(start),
            count: Dims::from_slice(count),
        }
    }

    /// The selection covering an entire shape.
    pub fn whole(dims: &[usize]) -> Self {
        Self {
            start: Dims::from_elem(0, dims.len()),
            count: Dims::from_slice(dims),
        }
    }

    /// Number of elements in the region, or `None` on overflow.
    pub fn element_count(&self) -> Option<usize> {
        self.count
            .iter()
            .try_fold(1usize, |acc, &c| acc.checked_mul(c))
    }

    /// Validate this selection against a global shape.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the dimensionality differs, any face reaches
    /// outside the shape, or a product overflows.
    pub fn validate(&self, name: &str, dims: &[usize]) -> Result<(), StreamError> {
        if self.start.len() != dims.len() || self.count.len() != dims.len() {
            return Err(StreamError::InvalidSelection {
                name: name.to_string(),
                detail: format!(
                    "selection is {}-d, variable is {}-d",
                    self.start.len(),
                    dims.len()
                ),
            });
        }
        for (axis, ((&s, &c), &d)) in self
            .start
            .iter()
            .zip(self.count.iter())
            .zip(dims.iter())
            .enumerate()
        {
            let end = s.checked_add(c).ok_or(StreamError::SizeOverflow)?;
            if end > d {
                return Err(StreamError::InvalidSelection {
                    name: name.to_string(),
                    detail: format!("axis {axis}: {s}+{c} exceeds extent {d}"),
                });
            }
        }
        self.element_count().ok_or(StreamError::SizeOverflow)?;
        Ok(())
    }
}

/// Number of elements in a shape, or an overflow error.
pub fn shape_len(dims: &[usize]) -> Result<usize, StreamError> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(StreamError::SizeOverflow)
}

/// Row-major strides of a shape.
fn strides(dims: &[usize]) -> SmallVec<[usize; 4]> {
    let mut out = SmallVec::from_elem(1, dims.len());
    for i in (0..dims.len().saturating_sub(1)).rev() {
        out[i] = out[i + 1] * dims[i + 1];
    }
    out
}

/// Visit the flat offset of each contiguous row of a region.
fn for_each_row(
    dims: &[usize],
    sel: &Selection,
    mut visit: impl FnMut(usize, usize),
) {
    let nd = dims.len();
    debug_assert!(nd > 0);
    let row = sel.count[nd - 1];
    if sel.count.iter().any(|&c| c == 0) {
        return;
    }
    let strides = strides(dims);
    let outer: usize = sel.count[..nd - 1].iter().product();
    let mut odo = vec![0usize; nd.saturating_sub(1)];
    let mut src_off = 0usize;
    for _ in 0..outer.max(1) {
        let mut dst_off = sel.start[nd - 1];
        for i in 0..nd - 1 {
            dst_off += (sel.start[i] + odo[i]) * strides[i];
        }
        visit(dst_off, src_off);
        src_off += row;
        // Advance the odometer over the outer dimensions.
        for i in (0..nd.saturating_sub(1)).rev() {
            odo[i] += 1;
            if odo[i] < sel.count[i] {
                break;
            }
            odo[i] = 0;
        }
    }
}

/// Copy a packed region into its place within a global buffer.
///
/// `src` holds the region row-major and packed; `dst` holds the full
/// global shape.
///
/// # Errors
///
/// Returns `Err` if the selection is invalid for `dims`, or either buffer
/// length disagrees with its shape.
pub fn copy_region(
    dst: &mut [f64],
    dims: &[usize],
    sel: &Selection,
    src: &[f64],
) -> Result<(), StreamError> {
    if dims.is_empty() {
        return Err(StreamError::InvalidSelection {
            name: String::new(),
            detail: "region operations need at least one dimension".into(),
        });
    }
    sel.validate("", dims)?;
    if dst.len() != shape_len(dims)? {
        return Err(StreamError::Malformed {
            detail: format!("global buffer holds {} of {} cells", dst.len(), shape_len(dims)?),
        });
    }
    let want = sel.element_count().ok_or(StreamError::SizeOverflow)?;
    if src.len() != want {
        return Err(StreamError::InvalidSelection {
            name: String::new(),
            detail: format!("region holds {} elements, buffer has {}", want, src.len()),
        });
    }
    let row = sel.count[dims.len() - 1];
    for_each_row(dims, sel, |dst_off, src_off| {
        dst[dst_off..dst_off + row].copy_from_slice(&src[src_off..src_off + row]);
    });
    Ok(())
}

/// Extract a region of a global buffer into a packed row-major vector.
///
/// # Errors
///
/// Returns `Err` under the same conditions as [`copy_region`].
pub fn extract_region(
    src: &[f64],
    dims: &[usize],
    sel: &Selection,
) -> Result<Vec<f64>, StreamError> {
    if dims.is_empty() {
        return Err(StreamError::InvalidSelection {
            name: String::new(),
            detail: "region operations need at least one dimension".into(),
        });
    }
    sel.validate("", dims)?;
    if src.len() != shape_len(dims)? {
        return Err(StreamError::Malformed {
            detail: format!("global buffer holds {} of {} cells", src.len(), shape_len(dims)?),
        });
    }
    let total = sel.element_count().ok_or(StreamError::SizeOverflow)?;
    let mut out = vec![0.0; total];
    let row = sel.count[dims.len() - 1];
    for_each_row(dims, sel, |src_off, dst_off| {
        out[dst_off..dst_off + row].copy_from_slice(&src[src_off..src_off + row]);
    });
    Ok(out)
}
