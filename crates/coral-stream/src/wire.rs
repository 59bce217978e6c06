//! Binary encode/decode for archives and the socket stream.
//!
//! All integers are little-endian. Strings are length-prefixed with a
//! `u32`. The format is intentionally simple — no compression, no
//! alignment padding — and self-describing per step: every variable
//! carries its name, element type, and global shape.

use std::io::{Read, Write};

use coral_core::Dims;
use indexmap::IndexMap;

use crate::error::StreamError;
use crate::selection::shape_len;
use crate::variable::{ElementType, StepRecord, VarData, VarRecord};

/// Archive magic bytes.
pub const MAGIC: [u8; 4] = *b"CRLS";
/// Archive format version.
pub const FORMAT_VERSION: u8 = 1;

/// Socket frame kind: one step follows.
pub const FRAME_STEP: u8 = 1;
/// Socket frame kind: end of stream, nothing follows.
pub const FRAME_END: u8 = 0;

const DTYPE_F64: u8 = 0;
const DTYPE_I32: u8 = 1;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), StreamError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), StreamError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), StreamError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i32.
pub fn write_i32_le(w: &mut dyn Write, v: i32) -> Result<(), StreamError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), StreamError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), StreamError> {
    write_u32_le(w, s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, StreamError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, StreamError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, StreamError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian i32.
pub fn read_i32_le(r: &mut dyn Read) -> Result<i32, StreamError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, StreamError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, StreamError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| StreamError::Malformed {
        detail: format!("invalid UTF-8 variable name: {e}"),
    })
}

// ── Header encode/decode ────────────────────────────────────────

/// Write the archive header (magic + version).
pub fn encode_header(w: &mut dyn Write) -> Result<(), StreamError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    Ok(())
}

/// Read and validate the archive header.
pub fn decode_header(r: &mut dyn Read) -> Result<(), StreamError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(StreamError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(StreamError::UnsupportedVersion { found: version });
    }
    Ok(())
}

// ── Step encode/decode ──────────────────────────────────────────

/// Encode one step frame.
///
/// Layout: step index, variable count, then per variable: name, element
/// type, ndim (0 for scalars), dims, element count, raw payload.
pub fn encode_step(w: &mut dyn Write, step: &StepRecord) -> Result<(), StreamError> {
    write_u64_le(w, step.index)?;
    write_u32_le(w, step.vars.len() as u32)?;

    for (name, rec) in &step.vars {
        write_length_prefixed_str(w, name)?;
        let dtype = rec.data.dtype();
        write_u8(
            w,
            match dtype {
                ElementType::F64 => DTYPE_F64,
                ElementType::I32 => DTYPE_I32,
            },
        )?;
        write_u8(w, rec.dims.len() as u8)?;
        for &d in &rec.dims {
            write_u64_le(w, d as u64)?;
        }
        write_u64_le(w, rec.data.len() as u64)?;
        match &rec.data {
            VarData::F64(values) => {
                for &v in values {
                    write_f64_le(w, v)?;
                }
            }
            VarData::I32(values) => {
                for &v in values {
                    write_i32_le(w, v)?;
                }
            }
        }
    }
    Ok(())
}

/// Decode one step frame.
///
/// Returns `Ok(None)` on clean EOF (zero bytes before the step index),
/// `Ok(Some(step))` on success, and an error for truncated or inconsistent
/// data. A partial step index (1–7 bytes before EOF) is corruption, not a
/// clean end.
pub fn decode_step(r: &mut dyn Read) -> Result<Option<StepRecord>, StreamError> {
    let mut index_buf = [0u8; 8];
    let mut filled = 0;
    while filled < 8 {
        match r.read(&mut index_buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(StreamError::Malformed {
                    detail: format!("truncated step header: got {filled} of 8 bytes"),
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let index = u64::from_le_bytes(index_buf);

    let var_count = read_u32_le(r)? as usize;
    let mut vars = IndexMap::with_capacity(var_count);

    for _ in 0..var_count {
        let name = read_length_prefixed_str(r)?;
        let dtype = match read_u8(r)? {
            DTYPE_F64 => ElementType::F64,
            DTYPE_I32 => ElementType::I32,
            tag => {
                return Err(StreamError::Malformed {
                    detail: format!("unknown element type tag {tag} for '{name}'"),
                })
            }
        };
        let ndim = read_u8(r)? as usize;
        let mut dims = Dims::new();
        for _ in 0..ndim {
            let d = read_u64_le(r)?;
            dims.push(usize::try_from(d).map_err(|_| StreamError::SizeOverflow)?);
        }
        let count = usize::try_from(read_u64_le(r)?).map_err(|_| StreamError::SizeOverflow)?;

        let expected = if dims.is_empty() { 1 } else { shape_len(&dims)? };
        if count != expected {
            return Err(StreamError::Malformed {
                detail: format!(
                    "'{name}' carries {count} elements for a shape of {expected}"
                ),
            });
        }

        let data = match dtype {
            ElementType::F64 => {
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(read_f64_le(r)?);
                }
                VarData::F64(values)
            }
            ElementType::I32 => {
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(read_i32_le(r)?);
                }
                VarData::I32(values)
            }
        };

        if vars.insert(name.clone(), VarRecord { dims, data }).is_some() {
            return Err(StreamError::Malformed {
                detail: format!("variable '{name}' appears twice in one step"),
            });
        }
    }

    Ok(Some(StepRecord { index, vars }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use smallvec::smallvec;

    fn sample_step(index: u64) -> StepRecord {
        let mut step = StepRecord::new(index);
        step.vars.insert(
            "U".into(),
            VarRecord {
                dims: smallvec![2, 2, 2],
                data: VarData::F64((0..8).map(|i| i as f64 / 8.0).collect()),
            },
        );
        step.vars.insert(
            "step".into(),
            VarRecord {
                dims: Dims::new(),
                data: VarData::I32(vec![index as i32]),
            },
        );
        step
    }

    #[test]
    fn roundtrip_header() {
        let mut buf = Vec::new();
        encode_header(&mut buf).unwrap();
        decode_header(&mut buf.as_slice()).unwrap();
    }

    #[test]
    fn bad_magic_rejected() {
        let data = b"XRLS\x01";
        assert!(matches!(
            decode_header(&mut data.as_slice()),
            Err(StreamError::InvalidMagic)
        ));
    }

    #[test]
    fn bad_version_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(99);
        assert!(matches!(
            decode_header(&mut buf.as_slice()),
            Err(StreamError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn roundtrip_step() {
        let step = sample_step(7);
        let mut buf = Vec::new();
        encode_step(&mut buf, &step).unwrap();
        let got = decode_step(&mut buf.as_slice()).unwrap().unwrap();
        assert_eq!(step, got);
    }

    #[test]
    fn eof_between_steps_is_clean() {
        let buf: Vec<u8> = Vec::new();
        assert!(decode_step(&mut buf.as_slice()).unwrap().is_none());
    }

    #[test]
    fn partial_step_header_is_error_not_eof() {
        for partial in 1..=7 {
            let buf = vec![0xAAu8; partial];
            let err = decode_step(&mut buf.as_slice()).unwrap_err();
            assert!(
                matches!(&err, StreamError::Malformed { detail }
                    if detail.contains("truncated step header")),
                "wrong error for {partial}-byte header: {err:?}"
            );
        }
    }

    #[test]
    fn truncated_step_body_is_error() {
        let mut buf = Vec::new();
        encode_step(&mut buf, &sample_step(3)).unwrap();
        buf.truncate(buf.len() - 4);
        assert!(decode_step(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn inconsistent_element_count_rejected() {
        let mut buf = Vec::new();
        write_u64_le(&mut buf, 0).unwrap();
        write_u32_le(&mut buf, 1).unwrap();
        write_length_prefixed_str(&mut buf, "U").unwrap();
        write_u8(&mut buf, DTYPE_F64).unwrap();
        write_u8(&mut buf, 1).unwrap();
        write_u64_le(&mut buf, 4).unwrap(); // dim 4
        write_u64_le(&mut buf, 3).unwrap(); // but only 3 elements claimed
        let err = decode_step(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, StreamError::Malformed { .. }));
    }

    #[test]
    fn duplicate_variable_rejected() {
        let mut buf = Vec::new();
        write_u64_le(&mut buf, 0).unwrap();
        write_u32_le(&mut buf, 2).unwrap();
        for _ in 0..2 {
            write_length_prefixed_str(&mut buf, "U").unwrap();
            write_u8(&mut buf, DTYPE_I32).unwrap();
            write_u8(&mut buf, 0).unwrap();
            write_u64_le(&mut buf, 1).unwrap();
            write_i32_le(&mut buf, 9).unwrap();
        }
        let err = decode_step(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(&err, StreamError::Malformed { detail }
            if detail.contains("appears twice")));
    }

    proptest! {
        #[test]
        fn roundtrip_scalar_values(v in any::<i32>(), index in any::<u64>()) {
            let mut step = StepRecord::new(index);
            step.vars.insert(
                "step".into(),
                VarRecord { dims: Dims::new(), data: VarData::I32(vec![v]) },
            );
            let mut buf = Vec::new();
            encode_step(&mut buf, &step).unwrap();
            let got = decode_step(&mut buf.as_slice()).unwrap().unwrap();
            prop_assert_eq!(step, got);
        }

        #[test]
        fn roundtrip_f64_bit_patterns(bits in prop::collection::vec(any::<u64>(), 0..64)) {
            let values: Vec<f64> = bits.iter().map(|&b| f64::from_bits(b)).collect();
            let mut step = StepRecord::new(0);
            let len = values.len();
            step.vars.insert(
                "x".into(),
                VarRecord { dims: smallvec![len], data: VarData::F64(values.clone()) },
            );
            let mut buf = Vec::new();
            encode_step(&mut buf, &step).unwrap();
            let got = decode_step(&mut buf.as_slice()).unwrap().unwrap();
            let back = match &got.vars["x"].data {
                VarData::F64(v) => v,
                other => panic!("wrong dtype: {other:?}"),
            };
            for (a, b) in values.iter().zip(back) {
                prop_assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}
