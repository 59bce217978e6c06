//! Rendezvous contact files.
//!
//! The writer advertises its listening endpoint through a small text file
//! next to the working directory: a fixed header line followed by the
//! opaque connection string. A consumer handed the connection string
//! out-of-band (pasted over a terminal, say) materializes the same file
//! locally before opening.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::StreamError;

/// Header line identifying a contact file.
pub const CONTACT_HEADER: &str = "#ADIOS2-SST v0";

/// Extension appended to contact names.
pub const CONTACT_EXTENSION: &str = "sst";

/// Resolve a contact name to its on-disk path (`<name>.sst`).
pub fn contact_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.{CONTACT_EXTENSION}"))
}

/// Whether a CLI argument is an inline connection string rather than a
/// contact name.
pub fn looks_like_connection_string(arg: &str) -> bool {
    arg.contains("0x") || arg.contains(':')
}

/// Write a contact file advertising `connection`.
pub fn write_contact_file(path: &Path, connection: &str) -> Result<(), StreamError> {
    fs::write(path, format!("{CONTACT_HEADER}\n{connection}\n"))?;
    Ok(())
}

/// Read the connection string out of a contact file.
///
/// # Errors
///
/// Returns `Err` if the file cannot be read, the header line is wrong, or
/// the connection string is missing.
pub fn read_connection_string(path: &Path) -> Result<String, StreamError> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();
    match lines.next() {
        Some(header) if header.trim_end() == CONTACT_HEADER => {}
        Some(header) => {
            return Err(StreamError::InvalidContact {
                detail: format!("unexpected header line '{header}'"),
            })
        }
        None => {
            return Err(StreamError::InvalidContact {
                detail: "empty contact file".into(),
            })
        }
    }
    match lines.next().map(str::trim) {
        Some(conn) if !conn.is_empty() => Ok(conn.to_string()),
        _ => Err(StreamError::InvalidContact {
            detail: "missing connection string".into(),
        }),
    }
}
