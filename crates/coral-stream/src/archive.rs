//! File-backed step archive.
//!
//! [`ArchiveWriter`] streams step frames to any `Write` sink; the header
//! is written on construction. [`ArchiveReader`] replays them from any
//! `Read` source, validating the header up front. Generic over the byte
//! stream so tests run against `Vec<u8>` while production uses buffered
//! files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::collective::{RawSink, RawSource};
use crate::error::StreamError;
use crate::variable::StepRecord;
use crate::wire::{decode_header, decode_step, encode_header, encode_step};

/// Writes step frames to a byte stream.
pub struct ArchiveWriter<W: Write + Send> {
    writer: W,
    steps_written: u64,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create an archive file at `path`, truncating any existing one.
    pub fn create(path: &Path) -> Result<Self, StreamError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write + Send> ArchiveWriter<W> {
    /// Wrap a byte sink, immediately writing the header.
    pub fn new(mut writer: W) -> Result<Self, StreamError> {
        encode_header(&mut writer)?;
        Ok(Self {
            writer,
            steps_written: 0,
        })
    }

    /// Steps written so far.
    pub fn steps_written(&self) -> u64 {
        self.steps_written
    }

    /// Consume the writer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RawSink for ArchiveWriter<W> {
    fn write_step(&mut self, step: StepRecord) -> Result<(), StreamError> {
        encode_step(&mut self.writer, &step)?;
        self.steps_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads step frames from a byte stream.
pub struct ArchiveReader<R: Read + Send> {
    reader: R,
    steps_read: u64,
}

impl ArchiveReader<BufReader<File>> {
    /// Open an archive file at `path`.
    pub fn open_path(path: &Path) -> Result<Self, StreamError> {
        let file = File::open(path)?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read + Send> ArchiveReader<R> {
    /// Wrap a byte source, reading and validating the header.
    pub fn open(mut reader: R) -> Result<Self, StreamError> {
        decode_header(&mut reader)?;
        Ok(Self {
            reader,
            steps_read: 0,
        })
    }

    /// Steps read so far.
    pub fn steps_read(&self) -> u64 {
        self.steps_read
    }
}

impl<R: Read + Send> RawSource for ArchiveReader<R> {
    fn next_step(&mut self) -> Result<Option<StepRecord>, StreamError> {
        let step = decode_step(&mut self.reader)?;
        if step.is_some() {
            self.steps_read += 1;
        }
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::{VarData, VarRecord};
    use coral_core::Dims;
    use coral_test_utils::{patterned_volume, temp_path};
    use smallvec::smallvec;

    fn volume_step(index: u64, seed: u64) -> StepRecord {
        let mut step = StepRecord::new(index);
        step.vars.insert(
            "U".into(),
            VarRecord {
                dims: smallvec![4, 4, 4],
                data: VarData::F64(patterned_volume(64, seed)),
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
    fn roundtrip_through_memory() {
        let mut buf = Vec::new();
        {
            let mut writer = ArchiveWriter::new(&mut buf).unwrap();
            for i in 0..3 {
                writer.write_step(volume_step(i, i)).unwrap();
            }
            writer.finish().unwrap();
            assert_eq!(writer.steps_written(), 3);
        }

        let mut reader = ArchiveReader::open(buf.as_slice()).unwrap();
        for i in 0..3 {
            let step = reader.next_step().unwrap().unwrap();
            assert_eq!(step, volume_step(i, i));
        }
        assert!(reader.next_step().unwrap().is_none());
        assert_eq!(reader.steps_read(), 3);
    }

    #[test]
    fn roundtrip_through_file() {
        let path = temp_path("archive");
        {
            let mut writer = ArchiveWriter::create(&path).unwrap();
            writer.write_step(volume_step(0, 9)).unwrap();
            writer.finish().unwrap();
        }
        let mut reader = ArchiveReader::open_path(&path).unwrap();
        assert_eq!(reader.next_step().unwrap().unwrap(), volume_step(0, 9));
        assert!(reader.next_step().unwrap().is_none());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn bad_magic_on_open() {
        let data = b"NOPE\x01";
        assert!(matches!(
            ArchiveReader::open(data.as_slice()),
            Err(StreamError::InvalidMagic)
        ));
    }

    #[test]
    fn truncated_archive_errors() {
        let mut buf = Vec::new();
        {
            let mut writer = ArchiveWriter::new(&mut buf).unwrap();
            writer.write_step(volume_step(0, 1)).unwrap();
        }
        buf.truncate(buf.len() - 7);
        let mut reader = ArchiveReader::open(buf.as_slice()).unwrap();
        assert!(reader.next_step().is_err());
    }
}
