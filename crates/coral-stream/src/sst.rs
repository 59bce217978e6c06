//! Socket stream engine with rendezvous contact files.
//!
//! The writer binds a TCP listener, advertises it through a contact file,
//! and blocks until the configured number of readers attach (bounded by
//! the open timeout; expiry is fatal). Committed steps are encoded once
//! and pushed onto a bounded queue drained by a dedicated sender thread;
//! a full queue is the backpressure signal that stalls the committing
//! group. The stream ends with an explicit end-of-stream frame, so a
//! socket that dies without one is reported as a broken connection rather
//! than a clean finish.

use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::collective::{RawSink, RawSource};
use crate::config::{QueueFullPolicy, StreamConfig};
use crate::contact::{read_connection_string, write_contact_file};
use crate::error::StreamError;
use crate::variable::StepRecord;
use crate::wire::{decode_step, encode_step, FRAME_END, FRAME_STEP};

const ACCEPT_POLL: Duration = Duration::from_millis(50);
const CONTACT_POLL: Duration = Duration::from_millis(100);

/// Writer side of the socket stream.
pub struct SstOut {
    queue: Option<Sender<Vec<u8>>>,
    policy: QueueFullPolicy,
    sender: Option<JoinHandle<Result<(), StreamError>>>,
    contact: PathBuf,
}

impl SstOut {
    /// Bind a listener, write the contact file, and wait for rendezvous.
    ///
    /// Returns once `rendezvous_reader_count` readers have attached.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the configuration is invalid, the listener or
    /// contact file cannot be created, or the rendezvous does not complete
    /// within `open_timeout`.
    pub fn open(contact: &Path, config: &StreamConfig) -> Result<Self, StreamError> {
        config.validate()?;

        let listener = TcpListener::bind(("0.0.0.0", 0))?;
        let port = listener.local_addr()?.port();
        let connection = format!("127.0.0.1:{port}");
        write_contact_file(contact, &connection)?;
        info!(contact = %contact.display(), %connection, "stream writer listening");

        listener.set_nonblocking(true)?;
        let deadline = Instant::now() + config.open_timeout;
        let mut readers = Vec::with_capacity(config.rendezvous_reader_count as usize);
        while readers.len() < config.rendezvous_reader_count as usize {
            match listener.accept() {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(false)?;
                    let _ = stream.set_nodelay(true);
                    info!(reader = %addr, "reader attached");
                    readers.push(stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(StreamError::OpenTimeout {
                            seconds: config.open_timeout.as_secs(),
                        });
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let (tx, rx) = bounded::<Vec<u8>>(config.queue_limit);
        let sender = thread::spawn(move || sender_loop(readers, rx));

        Ok(Self {
            queue: Some(tx),
            policy: config.queue_full_policy,
            sender: Some(sender),
            contact: contact.to_path_buf(),
        })
    }

    /// Path of the contact file this writer advertised.
    pub fn contact(&self) -> &Path {
        &self.contact
    }
}

fn sender_loop(
    mut readers: Vec<TcpStream>,
    rx: Receiver<Vec<u8>>,
) -> Result<(), StreamError> {
    for frame in rx.iter() {
        for reader in &mut readers {
            reader.write_all(&frame).map_err(|e| {
                StreamError::ConnectionLost {
                    detail: format!("step write failed: {e}"),
                }
            })?;
        }
        debug!(bytes = frame.len(), "step frame sent");
    }
    // Queue closed: announce end of stream.
    for reader in &mut readers {
        reader
            .write_all(&[FRAME_END])
            .and_then(|()| reader.flush())
            .map_err(|e| StreamError::ConnectionLost {
                detail: format!("end-of-stream write failed: {e}"),
            })?;
        let _ = reader.shutdown(Shutdown::Write);
    }
    Ok(())
}

impl RawSink for SstOut {
    fn write_step(&mut self, step: StepRecord) -> Result<(), StreamError> {
        let queue = self.queue.as_ref().ok_or(StreamError::InvalidState {
            detail: "write after close".into(),
        })?;
        let mut frame = vec![FRAME_STEP];
        encode_step(&mut frame, &step)?;

        match self.policy {
            QueueFullPolicy::Block => {
                // Blocks while the queue holds `queue_limit` undelivered
                // steps; this stall is the flow-control contract.
                queue.send(frame).map_err(|_| StreamError::ConnectionLost {
                    detail: "sender thread is gone".into(),
                })
            }
            QueueFullPolicy::Discard => match queue.try_send(frame) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    warn!(index = step.index, "outbound queue full, step discarded");
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err(StreamError::ConnectionLost {
                    detail: "sender thread is gone".into(),
                }),
            },
        }
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        // Closing the queue lets the sender drain and emit end-of-stream.
        drop(self.queue.take());
        match self.sender.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(StreamError::ConnectionLost {
                    detail: "sender thread panicked".into(),
                }),
            },
            None => Ok(()),
        }
    }
}

/// Reader side of the socket stream.
pub struct SstIn {
    stream: BufReader<TcpStream>,
}

impl SstIn {
    /// Wait for the contact file, connect, and return the attached reader.
    ///
    /// The contact file may not exist yet (the consumer is often launched
    /// first); it is polled until `open_timeout` expires.
    ///
    /// # Errors
    ///
    /// Returns `Err` on an invalid configuration, a malformed contact
    /// file, or when discovery plus connect exceeds the timeout.
    pub fn open(contact: &Path, config: &StreamConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let deadline = Instant::now() + config.open_timeout;

        let connection = loop {
            match read_connection_string(contact) {
                Ok(conn) => break conn,
                Err(StreamError::InvalidContact { .. }) if Instant::now() < deadline => {
                    // Written halfway; retry.
                    thread::sleep(CONTACT_POLL);
                }
                Err(StreamError::Io { .. }) if Instant::now() < deadline => {
                    thread::sleep(CONTACT_POLL);
                }
                Err(StreamError::InvalidContact { detail }) => {
                    return Err(StreamError::InvalidContact { detail })
                }
                Err(_) => {
                    return Err(StreamError::OpenTimeout {
                        seconds: config.open_timeout.as_secs(),
                    })
                }
            }
        };

        let stream = loop {
            match TcpStream::connect(&connection) {
                Ok(stream) => break stream,
                Err(_) if Instant::now() < deadline => thread::sleep(CONTACT_POLL),
                Err(e) => {
                    return Err(StreamError::ConnectionLost {
                        detail: format!("connect to {connection} failed: {e}"),
                    })
                }
            }
        };
        let _ = stream.set_nodelay(true);
        info!(%connection, "attached to stream writer");

        Ok(Self {
            stream: BufReader::new(stream),
        })
    }
}

impl RawSource for SstIn {
    fn next_step(&mut self) -> Result<Option<StepRecord>, StreamError> {
        let mut kind = [0u8; 1];
        self.stream
            .read_exact(&mut kind)
            .map_err(|e| StreamError::ConnectionLost {
                detail: format!("stream ended without end-of-stream frame: {e}"),
            })?;
        match kind[0] {
            FRAME_END => Ok(None),
            FRAME_STEP => match decode_step(&mut self.stream)? {
                Some(step) => Ok(Some(step)),
                None => Err(StreamError::ConnectionLost {
                    detail: "stream truncated inside a step frame".into(),
                }),
            },
            other => Err(StreamError::Malformed {
                detail: format!("unknown frame kind {other}"),
            }),
        }
    }

    fn close(&mut self) -> Result<(), StreamError> {
        let _ = self.stream.get_ref().shutdown(Shutdown::Both);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::{VarData, VarRecord};
    use coral_test_utils::{patterned_volume, temp_path};
    use smallvec::smallvec;

    fn short_timeout() -> StreamConfig {
        StreamConfig {
            open_timeout: Duration::from_millis(300),
            ..StreamConfig::default()
        }
    }

    fn volume_step(index: u64) -> StepRecord {
        let mut step = StepRecord::new(index);
        step.vars.insert(
            "U".into(),
            VarRecord {
                dims: smallvec![8, 8, 8],
                data: VarData::F64(patterned_volume(512, index)),
            },
        );
        step
    }

    #[test]
    fn steps_round_trip_over_loopback() {
        let contact = temp_path("sst-roundtrip").with_extension("sst");
        let config = StreamConfig {
            open_timeout: Duration::from_secs(10),
            ..StreamConfig::default()
        };

        let producer = {
            let contact = contact.clone();
            thread::spawn(move || {
                let mut out = SstOut::open(&contact, &config).unwrap();
                for i in 0..4 {
                    out.write_step(volume_step(i)).unwrap();
                }
                out.finish().unwrap();
            })
        };

        let mut reader = SstIn::open(&contact, &config).unwrap();
        for i in 0..4 {
            let step = reader.next_step().unwrap().unwrap();
            assert_eq!(step, volume_step(i));
        }
        assert!(reader.next_step().unwrap().is_none());
        reader.close().unwrap();
        producer.join().unwrap();
        std::fs::remove_file(&contact).unwrap();
    }

    #[test]
    fn writer_rendezvous_times_out_without_reader() {
        let contact = temp_path("sst-timeout").with_extension("sst");
        let begin = Instant::now();
        let result = SstOut::open(&contact, &short_timeout());
        assert!(matches!(result, Err(StreamError::OpenTimeout { .. })));
        assert!(
            begin.elapsed() < Duration::from_secs(3),
            "timeout took {:?}",
            begin.elapsed()
        );
        let _ = std::fs::remove_file(&contact);
    }

    #[test]
    fn reader_times_out_without_contact_file() {
        let contact = temp_path("sst-nofile").with_extension("sst");
        let result = SstIn::open(&contact, &short_timeout());
        assert!(matches!(result, Err(StreamError::OpenTimeout { .. })));
    }

    #[test]
    fn discard_policy_never_blocks() {
        let contact = temp_path("sst-discard").with_extension("sst");
        let config = StreamConfig {
            open_timeout: Duration::from_secs(10),
            queue_limit: 1,
            queue_full_policy: QueueFullPolicy::Discard,
            ..StreamConfig::default()
        };

        let producer = {
            let contact = contact.clone();
            thread::spawn(move || {
                let mut out = SstOut::open(&contact, &config).unwrap();
                for i in 0..16 {
                    out.write_step(volume_step(i)).unwrap();
                }
                out.finish().unwrap();
            })
        };

        let mut reader = SstIn::open(&contact, &config).unwrap();
        // Whatever arrives must be in order, ending with a clean finish.
        let mut last = None;
        while let Some(step) = reader.next_step().unwrap() {
            if let Some(prev) = last {
                assert!(step.index > prev, "reordered: {prev} then {}", step.index);
            }
            last = Some(step.index);
        }
        producer.join().unwrap();
        std::fs::remove_file(&contact).unwrap();
    }
}
