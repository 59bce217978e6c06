//! Stream engine configuration.
//!
//! The socket engine depends on exactly six knobs, enumerated in one
//! record rather than scattered key/value pairs.

use std::fmt;
use std::time::Duration;

use crate::error::StreamError;

/// What the writer does when the outbound step queue is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueFullPolicy {
    /// Block the committing participant until the consumer drains a step.
    /// This is the flow-control mechanism; the stall propagates through
    /// the driver without retries or drops.
    Block,
    /// Drop the step being committed.
    Discard,
}

/// Byte transport for data and control traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// Plain TCP sockets.
    Sockets,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sockets => write!(f, "sockets"),
        }
    }
}

/// Marshalling scheme for step payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marshal {
    /// The archive framing of [`crate::wire`], shared with the file
    /// engine so relayed bytes round-trip unchanged.
    Bp5,
}

impl fmt::Display for Marshal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bp5 => write!(f, "BP5"),
        }
    }
}

/// The socket stream engine's configuration record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Readers that must attach before the writer's open returns.
    pub rendezvous_reader_count: u32,
    /// Capacity of the bounded outbound step queue.
    pub queue_limit: usize,
    /// Behaviour when the outbound queue is full.
    pub queue_full_policy: QueueFullPolicy,
    /// Bound on rendezvous (writer) and contact-file discovery plus
    /// connect (reader). Expiry is fatal.
    pub open_timeout: Duration,
    /// Transport for step payloads.
    pub data_transport: Transport,
    /// Transport for the rendezvous/control channel.
    pub control_transport: Transport,
    /// Payload marshalling scheme.
    pub marshal: Marshal,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            rendezvous_reader_count: 1,
            queue_limit: 5,
            queue_full_policy: QueueFullPolicy::Block,
            open_timeout: Duration::from_secs(300),
            data_transport: Transport::Sockets,
            control_transport: Transport::Sockets,
            marshal: Marshal::Bp5,
        }
    }
}

impl StreamConfig {
    /// Validate the record.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the reader count or queue limit is zero, or the
    /// open timeout is zero.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.rendezvous_reader_count == 0 {
            return Err(StreamError::InvalidConfig {
                reason: "rendezvous_reader_count must be >= 1".into(),
            });
        }
        if self.queue_limit == 0 {
            return Err(StreamError::InvalidConfig {
                reason: "queue_limit must be >= 1".into(),
            });
        }
        if self.open_timeout.is_zero() {
            return Err(StreamError::InvalidConfig {
                reason: "open_timeout must be non-zero".into(),
            });
        }
        Ok(())
    }
}
