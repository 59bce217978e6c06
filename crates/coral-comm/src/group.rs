//! Participant groups over a full channel mesh.
//!
//! Links are unbounded channels, so sends never block and the paired
//! exchange pattern (everyone sends, then everyone receives) cannot
//! deadlock. Receives block until the peer's message arrives.

use std::sync::{Arc, Barrier};

use crossbeam_channel::{unbounded, Receiver, Sender};

use coral_core::Rank;

use crate::error::CommError;

/// A message on a point-to-point link.
enum Message {
    /// A tagged plane of field data (halo traffic).
    Plane {
        /// Direction/field tag; verified on receipt.
        tag: u16,
        /// Packed plane, `ny * nx` cells.
        data: Vec<f64>,
    },
    /// A partial sum travelling to the root during a reduction.
    Partial(f64),
}

/// One participant's endpoint into the group.
///
/// Cheap to move, not cloneable: each participant owns exactly one.
pub struct Communicator {
    rank: Rank,
    ranks: u32,
    /// `senders[to]`; `None` at this participant's own slot.
    senders: Vec<Option<Sender<Message>>>,
    /// `receivers[from]`; `None` at this participant's own slot.
    receivers: Vec<Option<Receiver<Message>>>,
    barrier: Arc<Barrier>,
}

impl Communicator {
    /// This participant's rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Group size.
    pub fn ranks(&self) -> u32 {
        self.ranks
    }

    /// Paired blocking exchange.
    ///
    /// Sends `payload` to `send_to` (if given), then receives one message
    /// from `recv_from` (if given) and returns its data. The send completes
    /// immediately on the unbounded link; the receive blocks until the
    /// peer's message arrives. Either side may be absent, which models the
    /// domain-edge participants that have no neighbour in one direction.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the peer is gone or the delivered message does not
    /// carry the expected `tag`.
    pub fn send_recv(
        &self,
        send_to: Option<Rank>,
        payload: &[f64],
        recv_from: Option<Rank>,
        tag: u16,
    ) -> Result<Option<Vec<f64>>, CommError> {
        if let Some(to) = send_to {
            self.sender(to)?
                .send(Message::Plane {
                    tag,
                    data: payload.to_vec(),
                })
                .map_err(|_| CommError::Disconnected { peer: to.0 })?;
        }
        let Some(from) = recv_from else {
            return Ok(None);
        };
        match self.receiver(from)?.recv() {
            Ok(Message::Plane { tag: got, data }) if got == tag => Ok(Some(data)),
            Ok(Message::Plane { tag: got, .. }) => Err(CommError::TagMismatch {
                expected: tag,
                got,
                from: from.0,
            }),
            Ok(Message::Partial(_)) => Err(CommError::Protocol {
                detail: format!("partial sum from rank {from} during plane exchange"),
            }),
            Err(_) => Err(CommError::Disconnected { peer: from.0 }),
        }
    }

    /// Block until every participant has reached the barrier.
    pub fn barrier(&self) {
        self.barrier.wait();
    }

    /// Sum `value` across the group, delivering the total to rank 0.
    ///
    /// Returns `Some(total)` on rank 0 and `None` elsewhere. Partial sums
    /// are accumulated in rank order, so the result is deterministic.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a peer is gone or sends something other than its
    /// partial sum.
    pub fn reduce_sum(&self, value: f64) -> Result<Option<f64>, CommError> {
        if !self.rank.is_root() {
            self.sender(Rank(0))?
                .send(Message::Partial(value))
                .map_err(|_| CommError::Disconnected { peer: 0 })?;
            return Ok(None);
        }
        let mut total = value;
        for from in 1..self.ranks {
            match self.receiver(Rank(from))?.recv() {
                Ok(Message::Partial(x)) => total += x,
                Ok(Message::Plane { tag, .. }) => {
                    return Err(CommError::Protocol {
                        detail: format!("plane (tag {tag}) from rank {from} during reduction"),
                    })
                }
                Err(_) => return Err(CommError::Disconnected { peer: from }),
            }
        }
        Ok(Some(total))
    }

    fn sender(&self, to: Rank) -> Result<&Sender<Message>, CommError> {
        self.senders
            .get(to.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(CommError::Disconnected { peer: to.0 })
    }

    fn receiver(&self, from: Rank) -> Result<&Receiver<Message>, CommError> {
        self.receivers
            .get(from.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(CommError::Disconnected { peer: from.0 })
    }
}

/// Builder and runner for SPMD participant groups.
pub struct Group;

impl Group {
    /// Build the endpoints for a group of `ranks` participants.
    ///
    /// Returned in rank order. Mostly useful for tests that drive
    /// participants manually; production code uses [`Group::run`].
    pub fn communicators(ranks: u32) -> Vec<Communicator> {
        let n = ranks as usize;
        let barrier = Arc::new(Barrier::new(n));

        let mut senders: Vec<Vec<Option<Sender<Message>>>> = (0..n)
            .map(|_| (0..n).map(|_| None).collect())
            .collect();
        let mut receivers: Vec<Vec<Option<Receiver<Message>>>> = (0..n)
            .map(|_| (0..n).map(|_| None).collect())
            .collect();

        for from in 0..n {
            for to in 0..n {
                if from != to {
                    let (tx, rx) = unbounded();
                    senders[from][to] = Some(tx);
                    receivers[to][from] = Some(rx);
                }
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| Communicator {
                rank: Rank(rank as u32),
                ranks,
                senders,
                receivers,
                barrier: Arc::clone(&barrier),
            })
            .collect()
    }

    /// Run `f` once per participant on scoped threads and collect the
    /// results in rank order.
    ///
    /// A panicking participant takes the whole group down: the panic is
    /// resumed on the caller's thread once the scope unwinds, which is the
    /// process-abort semantics the protocol requires.
    pub fn run<T, F>(ranks: u32, f: F) -> Vec<T>
    where
        F: Fn(Communicator) -> T + Sync,
        T: Send,
    {
        let comms = Self::communicators(ranks);
        std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(|| f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(value) => value,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }
}
