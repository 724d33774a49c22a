//! Transmit state machine.
//!
//! Drives chunked, MTU-bounded delivery of the encoded transmit queue over
//! an unreliable, write-confirmed link:
//!
//! ```text
//!              Transmit                    SendFailed
//!   ┌──────┐ ──────────► ┌─────────┐ ───────────────► ┌──────────────┐
//!   │ Idle │             │ Sending │                   │ RetryWaiting │
//!   └──────┘ ◄────────── └─────────┘ ◄─────────────── └──────────────┘
//!          SendConfirmed            SendConfirmed / Nudge / Transmit
//!          (all drained)
//! ```
//!
//! Follow-up events produced by an action (the next chunk after a success
//! or a confirmation) go through an explicit event queue drained in a loop,
//! so they complete before the triggering call returns without growing the
//! call stack.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::core::{BoundedDeque, ProtocolError};

/// Transmit machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    /// Nothing pending or in flight.
    Idle,
    /// A send attempt is current.
    Sending,
    /// The last attempt failed; waiting for a retry trigger.
    RetryWaiting,
}

/// Chunk delivery mode.
///
/// An explicit enum rather than a zero-capacity sentinel: the mode changes
/// machine behavior, not just a buffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// One chunk at a time; sent bytes leave the queue as soon as the link
    /// accepts them. Confirmations drive transitions but never buffers.
    Synchronous,
    /// Up to `depth` chunks outstanding at once; bytes stay queued until
    /// the matching confirmation arrives.
    Pipelined {
        /// Maximum sent-but-unconfirmed chunks. Must be at least 1.
        depth: usize,
    },
}

impl PipelineMode {
    fn in_flight_capacity(self) -> usize {
        match self {
            Self::Synchronous => 0,
            Self::Pipelined { depth } => depth,
        }
    }

    fn is_pipelined(self) -> bool {
        matches!(self, Self::Pipelined { .. })
    }
}

/// Events the machine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxEvent {
    /// Attempt to send the next chunk.
    Transmit,
    /// The underlying send was rejected.
    SendFailed,
    /// The environment confirmed delivery of previously sent chunks.
    SendConfirmed(usize),
    /// Conditions may have changed; retry if anything is pending.
    Nudge,
    /// Drop everything and return to idle.
    Reset,
}

/// The transmit half of a session: queue, in-flight ledger, phase, and the
/// trampoline event queue.
#[derive(Debug)]
pub(crate) struct TxMachine {
    phase: TxPhase,
    mtu: usize,
    mode: PipelineMode,
    tx: BoundedDeque<u8>,
    in_flight: BoundedDeque<usize>,
    events: VecDeque<TxEvent>,
}

impl TxMachine {
    pub(crate) fn new(mtu: usize, tx_capacity: usize, mode: PipelineMode) -> Self {
        Self {
            phase: TxPhase::Idle,
            mtu,
            mode,
            tx: BoundedDeque::new(tx_capacity),
            in_flight: BoundedDeque::new(mode.in_flight_capacity()),
            events: VecDeque::new(),
        }
    }

    pub(crate) fn phase(&self) -> TxPhase {
        self.phase
    }

    /// Encoded bytes queued (confirmed-pending and unsent alike).
    pub(crate) fn queued_bytes(&self) -> usize {
        self.tx.len()
    }

    /// Chunks sent and awaiting confirmation.
    pub(crate) fn in_flight_chunks(&self) -> usize {
        self.in_flight.len()
    }

    /// Free transmit-queue space in bytes.
    pub(crate) fn free_capacity(&self) -> usize {
        self.tx.available()
    }

    /// Append already-encoded bytes, all-or-nothing.
    pub(crate) fn enqueue_encoded(&mut self, encoded: &[u8]) -> bool {
        self.tx.extend_back(encoded)
    }

    pub(crate) fn push_event(&mut self, event: TxEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn next_event(&mut self) -> Option<TxEvent> {
        self.events.pop_front()
    }

    fn sent_unconfirmed(&self) -> usize {
        self.in_flight.iter().sum()
    }

    fn unsent_bytes(&self) -> usize {
        self.tx.len() - self.sent_unconfirmed()
    }

    /// Apply one event. A returned chunk must be handed to the transport
    /// with the session lock released, then reported via
    /// [`finish_send`](Self::finish_send).
    pub(crate) fn apply(&mut self, event: TxEvent) -> Result<Option<Vec<u8>>, ProtocolError> {
        trace!(?event, phase = ?self.phase, "applying event");

        match (self.phase, event) {
            (TxPhase::Idle, TxEvent::Transmit) => Ok(self.attempt_send()),

            (TxPhase::Sending, TxEvent::Transmit) if self.unsent_bytes() > 0 => {
                Ok(self.attempt_send())
            }

            (TxPhase::Sending, TxEvent::SendFailed) => {
                debug!("send failed, waiting for retry trigger");
                self.phase = TxPhase::RetryWaiting;
                Ok(None)
            }

            (TxPhase::Idle, TxEvent::SendConfirmed(count)) => {
                // Nothing is outstanding; a non-zero count is caller
                // desynchronization and fails the same contract check.
                self.acknowledge(count)?;
                Ok(None)
            }

            (TxPhase::Sending, TxEvent::SendConfirmed(count)) => {
                self.acknowledge(count)?;
                if self.in_flight.is_empty() && self.tx.is_empty() {
                    debug!("all chunks confirmed, transfer complete");
                    self.phase = TxPhase::Idle;
                    Ok(None)
                } else if !self.in_flight.is_empty() {
                    Ok(None)
                } else {
                    Ok(self.attempt_send())
                }
            }

            (TxPhase::RetryWaiting, TxEvent::Transmit) if !self.mode.is_pipelined() => {
                Ok(self.attempt_send())
            }

            (TxPhase::RetryWaiting, TxEvent::SendConfirmed(count)) => {
                self.acknowledge(count)?;
                Ok(self.attempt_send())
            }

            (TxPhase::RetryWaiting, TxEvent::Nudge) if self.unsent_bytes() > 0 => {
                Ok(self.attempt_send())
            }

            (_, TxEvent::Reset) => {
                self.reset();
                Ok(None)
            }

            // Everything else: no matching transition, event discarded.
            _ => Ok(None),
        }
    }

    /// Report the outcome of the external send for the chunk returned by
    /// the last [`apply`](Self::apply).
    pub(crate) fn finish_send(&mut self, accepted: bool, chunk_len: usize) {
        if accepted {
            trace!(len = chunk_len, "chunk accepted by link");
            if !self.mode.is_pipelined() {
                // Fire-and-forget: nothing tracks this chunk, drop it now.
                // A reset may have raced the send; never drain past the end.
                self.tx.drain_front(chunk_len.min(self.tx.len()));
            }
            // Greedily offer the next chunk.
            self.push_event(TxEvent::Transmit);
        } else {
            if self.mode.is_pipelined() {
                // Roll back the optimistic in-flight entry; confirmations
                // drain from the front, so the newest entry is ours.
                self.in_flight.pop_back();
            }
            self.push_event(TxEvent::SendFailed);
        }
    }

    /// Compute and extract the next chunk, moving to `Sending`.
    ///
    /// In pipelined mode the in-flight entry is recorded here, before the
    /// external call, so a transport that confirms synchronously from
    /// inside `transmit_packet` observes the entry it is confirming.
    fn attempt_send(&mut self) -> Option<Vec<u8>> {
        let offset = self.sent_unconfirmed();
        let remaining = self.tx.len() - offset;

        if remaining == 0 {
            return None;
        }

        if self.mode.is_pipelined() && self.in_flight.is_full() {
            // No room to track another chunk: same recovery path as a
            // rejected send.
            self.phase = TxPhase::Sending;
            self.push_event(TxEvent::SendFailed);
            return None;
        }

        let len = remaining.min(self.mtu);
        let mut chunk = vec![0u8; len];
        self.tx.copy_range_to(offset, &mut chunk);

        if self.mode.is_pipelined() {
            self.in_flight.push_back(len);
        }

        debug!(len, offset, remaining, "attempting chunk send");
        self.phase = TxPhase::Sending;
        Some(chunk)
    }

    /// Consume a confirmation of `count` chunks.
    fn acknowledge(&mut self, count: usize) -> Result<(), ProtocolError> {
        if !self.mode.is_pipelined() {
            // Synchronous mode keeps no ledger; the event only drives
            // transitions.
            return Ok(());
        }

        if count > self.in_flight.len() {
            return Err(ProtocolError::ConfirmedTooMany {
                confirmed: count,
                outstanding: self.in_flight.len(),
            });
        }

        let mut bytes = 0;
        for _ in 0..count {
            bytes += self.in_flight.pop_front().unwrap_or(0);
        }
        self.tx.drain_front(bytes);

        trace!(count, bytes, left = self.tx.len(), "chunks confirmed");
        Ok(())
    }

    /// Destructive reset: clears the queue, the in-flight ledger, and any
    /// queued events, landing in `Idle`.
    pub(crate) fn reset(&mut self) {
        self.tx.clear();
        self.in_flight.clear();
        self.events.clear();
        self.phase = TxPhase::Idle;
    }
}
