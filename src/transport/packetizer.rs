//! Packetizer: the public transport surface.
//!
//! Owns one transmit/receive session over a [`Transport`] capability and
//! orchestrates the COBS codec, the frame reassembler, and the transmit
//! state machine behind a single session lock.
//!
//! # Locking
//!
//! Every entry point may be called from any thread; shared state lives
//! behind one mutex per session. The lock is deliberately released across
//! the external `transmit_packet` and `on_frame_decoded` calls, so a link
//! binding that confirms a write (or replies to a message) synchronously
//! from inside the callback re-enters without deadlocking.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::machine::{PipelineMode, TxEvent, TxMachine, TxPhase};
use crate::core::constants::{
    DEFAULT_MTU, DEFAULT_PIPELINE_DEPTH, DEFAULT_RX_CAPACITY, DEFAULT_TX_CAPACITY,
};
use crate::core::{LaceError, ProtocolError, Transport, TransmitError};
use crate::framing::{Reassembler, cobs};

/// Construction-time session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketizerConfig {
    /// Maximum bytes per physical send.
    pub mtu: usize,
    /// Transmit queue capacity in bytes.
    pub tx_capacity: usize,
    /// Receive queue capacity in bytes.
    pub rx_capacity: usize,
    /// Chunk delivery mode.
    pub pipeline: PipelineMode,
}

impl Default for PacketizerConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            tx_capacity: DEFAULT_TX_CAPACITY,
            rx_capacity: DEFAULT_RX_CAPACITY,
            pipeline: PipelineMode::Pipelined {
                depth: DEFAULT_PIPELINE_DEPTH,
            },
        }
    }
}

impl PacketizerConfig {
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.mtu == 0 {
            return Err(ProtocolError::InvalidConfig("mtu must be at least 1"));
        }
        if let PipelineMode::Pipelined { depth: 0 } = self.pipeline {
            return Err(ProtocolError::InvalidConfig(
                "pipeline depth must be at least 1; use PipelineMode::Synchronous instead",
            ));
        }
        Ok(())
    }
}

/// Mutable session state, guarded by the packetizer's mutex.
#[derive(Debug)]
struct Session {
    machine: TxMachine,
    reassembler: Reassembler,
    /// Encode scratch, sized once for the worst-case encoding of a payload
    /// that can still fit the transmit queue.
    scratch: Box<[u8]>,
}

/// Message-framing transport over an unreliable, MTU-constrained link.
///
/// Outbound: payloads are COBS-encoded into a bounded transmit queue and
/// delivered as MTU-sized chunks, retried on failure and (in pipelined
/// mode) confirmed chunk by chunk. Inbound: raw fragments are reassembled
/// into delimited frames, decoded, and handed to
/// [`Transport::on_frame_decoded`].
pub struct Packetizer<T: Transport> {
    transport: T,
    session: Mutex<Session>,
}

impl<T: Transport> Packetizer<T> {
    /// Create a packetizer with default configuration (MTU 20, 512-byte
    /// queues, pipeline depth 8).
    pub fn new(transport: T) -> Self {
        match Self::with_config(transport, PacketizerConfig::default()) {
            Ok(p) => p,
            // Default configuration is statically valid.
            Err(_) => unreachable!("default PacketizerConfig must validate"),
        }
    }

    /// Create a packetizer with an explicit configuration.
    pub fn with_config(transport: T, config: PacketizerConfig) -> Result<Self, ProtocolError> {
        config.validate()?;
        debug!(
            mtu = config.mtu,
            tx = config.tx_capacity,
            rx = config.rx_capacity,
            pipeline = ?config.pipeline,
            "packetizer session created"
        );
        Ok(Self {
            transport,
            session: Mutex::new(Session {
                machine: TxMachine::new(config.mtu, config.tx_capacity, config.pipeline),
                reassembler: Reassembler::new(config.rx_capacity),
                scratch: vec![0u8; cobs::max_encoded_len(config.tx_capacity)].into_boxed_slice(),
            }),
        })
    }

    /// The underlying transport capability.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encode a payload and append it to the transmit queue.
    ///
    /// Fails with [`TransmitError::CapacityExceeded`], leaving all state
    /// untouched, when the encoded payload does not fit the queue's free
    /// space.
    ///
    /// With `hold_transfer == false` the send attempt starts before this
    /// call returns. Passing `true` only enqueues: a caller that holds its
    /// own lock can queue the payload inside the critical section and call
    /// [`start_transfer`](Self::start_transfer) after releasing it, keeping
    /// the external send call out of its lock scope.
    pub fn encode_and_transmit(&self, payload: &[u8], hold_transfer: bool) -> Result<(), LaceError> {
        {
            let mut guard = self.lock_session();
            let session = &mut *guard;
            let available = session.machine.free_capacity();
            let worst = cobs::max_encoded_len(payload.len());

            if worst > session.scratch.len() {
                return Err(TransmitError::CapacityExceeded {
                    required: worst,
                    available,
                }
                .into());
            }

            let written = cobs::encode_into(payload, &mut session.scratch);
            if written > available {
                return Err(TransmitError::CapacityExceeded {
                    required: written,
                    available,
                }
                .into());
            }

            // Cannot fail: free space was just checked under this lock.
            session.machine.enqueue_encoded(&session.scratch[..written]);
            debug!(payload = payload.len(), encoded = written, "payload enqueued");
        }

        if !hold_transfer {
            self.drive(TxEvent::Transmit)?;
        }
        Ok(())
    }

    /// Begin (or continue) transmission of queued bytes.
    pub fn start_transfer(&self) -> Result<(), ProtocolError> {
        self.drive(TxEvent::Transmit)
    }

    /// The environment confirms delivery of `count` previously sent chunks.
    ///
    /// In pipelined mode a `count` exceeding the outstanding chunks is a
    /// fatal contract violation.
    pub fn on_send_confirmed(&self, count: usize) -> Result<(), ProtocolError> {
        self.drive(TxEvent::SendConfirmed(count))
    }

    /// Prompt a retry after an external failure notification, if bytes are
    /// still pending.
    pub fn retry_if_pending(&self) -> Result<(), ProtocolError> {
        self.drive(TxEvent::Nudge)
    }

    /// Feed raw bytes received from the link.
    ///
    /// Complete frames are decoded and forwarded to
    /// [`Transport::on_frame_decoded`] (outside the session lock) before
    /// this call returns; partial frames are retained for later fragments.
    pub fn receive_packet(&self, bytes: &[u8]) {
        self.lock_session().reassembler.push(bytes);

        loop {
            let frame = self.lock_session().reassembler.take_frame();
            match frame {
                Some(frame) => self.transport.on_frame_decoded(&frame),
                None => break,
            }
        }
    }

    /// Destructive reset: empties the transmit, receive, and in-flight
    /// queues and returns to idle. Unconfirmed data is discarded.
    pub fn reset(&self) {
        let mut session = self.lock_session();
        session.machine.reset();
        session.reassembler.clear();
        // Post-condition of the reset contract.
        assert_eq!(session.machine.phase(), TxPhase::Idle);
    }

    /// Current transmit machine phase.
    pub fn phase(&self) -> TxPhase {
        self.lock_session().machine.phase()
    }

    /// Encoded bytes currently queued for (or awaiting confirmation of)
    /// transmission.
    pub fn queued_bytes(&self) -> usize {
        self.lock_session().machine.queued_bytes()
    }

    /// Chunks sent but not yet confirmed.
    pub fn in_flight_chunks(&self) -> usize {
        self.lock_session().machine.in_flight_chunks()
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Trampoline: feed one event and drain all follow-ups before
    /// returning. The lock is dropped around each external send.
    fn drive(&self, first: TxEvent) -> Result<(), ProtocolError> {
        let mut session = self.lock_session();
        session.machine.push_event(first);

        while let Some(event) = session.machine.next_event() {
            if let Some(chunk) = session.machine.apply(event)? {
                drop(session);
                let accepted = self.transport.transmit_packet(&chunk);
                session = self.lock_session();
                session.machine.finish_send(accepted, chunk.len());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, OnceLock, Weak};

    /// Records traffic; acceptance is switchable mid-test.
    #[derive(Default)]
    struct MockLink {
        sent: Mutex<Vec<Vec<u8>>>,
        frames: Mutex<Vec<Vec<u8>>>,
        reject: AtomicBool,
    }

    impl MockLink {
        fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }

        fn frames(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl Transport for MockLink {
        fn transmit_packet(&self, packet: &[u8]) -> bool {
            if self.reject.load(Ordering::SeqCst) {
                return false;
            }
            self.sent.lock().unwrap().push(packet.to_vec());
            true
        }

        fn on_frame_decoded(&self, frame: &[u8]) {
            self.frames.lock().unwrap().push(frame.to_vec());
        }
    }

    fn packetizer(config: PacketizerConfig) -> Packetizer<MockLink> {
        Packetizer::with_config(MockLink::default(), config).unwrap()
    }

    #[test]
    fn test_mtu_chunking_scenario() {
        // 50 zero-free bytes encode to 52; MTU 20 gives chunks 20, 20, 12.
        let p = packetizer(PacketizerConfig::default());
        p.encode_and_transmit(&[0x33; 50], false).unwrap();

        let sizes: Vec<usize> = p.transport().sent().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 12]);
        assert_eq!(p.queued_bytes(), 52);
        assert_eq!(p.phase(), TxPhase::Sending);

        for _ in 0..3 {
            p.on_send_confirmed(1).unwrap();
        }
        assert_eq!(p.queued_bytes(), 0);
        assert_eq!(p.phase(), TxPhase::Idle);
    }

    #[test]
    fn test_wire_roundtrip_through_two_packetizers() {
        let a = packetizer(PacketizerConfig::default());
        let b = packetizer(PacketizerConfig::default());

        a.encode_and_transmit(&[1, 2, 0, 3], false).unwrap();
        for packet in a.transport().sent() {
            b.receive_packet(&packet);
        }
        assert_eq!(b.transport().frames(), vec![vec![1, 2, 0, 3]]);
    }

    #[test]
    fn test_capacity_rejection_leaves_state_untouched() {
        let p = packetizer(PacketizerConfig {
            tx_capacity: 16,
            ..Default::default()
        });

        let err = p.encode_and_transmit(&[0x11; 64], false).unwrap_err();
        assert!(matches!(
            err,
            LaceError::Transmit(TransmitError::CapacityExceeded { .. })
        ));
        assert_eq!(p.queued_bytes(), 0);
        assert!(p.transport().sent().is_empty());
        assert_eq!(p.phase(), TxPhase::Idle);
    }

    #[test]
    fn test_capacity_accounts_for_queued_bytes() {
        let p = packetizer(PacketizerConfig {
            tx_capacity: 32,
            ..Default::default()
        });

        // First payload fits (10 + 2 encoded), second would overflow.
        p.encode_and_transmit(&[0x22; 10], true).unwrap();
        let err = p.encode_and_transmit(&[0x22; 24], true).unwrap_err();
        assert!(matches!(err, LaceError::Transmit(_)));
        assert_eq!(p.queued_bytes(), 12);
    }

    #[test]
    fn test_hold_transfer_defers_send() {
        let p = packetizer(PacketizerConfig::default());
        p.encode_and_transmit(&[0x44; 8], true).unwrap();
        assert!(p.transport().sent().is_empty());
        assert_eq!(p.queued_bytes(), 10);

        p.start_transfer().unwrap();
        assert_eq!(p.transport().sent().len(), 1);
    }

    #[test]
    fn test_send_failure_then_nudge_retries_same_bytes() {
        let p = packetizer(PacketizerConfig::default());
        p.transport().reject.store(true, Ordering::SeqCst);
        p.encode_and_transmit(&[0x55; 8], false).unwrap();
        assert_eq!(p.phase(), TxPhase::RetryWaiting);
        assert!(p.transport().sent().is_empty());

        p.transport().reject.store(false, Ordering::SeqCst);
        p.retry_if_pending().unwrap();
        assert_eq!(p.phase(), TxPhase::Sending);

        // The retried chunk is byte-identical to the failed attempt
        let sent = p.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], cobs::encode(&[0x55; 8]));
    }

    #[test]
    fn test_pipeline_depth_limits_outstanding_chunks() {
        let p = packetizer(PacketizerConfig {
            pipeline: PipelineMode::Pipelined { depth: 2 },
            ..Default::default()
        });
        p.encode_and_transmit(&[0x66; 100], false).unwrap();

        // Only two chunks may be outstanding
        assert_eq!(p.transport().sent().len(), 2);
        assert_eq!(p.in_flight_chunks(), 2);

        // Each confirmation admits at most one more
        p.on_send_confirmed(1).unwrap();
        assert!(p.in_flight_chunks() <= 2);
        assert_eq!(p.transport().sent().len(), 3);
    }

    #[test]
    fn test_synchronous_mode() {
        let p = packetizer(PacketizerConfig {
            pipeline: PipelineMode::Synchronous,
            ..Default::default()
        });
        p.encode_and_transmit(&[0x77; 30], false).unwrap();

        // All chunks go out back-to-back and leave the queue immediately
        let sizes: Vec<usize> = p.transport().sent().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 12]);
        assert_eq!(p.queued_bytes(), 0);
        assert_eq!(p.in_flight_chunks(), 0);

        p.on_send_confirmed(1).unwrap();
        assert_eq!(p.phase(), TxPhase::Idle);
    }

    #[test]
    fn test_confirmation_overrun_is_fatal() {
        let p = packetizer(PacketizerConfig::default());
        p.encode_and_transmit(&[0x42; 4], false).unwrap();

        let err = p.on_send_confirmed(5).unwrap_err();
        assert!(matches!(err, ProtocolError::ConfirmedTooMany { .. }));
    }

    #[test]
    fn test_receive_split_at_delimiter() {
        let p = packetizer(PacketizerConfig::default());
        let wire = cobs::encode(&[9, 9, 9]);

        p.receive_packet(&wire[..wire.len() - 1]);
        assert!(p.transport().frames().is_empty());

        p.receive_packet(&wire[wire.len() - 1..]);
        assert_eq!(p.transport().frames(), vec![vec![9, 9, 9]]);
    }

    #[test]
    fn test_receive_overflow_drops_chunk() {
        let p = packetizer(PacketizerConfig {
            rx_capacity: 8,
            ..Default::default()
        });

        // No delimiter: bytes accumulate
        p.receive_packet(&[1, 2, 3, 4, 5, 6]);
        // Would overflow: dropped wholesale, nothing decoded
        p.receive_packet(&[7, 8, 9]);
        assert!(p.transport().frames().is_empty());
    }

    #[test]
    fn test_reset_discards_everything() {
        let p = packetizer(PacketizerConfig::default());
        p.encode_and_transmit(&[0x11; 40], false).unwrap();
        p.receive_packet(&[0x03, 0x07]); // partial inbound frame
        assert!(p.queued_bytes() > 0);

        p.reset();
        assert_eq!(p.phase(), TxPhase::Idle);
        assert_eq!(p.queued_bytes(), 0);
        assert_eq!(p.in_flight_chunks(), 0);

        // A confirmation for pre-reset chunks is now a contract violation
        assert!(p.on_send_confirmed(1).is_err());
    }

    /// A link that confirms each write synchronously, from inside
    /// `transmit_packet`, before reporting acceptance. Exercises the
    /// requirement that the session lock is not held across the send.
    #[derive(Default)]
    struct EagerLink {
        packetizer: OnceLock<Weak<Packetizer<EagerLink>>>,
        sent: Mutex<Vec<usize>>,
    }

    impl Transport for EagerLink {
        fn transmit_packet(&self, packet: &[u8]) -> bool {
            self.sent.lock().unwrap().push(packet.len());
            if let Some(p) = self.packetizer.get().and_then(Weak::upgrade) {
                p.on_send_confirmed(1).unwrap();
            }
            true
        }

        fn on_frame_decoded(&self, _frame: &[u8]) {}
    }

    #[test]
    fn test_synchronous_confirmation_reentrancy() {
        let p = Arc::new(Packetizer::new(EagerLink::default()));
        p.transport()
            .packetizer
            .set(Arc::downgrade(&p))
            .ok()
            .unwrap();

        p.encode_and_transmit(&[0x13; 50], false).unwrap();

        // Every chunk was confirmed as it was written; the transfer
        // completed within the triggering call.
        assert_eq!(*p.transport().sent.lock().unwrap(), vec![20, 20, 12]);
        assert_eq!(p.queued_bytes(), 0);
        assert_eq!(p.phase(), TxPhase::Idle);
    }
}
