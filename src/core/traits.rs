//! Core traits for the LACE protocol.
//!
//! The [`Transport`] capability is the single seam between the packetizer
//! and a platform link binding (BLE characteristic, serial port, test mock).

/// Capability consumed by the packetizer to reach the underlying link.
///
/// # Requirements
///
/// - `transmit_packet` MUST NOT block indefinitely; `true` means the link
///   accepted the bytes, not that they were delivered.
/// - Implementations may call back into the packetizer synchronously from
///   inside either method (e.g. an immediate write confirmation); the
///   packetizer releases its session lock across both calls to permit this.
/// - Both methods may be invoked from any thread.
///
/// # Example
///
/// ```
/// use lace_protocol::core::Transport;
/// use std::sync::Mutex;
///
/// /// Records outgoing packets, for tests.
/// struct RecordingLink {
///     sent: Mutex<Vec<Vec<u8>>>,
///     received: Mutex<Vec<Vec<u8>>>,
/// }
///
/// impl Transport for RecordingLink {
///     fn transmit_packet(&self, packet: &[u8]) -> bool {
///         self.sent.lock().unwrap().push(packet.to_vec());
///         true
///     }
///
///     fn on_frame_decoded(&self, frame: &[u8]) {
///         self.received.lock().unwrap().push(frame.to_vec());
///     }
/// }
/// ```
pub trait Transport {
    /// Hand one MTU-bounded packet to the link.
    ///
    /// Returns `true` if the link accepted the write. A `false` return moves
    /// the transmit machine into retry-waiting; the same bytes will be
    /// offered again on the next retry trigger.
    fn transmit_packet(&self, packet: &[u8]) -> bool;

    /// Invoked once per fully reassembled, decoded, non-empty frame.
    fn on_frame_decoded(&self, frame: &[u8]);
}
