//! Error types for the LACE protocol.

use thiserror::Error;

/// Errors raised when queueing a payload for transmission.
///
/// These are recoverable: the session state is untouched and the caller may
/// retry with a smaller payload or after the queue drains.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransmitError {
    /// The COBS-encoded payload does not fit in the transmit queue's free
    /// space. Nothing was enqueued.
    #[error("transmit queue full: encoded payload needs {required} bytes, {available} free")]
    CapacityExceeded {
        /// Worst-case encoded size of the payload.
        required: usize,
        /// Free bytes currently available in the transmit queue.
        available: usize,
    },
}

/// Fatal contract violations between the session and its environment.
///
/// These indicate caller/environment desynchronization that cannot be safely
/// auto-corrected; the only sound recovery is [`reset`](crate::transport::Packetizer::reset).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The environment confirmed more chunks than are outstanding.
    #[error("confirmed {confirmed} chunks but only {outstanding} outstanding")]
    ConfirmedTooMany {
        /// Number of chunks the confirmation claims.
        confirmed: usize,
        /// Number of chunks actually awaiting confirmation.
        outstanding: usize,
    },

    /// Construction-time configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Top-level LACE errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaceError {
    /// Transmit queueing error.
    #[error("transmit error: {0}")]
    Transmit(#[from] TransmitError),

    /// Fatal protocol contract violation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Message packing/unpacking error.
    #[error("pack error: {0}")]
    Pack(#[from] crate::message::PackError),
}
