//! Receive-side frame reassembly.
//!
//! Link notifications deliver arbitrary byte fragments: half a frame, one
//! frame plus the start of the next, three frames at once. The reassembler
//! accumulates fragments in a bounded queue, carves out complete delimited
//! frames, and decodes them.

use tracing::{debug, warn};

use super::cobs;
use crate::core::BoundedDeque;

/// Accumulates received bytes and yields whole decoded frames.
///
/// Partial frames persist across [`push`](Self::push) calls. A scan cursor
/// remembers how far the buffer has been searched for a delimiter, so bytes
/// are never rescanned as fragments trickle in.
#[derive(Debug)]
pub struct Reassembler {
    rx: BoundedDeque<u8>,
    scanned: usize,
    scratch: Box<[u8]>,
    decoded: Box<[u8]>,
}

impl Reassembler {
    /// Create a reassembler with a fixed receive capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            rx: BoundedDeque::new(capacity),
            scanned: 0,
            scratch: vec![0u8; capacity].into_boxed_slice(),
            decoded: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Buffer a received fragment.
    ///
    /// Returns `false` when the fragment would overflow the queue; the
    /// entire fragment is discarded in that case. Losing one message beats
    /// unbounded growth, and the peer's framing recovers at the next
    /// delimiter.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        if !self.rx.extend_back(bytes) {
            warn!(
                dropped = bytes.len(),
                buffered = self.rx.len(),
                capacity = self.rx.capacity(),
                "receive queue overflow, fragment discarded"
            );
            return false;
        }
        true
    }

    /// Carve out and decode the next complete frame, if any.
    ///
    /// Empty and corrupt frames are dropped silently (logged) and scanning
    /// continues, so one damaged frame never wedges the stream.
    pub fn take_frame(&mut self) -> Option<Vec<u8>> {
        while let Some(range) = cobs::find_frame(self.rx.iter(), self.scanned) {
            let frame = &mut self.scratch[..range.end];
            self.rx.copy_range_to(0, frame);
            self.rx.drain_front(range.end);
            self.scanned = 0;

            match cobs::decode_into(frame, &mut self.decoded) {
                Ok(0) => debug!("empty frame dropped"),
                Ok(n) => return Some(self.decoded[..n].to_vec()),
                Err(e) => warn!(len = range.end, error = %e, "corrupt frame dropped"),
            }
        }

        self.scanned = self.rx.len();
        None
    }

    /// Bytes currently buffered (partial frame tail included).
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    /// Fixed receive capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.rx.capacity()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.rx.clear();
        self.scanned = 0;
    }
}
