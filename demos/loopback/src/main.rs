//! Loopback demonstration.
//!
//! Wires two packetizers to a simulated BLE-like link: writes are rejected
//! now and then, accepted bytes are delivered to the peer in small odd
//! fragments, and every accepted write is eventually confirmed. Run with
//! `RUST_LOG=debug` to watch the state machine work.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lace_protocol::prelude::*;

/// Fragment size used when delivering "over the air" bytes to the peer,
/// deliberately misaligned with the MTU.
const AIR_FRAGMENT: usize = 7;

/// Every Nth write is rejected to exercise the retry path.
const REJECT_EVERY: u64 = 5;

/// One side of the simulated link.
struct SimLink {
    name: &'static str,
    /// Bytes accepted by the link, awaiting delivery to the peer.
    air: Mutex<Vec<u8>>,
    /// Accepted writes not yet confirmed back to the sender.
    unconfirmed: Mutex<u64>,
    writes: AtomicU64,
    /// Fully decoded inbound messages.
    inbound: Mutex<Vec<Message>>,
}

impl SimLink {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            air: Mutex::new(Vec::new()),
            unconfirmed: Mutex::new(0),
            writes: AtomicU64::new(0),
            inbound: Mutex::new(Vec::new()),
        }
    }

    fn take_air(&self) -> Vec<u8> {
        std::mem::take(&mut *self.air.lock().unwrap())
    }

    fn take_unconfirmed(&self) -> u64 {
        std::mem::take(&mut *self.unconfirmed.lock().unwrap())
    }
}

impl Transport for SimLink {
    fn transmit_packet(&self, packet: &[u8]) -> bool {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if n % REJECT_EVERY == 0 {
            warn!(side = self.name, write = n, "link rejected write");
            return false;
        }

        self.air.lock().unwrap().extend_from_slice(packet);
        *self.unconfirmed.lock().unwrap() += 1;
        true
    }

    fn on_frame_decoded(&self, frame: &[u8]) {
        match Message::decode(frame) {
            Ok(msg) => {
                info!(
                    side = self.name,
                    kind = ?msg.header.kind,
                    id = msg.header.id.0,
                    len = msg.payload.len(),
                    "message received"
                );
                self.inbound.lock().unwrap().push(msg);
            }
            Err(e) => warn!(side = self.name, error = %e, "undecodable frame"),
        }
    }
}

/// Pump the simulated link until the sender's transfer completes.
fn pump(sender: &Packetizer<SimLink>, receiver: &Packetizer<SimLink>) {
    loop {
        // Deliver accepted bytes to the peer in misaligned fragments
        let bytes = sender.transport().take_air();
        for fragment in bytes.chunks(AIR_FRAGMENT) {
            receiver.receive_packet(fragment);
        }

        // Confirm each accepted write, as a BLE stack would
        for _ in 0..sender.transport().take_unconfirmed() {
            sender.on_send_confirmed(1).expect("confirmation contract");
        }

        match sender.phase() {
            TxPhase::Idle => break,
            TxPhase::RetryWaiting => {
                sender.retry_if_pending().expect("retry contract");
            }
            TxPhase::Sending => {}
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let device = Packetizer::new(SimLink::new("device"));
    let host = Packetizer::new(SimLink::new("host"));

    // A request larger than one MTU, plus a burst of stream messages
    let query = Message::new(MessageKind::Request, MessageId(1), vec![0u8; 40])
        .expect("payload fits header");
    host.encode_and_transmit(&query.encode(), false)
        .expect("queue has room");
    pump(&host, &device);

    for i in 0..6u8 {
        let sample = Packer::new()
            .record(&(i as u32 * 100))
            .record(&(0.25f32 * f32::from(i)))
            .finish();
        let msg =
            Message::new(MessageKind::Stream, MessageId(2), sample).expect("payload fits header");
        device
            .encode_and_transmit(&msg.encode(), false)
            .expect("queue has room");
    }
    pump(&device, &host);

    info!(
        device_received = device.transport().inbound.lock().unwrap().len(),
        host_received = host.transport().inbound.lock().unwrap().len(),
        "loopback complete"
    );
}
