//! # LACE Protocol
//!
//! **L**ink-**A**gnostic **C**OBS **E**ncapsulation
//!
//! LACE is a reliable-enough message-framing transport for small typed
//! binary messages over unreliable, MTU-constrained, asynchronous links,
//! BLE characteristics first of all. It provides:
//!
//! - **Framing**: COBS byte stuffing with a single zero delimiter per frame
//! - **Reassembly**: whole messages out of arbitrarily fragmented input
//! - **Delivery**: chunked, MTU-bounded, optionally pipelined transmission
//!   with failure retry, driven by write confirmations
//! - **Bounded memory**: every queue is a fixed-capacity ring sized at
//!   construction
//! - **Typed payloads**: explicit-layout pack/unpack helpers
//!
//! ## Modules
//!
//! - [`core`]: constants, errors, the [`Transport`](core::Transport)
//!   capability, and the bounded ring
//! - [`framing`]: COBS codec and frame reassembly
//! - [`transport`]: transmit state machine and the [`Packetizer`]
//! - [`message`]: typed message headers and pack/unpack
//!
//! ## Example Usage
//!
//! ```rust
//! use lace_protocol::prelude::*;
//! use std::sync::Mutex;
//!
//! // Bind the packetizer to your platform link
//! struct LoggingLink {
//!     inbound: Mutex<Vec<Message>>,
//! }
//!
//! impl Transport for LoggingLink {
//!     fn transmit_packet(&self, packet: &[u8]) -> bool {
//!         // Hand `packet` to the characteristic write; `true` = accepted
//!         let _ = packet;
//!         true
//!     }
//!
//!     fn on_frame_decoded(&self, frame: &[u8]) {
//!         if let Ok(msg) = Message::decode(frame) {
//!             self.inbound.lock().unwrap().push(msg);
//!         }
//!     }
//! }
//!
//! let link = LoggingLink { inbound: Mutex::new(Vec::new()) };
//! let packetizer = Packetizer::new(link);
//!
//! // Build a typed message and queue it for delivery
//! let payload = Packer::new().record(&250u16).record(&1u8).finish();
//! let msg = Message::new(MessageKind::Request, MessageId(3), payload).unwrap();
//! packetizer.encode_and_transmit(&msg.encode(), false).unwrap();
//!
//! // The platform's write-completion callback confirms each chunk
//! packetizer.on_send_confirmed(1).unwrap();
//! assert_eq!(packetizer.phase(), TxPhase::Idle);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod framing;
pub mod message;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{LaceError, ProtocolError, Transport, TransmitError};
    pub use crate::framing::{CobsError, Reassembler, cobs};
    pub use crate::message::{
        FixedRecord, Message, MessageHeader, MessageId, MessageKind, PackError, Packer, Unpacker,
    };
    pub use crate::transport::{Packetizer, PacketizerConfig, PipelineMode, TxPhase};
}

// Re-export commonly used items at crate root
pub use crate::core::{LaceError, ProtocolError, Transport, TransmitError};
pub use crate::message::{Message, MessageHeader, MessageId, MessageKind};
pub use crate::transport::{Packetizer, PacketizerConfig, PipelineMode, TxPhase};
