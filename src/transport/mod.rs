//! LACE Protocol - Transport Layer
//!
//! Turns the framing layer into a reliable-enough transport over a
//! write-confirmed link:
//!
//! - [`TxPhase`]/[`PipelineMode`]: transmit machine state and delivery mode
//! - [`Packetizer`]: the public session surface
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Application                   │
//! ├─────────────────────────────────────────────┤
//! │               Packetizer                    │  ← This module
//! │  encode, chunk, retry, confirm, reassemble  │
//! ├─────────────────────────────────────────────┤
//! │           Transport capability              │
//! │     (BLE characteristic, serial, mock)      │
//! └─────────────────────────────────────────────┘
//! ```

mod machine;
mod packetizer;

pub use machine::{PipelineMode, TxPhase};
pub use packetizer::{Packetizer, PacketizerConfig};
