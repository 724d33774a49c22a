//! LACE Protocol - Framing Layer
//!
//! Turns a byte-oriented, fragment-prone link into delimited frames:
//!
//! - [`cobs`]: stateless COBS encode/decode and frame location
//! - [`Reassembler`]: bounded accumulation of fragments into whole frames

pub mod cobs;
mod reassembly;

pub use cobs::{CobsError, max_encoded_len};
pub use reassembly::Reassembler;
