//! LACE Protocol - Message Layer
//!
//! Typed payload construction for the transport:
//!
//! - [`FixedRecord`]/[`Packer`]/[`Unpacker`]: explicit-layout serialization
//! - [`Message`]: the header + payload unit carried in each frame

mod header;
mod pack;

pub use header::{Message, MessageHeader, MessageId, MessageKind};
pub use pack::{FixedRecord, PackError, Packer, Unpacker};
