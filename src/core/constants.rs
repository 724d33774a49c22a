//! Protocol constants for LACE framing and transport.
//!
//! Defaults match the reference BLE deployment; all of them can be
//! overridden through [`PacketizerConfig`](crate::transport::PacketizerConfig).

// =============================================================================
// FRAMING (COBS)
// =============================================================================

/// Frame delimiter byte. The only zero byte an encoded frame may contain.
pub const FRAME_DELIMITER: u8 = 0x00;

/// Maximum number of literal bytes a single COBS code byte can cover.
///
/// A code byte of 0xFF means "254 non-zero bytes follow, no implicit zero".
pub const COBS_MAX_BLOCK: usize = 254;

// =============================================================================
// TRANSPORT DEFAULTS
// =============================================================================

/// Default MTU: bytes per physical send.
///
/// 20 is the usable payload of a BLE 4.0 characteristic write (ATT_MTU 23).
pub const DEFAULT_MTU: usize = 20;

/// Default transmit queue capacity in bytes.
pub const DEFAULT_TX_CAPACITY: usize = 512;

/// Default receive queue capacity in bytes.
pub const DEFAULT_RX_CAPACITY: usize = 512;

/// Default number of chunks that may be outstanding (sent, unconfirmed).
pub const DEFAULT_PIPELINE_DEPTH: usize = 8;

// =============================================================================
// MESSAGE LAYOUT
// =============================================================================

/// Message header size (kind + id + payload_size).
pub const MESSAGE_HEADER_SIZE: usize = 4;

/// Maximum message payload size representable in the header (u16).
pub const MAX_MESSAGE_PAYLOAD: usize = u16::MAX as usize;
