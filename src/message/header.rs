//! Typed message header and whole-message helpers.
//!
//! Every application message carried over the transport starts with a
//! fixed four-byte header followed by exactly `payload_size` raw bytes:
//!
//! ```text
//! +--------+--------+------------------+------------------+
//! | Kind   | Id     | Payload Size     | Payload          |
//! | 1 byte | 1 byte | 2 bytes (LE16)   | variable         |
//! +--------+--------+------------------+------------------+
//! ```
//!
//! The catalogue of message ids is device-specific and opaque to this
//! crate; `Id` stays a raw byte.

use super::pack::{FixedRecord, PackError, Packer, Unpacker};
use crate::core::constants::{MAX_MESSAGE_PAYLOAD, MESSAGE_HEADER_SIZE};

/// Message kind discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Host-initiated request.
    Request = 1,
    /// Reply to a request.
    Response = 2,
    /// Unsolicited device stream (sensor data, events).
    Stream = 3,
}

impl MessageKind {
    /// Parse a kind from its wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Request),
            2 => Some(Self::Response),
            3 => Some(Self::Stream),
            _ => None,
        }
    }

    /// Wire byte for this kind.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Opaque message identifier within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(
    /// Raw id byte, meaningful only to the device catalogue.
    pub u8,
);

/// Fixed message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Message kind.
    pub kind: MessageKind,
    /// Device-specific message id.
    pub id: MessageId,
    /// Exact payload length in bytes.
    pub payload_size: u16,
}

impl MessageHeader {
    /// Create a header.
    pub fn new(kind: MessageKind, id: MessageId, payload_size: u16) -> Self {
        Self {
            kind,
            id,
            payload_size,
        }
    }
}

impl FixedRecord for MessageHeader {
    const WIRE_SIZE: usize = MESSAGE_HEADER_SIZE;

    fn write_to(&self, buf: &mut [u8]) {
        buf[0] = self.kind.as_byte();
        buf[1] = self.id.0;
        buf[2..4].copy_from_slice(&self.payload_size.to_le_bytes());
    }

    fn read_from(buf: &[u8]) -> Result<Self, PackError> {
        if buf.len() < Self::WIRE_SIZE {
            return Err(PackError::TooShort {
                expected: Self::WIRE_SIZE,
                actual: buf.len(),
            });
        }

        let kind = MessageKind::from_byte(buf[0]).ok_or(PackError::InvalidKind(buf[0]))?;
        let payload_size = u16::from_le_bytes([buf[2], buf[3]]);

        Ok(Self {
            kind,
            id: MessageId(buf[1]),
            payload_size,
        })
    }
}

/// A complete typed message: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The fixed header; `payload_size` always matches `payload.len()`.
    pub header: MessageHeader,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message, validating that the payload length is
    /// representable in the header.
    pub fn new(kind: MessageKind, id: MessageId, payload: Vec<u8>) -> Result<Self, PackError> {
        if payload.len() > MAX_MESSAGE_PAYLOAD {
            return Err(PackError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_PAYLOAD,
            });
        }
        Ok(Self {
            header: MessageHeader::new(kind, id, payload.len() as u16),
            payload,
        })
    }

    /// Total wire size.
    pub fn wire_size(&self) -> usize {
        MESSAGE_HEADER_SIZE + self.payload.len()
    }

    /// Serialize to the flat form handed to the packetizer.
    pub fn encode(&self) -> Vec<u8> {
        Packer::with_capacity(self.wire_size())
            .record(&self.header)
            .bytes(&self.payload)
            .finish()
    }

    /// Parse a decoded frame as one complete message.
    ///
    /// The frame must contain exactly the declared payload: a decoded
    /// frame carries one message and nothing else.
    pub fn decode(data: &[u8]) -> Result<Self, PackError> {
        let mut r = Unpacker::new(data);
        let header: MessageHeader = r.record()?;
        let body = r.remainder();

        if body.len() != header.payload_size as usize {
            return Err(PackError::LengthMismatch {
                declared: header.payload_size as usize,
                actual: body.len(),
            });
        }

        Ok(Self {
            header,
            payload: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            MessageKind::Request,
            MessageKind::Response,
            MessageKind::Stream,
        ] {
            assert_eq!(MessageKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(MessageKind::from_byte(0), None);
        assert_eq!(MessageKind::from_byte(4), None);
    }

    #[test]
    fn test_header_layout() {
        let header = MessageHeader::new(MessageKind::Stream, MessageId(0x04), 0x0201);
        let mut buf = [0u8; 4];
        header.write_to(&mut buf);
        assert_eq!(buf, [0x03, 0x04, 0x01, 0x02]);

        let parsed = MessageHeader::read_from(&buf).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_invalid_kind() {
        let result = MessageHeader::read_from(&[0x09, 0x01, 0x00, 0x00]);
        assert!(matches!(result, Err(PackError::InvalidKind(0x09))));
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = Message::new(MessageKind::Request, MessageId(2), vec![0xDE, 0xAD]).unwrap();

        let encoded = msg.encode();
        assert_eq!(encoded.len(), 4 + 2);
        assert_eq!(encoded[..4], [0x01, 0x02, 0x02, 0x00]);

        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_empty_payload() {
        let msg = Message::new(MessageKind::Response, MessageId(5), vec![]).unwrap();
        assert_eq!(msg.encode().len(), 4);
        assert_eq!(Message::decode(&msg.encode()).unwrap().payload, vec![]);
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut encoded = Message::new(MessageKind::Stream, MessageId(1), vec![1, 2, 3])
            .unwrap()
            .encode();

        encoded.pop();
        assert!(matches!(
            Message::decode(&encoded),
            Err(PackError::LengthMismatch {
                declared: 3,
                actual: 2
            })
        ));

        encoded.extend_from_slice(&[0, 0]);
        assert!(matches!(
            Message::decode(&encoded),
            Err(PackError::LengthMismatch { .. })
        ));
    }
}
