//! Typed serialization into flat buffers.
//!
//! Records are written with an explicit, declared wire layout (field
//! order, width, little-endian), never by reinterpreting an in-memory
//! representation, so the format is identical on every platform and
//! independent of struct layout.

use thiserror::Error;

/// Packing/unpacking errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    /// Input data is shorter than the record being read.
    #[error("record too short: expected {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum bytes required.
        expected: usize,
        /// Actual bytes available.
        actual: usize,
    },

    /// Unknown message kind discriminant.
    #[error("invalid message kind: 0x{0:02x}")]
    InvalidKind(u8),

    /// Payload exceeds what the header's length field can describe.
    #[error("payload too large: {size} bytes, at most {max} representable")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// Largest representable size.
        max: usize,
    },

    /// Declared payload length disagrees with the bytes present.
    #[error("payload length mismatch: header declares {declared}, {actual} bytes present")]
    LengthMismatch {
        /// Length from the header.
        declared: usize,
        /// Bytes actually present.
        actual: usize,
    },
}

/// A fixed-layout record with a declared wire footprint.
///
/// Implementations define the exact byte layout; primitive integers and
/// `f32` are little-endian.
pub trait FixedRecord: Sized {
    /// Exact encoded size in bytes.
    const WIRE_SIZE: usize;

    /// Write the record into the first [`WIRE_SIZE`](Self::WIRE_SIZE)
    /// bytes of `buf`. `buf` must be large enough.
    fn write_to(&self, buf: &mut [u8]);

    /// Read a record from the first [`WIRE_SIZE`](Self::WIRE_SIZE) bytes
    /// of `buf`.
    fn read_from(buf: &[u8]) -> Result<Self, PackError>;
}

macro_rules! impl_fixed_record_le {
    ($($ty:ty),* $(,)?) => {$(
        impl FixedRecord for $ty {
            const WIRE_SIZE: usize = size_of::<$ty>();

            fn write_to(&self, buf: &mut [u8]) {
                buf[..Self::WIRE_SIZE].copy_from_slice(&self.to_le_bytes());
            }

            fn read_from(buf: &[u8]) -> Result<Self, PackError> {
                let bytes = buf.get(..Self::WIRE_SIZE).ok_or(PackError::TooShort {
                    expected: Self::WIRE_SIZE,
                    actual: buf.len(),
                })?;
                Ok(<$ty>::from_le_bytes(bytes.try_into().unwrap()))
            }
        }
    )*};
}

impl_fixed_record_le!(u8, u16, u32, u64, i8, i16, i32, i64, f32);

/// Ordered builder serializing records and raw byte spans into one buffer.
///
/// The finished buffer is sized exactly to the sum of the parts' wire
/// footprints.
///
/// # Example
///
/// ```
/// use lace_protocol::message::Packer;
///
/// let buf = Packer::new()
///     .record(&0x0102u16)
///     .record(&7u8)
///     .bytes(&[0xAA, 0xBB])
///     .finish();
/// assert_eq!(buf, [0x02, 0x01, 0x07, 0xAA, 0xBB]);
/// ```
#[derive(Debug, Default)]
pub struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    /// Start an empty pack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a pack with preallocated room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append a fixed-layout record.
    pub fn record<R: FixedRecord>(mut self, record: &R) -> Self {
        let start = self.buf.len();
        self.buf.resize(start + R::WIRE_SIZE, 0);
        record.write_to(&mut self.buf[start..]);
        self
    }

    /// Append a raw byte span verbatim.
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// `true` if nothing has been packed yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the finished buffer.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor consuming consecutive fixed-size fields from a byte span.
///
/// The unconsumed suffix is available as [`remainder`](Self::remainder),
/// for the common layout of a fixed header followed by a variable-length
/// body.
///
/// # Example
///
/// ```
/// use lace_protocol::message::Unpacker;
///
/// let data = [0x02, 0x01, 0x07, 0xAA, 0xBB];
/// let mut r = Unpacker::new(&data);
/// assert_eq!(r.record::<u16>().unwrap(), 0x0102);
/// assert_eq!(r.record::<u8>().unwrap(), 7);
/// assert_eq!(r.remainder(), &[0xAA, 0xBB]);
/// ```
#[derive(Debug)]
pub struct Unpacker<'a> {
    rest: &'a [u8],
}

impl<'a> Unpacker<'a> {
    /// Start reading at the front of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    /// Consume one fixed-layout record.
    pub fn record<R: FixedRecord>(&mut self) -> Result<R, PackError> {
        let record = R::read_from(self.rest)?;
        self.rest = &self.rest[R::WIRE_SIZE..];
        Ok(record)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// The unconsumed suffix.
    pub fn remainder(self) -> &'a [u8] {
        self.rest
    }
}
