use bytes::{BufMut, BytesMut};

use crate::error::{Result, WireError};
use crate::{ObjectId, Opcode};

/// Message header: object id (4) + size/opcode word (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest message the 16-bit size field can describe.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Decoded message header.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────────────┬────────────┐
/// │ Object id    │ Size (hi 16) | Opcode (lo 16)│ Arguments  │
/// │ (4B LE)      │ (4B LE)                      │ (Size - 8) │
/// └──────────────┴──────────────────────────────┴────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Target object.
    pub object_id: ObjectId,
    /// Total message size in bytes, header included.
    pub size: u16,
    pub opcode: Opcode,
}

impl MessageHeader {
    pub fn new(object_id: ObjectId, size: u16, opcode: Opcode) -> Self {
        Self {
            object_id,
            size,
            opcode,
        }
    }

    /// Parse a header from the front of `src`.
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available. The
    /// declared size is not validated here; see [`MessageHeader::body_len`].
    pub fn peek(src: &[u8]) -> Option<Self> {
        let object_id = u32::from_le_bytes(src.get(0..4)?.try_into().ok()?);
        let word = u32::from_le_bytes(src.get(4..8)?.try_into().ok()?);

        Some(Self {
            object_id,
            size: (word >> 16) as u16,
            opcode: (word & 0xffff) as u16,
        })
    }

    /// The packed second header word.
    pub fn size_opcode_word(&self) -> u32 {
        (u32::from(self.size) << 16) | u32::from(self.opcode)
    }

    /// Size of the argument area, or an error if the declared size cannot
    /// even hold the header.
    pub fn body_len(&self) -> Result<usize> {
        (self.size as usize)
            .checked_sub(HEADER_SIZE)
            .ok_or(WireError::InvalidMessageSize { size: self.size })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u32_le(self.object_id);
        dst.put_u32_le(self.size_opcode_word());
    }
}
