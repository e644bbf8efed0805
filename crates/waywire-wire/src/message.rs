use bytes::BytesMut;

use crate::arg::{encode, encoded_size, Argument};
use crate::decode::ArgReader;
use crate::error::{Result, WireError};
use crate::header::{MessageHeader, HEADER_SIZE, MAX_MESSAGE_SIZE};
use crate::{ObjectId, Opcode, RawFd};

/// Total wire size of a message carrying `args`, header included.
pub fn message_size(args: &[Argument<'_>]) -> usize {
    HEADER_SIZE + args.iter().map(encoded_size).sum::<usize>()
}

/// Encode a complete message into `dst`.
///
/// File descriptor arguments are appended to `fds` in argument order.
/// Returns the number of bytes written.
pub fn encode_message(
    object_id: ObjectId,
    opcode: Opcode,
    args: &[Argument<'_>],
    dst: &mut BytesMut,
    fds: &mut Vec<RawFd>,
) -> Result<usize> {
    let size = message_size(args);
    if size > MAX_MESSAGE_SIZE {
        return Err(WireError::MessageTooLarge { size });
    }

    dst.reserve(size);
    MessageHeader::new(object_id, size as u16, opcode).encode(dst);
    for arg in args {
        encode(arg, dst, fds);
    }
    Ok(size)
}

/// One complete message borrowed from an input buffer.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    header: MessageHeader,
    bytes: &'a [u8],
}

impl<'a> Message<'a> {
    /// Split the first complete message off the front of `src`.
    ///
    /// Returns `Ok(None)` if `src` does not hold a complete message yet, and an
    /// error if the header declares a size smaller than the header itself.
    pub fn parse(src: &'a [u8]) -> Result<Option<Self>> {
        let Some(header) = MessageHeader::peek(src) else {
            return Ok(None);
        };
        header.body_len()?;

        let size = header.size as usize;
        if src.len() < size {
            return Ok(None);
        }

        Ok(Some(Self {
            header,
            bytes: &src[..size],
        }))
    }

    pub fn header(&self) -> MessageHeader {
        self.header
    }

    pub fn object_id(&self) -> ObjectId {
        self.header.object_id
    }

    pub fn opcode(&self) -> Opcode {
        self.header.opcode
    }

    /// Wire size, header included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; a message holds at least its header.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The full message, header included.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The argument area.
    pub fn body(&self) -> &'a [u8] {
        &self.bytes[HEADER_SIZE..]
    }

    /// Reader positioned at the first argument.
    pub fn args(&self) -> ArgReader<'a> {
        ArgReader::new(self.body())
    }
}
