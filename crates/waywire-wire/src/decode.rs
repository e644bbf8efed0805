use std::collections::VecDeque;

use crate::arg::{padded_len, Array};
use crate::error::{Result, WireError};
use crate::fixed::Fixed;
use crate::zstr::ZStr;

/// An argument type that can be read from the front of a byte slice.
///
/// `decode` returns the number of bytes consumed (padding included) and the
/// value. Object references and new ids decode as plain `u32`; resolving them
/// is up to the caller.
pub trait Decode<'a>: Sized {
    fn decode(src: &'a [u8]) -> Result<(usize, Self)>;
}

/// Decode one `T` from the front of `src`.
pub fn decode<'a, T: Decode<'a>>(src: &'a [u8]) -> Result<(usize, T)> {
    T::decode(src)
}

fn word(src: &[u8]) -> Result<[u8; 4]> {
    match src.get(..4) {
        Some(bytes) => {
            let mut out = [0u8; 4];
            out.copy_from_slice(bytes);
            Ok(out)
        }
        None => Err(WireError::Truncated {
            needed: 4,
            available: src.len(),
        }),
    }
}

/// Length prefix followed by `len` payload bytes padded to four.
fn prefixed(src: &[u8]) -> Result<(usize, &[u8])> {
    let len = u32::from_le_bytes(word(src)?) as usize;
    let consumed = 4 + padded_len(len);
    if src.len() < consumed {
        return Err(WireError::Truncated {
            needed: consumed,
            available: src.len(),
        });
    }
    Ok((consumed, &src[4..4 + len]))
}

impl<'a> Decode<'a> for i32 {
    fn decode(src: &'a [u8]) -> Result<(usize, Self)> {
        Ok((4, i32::from_le_bytes(word(src)?)))
    }
}

impl<'a> Decode<'a> for u32 {
    fn decode(src: &'a [u8]) -> Result<(usize, Self)> {
        Ok((4, u32::from_le_bytes(word(src)?)))
    }
}

impl<'a> Decode<'a> for Fixed {
    fn decode(src: &'a [u8]) -> Result<(usize, Self)> {
        Ok((4, Fixed::from_raw(i32::from_le_bytes(word(src)?))))
    }
}

impl<'a> Decode<'a> for Option<ZStr<'a>> {
    fn decode(src: &'a [u8]) -> Result<(usize, Self)> {
        let (consumed, payload) = prefixed(src)?;
        if payload.is_empty() {
            return Ok((consumed, None));
        }
        Ok((consumed, Some(ZStr::from_bytes_with_nul(payload)?)))
    }
}

impl<'a> Decode<'a> for ZStr<'a> {
    fn decode(src: &'a [u8]) -> Result<(usize, Self)> {
        match Option::<ZStr<'a>>::decode(src)? {
            (consumed, Some(s)) => Ok((consumed, s)),
            (_, None) => Err(WireError::NullString),
        }
    }
}

impl<'a> Decode<'a> for Array<'a> {
    fn decode(src: &'a [u8]) -> Result<(usize, Self)> {
        let (consumed, payload) = prefixed(src)?;
        Ok((consumed, Array(payload)))
    }
}

/// Sequential reader over the argument area of one message.
#[derive(Debug)]
pub struct ArgReader<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> ArgReader<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }

    /// Read the next argument.
    pub fn read<T: Decode<'a>>(&mut self) -> Result<T> {
        let (consumed, value) = T::decode(&self.src[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn int(&mut self) -> Result<i32> {
        self.read()
    }

    pub fn uint(&mut self) -> Result<u32> {
        self.read()
    }

    pub fn fixed(&mut self) -> Result<Fixed> {
        self.read()
    }

    pub fn string(&mut self) -> Result<ZStr<'a>> {
        self.read()
    }

    pub fn optional_string(&mut self) -> Result<Option<ZStr<'a>>> {
        self.read()
    }

    pub fn array(&mut self) -> Result<Array<'a>> {
        self.read()
    }

    /// Object reference; `None` for the null object.
    pub fn object(&mut self) -> Result<Option<u32>> {
        let id: u32 = self.read()?;
        Ok((id != 0).then_some(id))
    }

    pub fn new_id(&mut self) -> Result<u32> {
        self.read()
    }

    /// Take the next file descriptor from the inbound ancillary queue.
    ///
    /// The queue is generic over the descriptor type so callers can keep
    /// ownership (`OwnedFd`) until a handler claims it.
    pub fn fd<F>(&mut self, queue: &mut VecDeque<F>) -> Result<F> {
        queue.pop_front().ok_or(WireError::MissingFd)
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.src.len() - self.pos
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::arg::{encode, Argument};

    fn wire(args: &[Argument<'_>]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        let mut fds = Vec::new();
        for arg in args {
            encode(arg, &mut buf, &mut fds);
        }
        buf.to_vec()
    }

    #[test]
    fn string_consumes_prefix_and_padding() {
        let bytes = wire(&[Argument::str("wl_compositor"), Argument::Uint(6)]);
        let (consumed, s) = decode::<ZStr<'_>>(&bytes).unwrap();

        assert_eq!(consumed, 4 + 16);
        assert_eq!(s, "wl_compositor");
        assert_eq!(decode::<u32>(&bytes[consumed..]).unwrap(), (4, 6));
    }

    #[test]
    fn empty_string_is_not_null() {
        let bytes = wire(&[Argument::str("")]);
        let (consumed, s) = decode::<ZStr<'_>>(&bytes).unwrap();
        assert_eq!(consumed, 8);
        assert!(s.is_empty());
    }

    #[test]
    fn null_string_handling() {
        let bytes = wire(&[Argument::Str(None)]);
        assert_eq!(decode::<Option<ZStr<'_>>>(&bytes).unwrap(), (4, None));
        assert_eq!(decode::<ZStr<'_>>(&bytes), Err(WireError::NullString));
    }

    #[test]
    fn string_without_terminator_fails() {
        let bytes = [3, 0, 0, 0, b'a', b'b', b'c', 0];
        assert_eq!(
            decode::<ZStr<'_>>(&bytes),
            Err(WireError::MissingNulTerminator)
        );
    }

    #[test]
    fn truncated_inputs_fail_cleanly() {
        assert_eq!(
            decode::<u32>(&[1, 2]),
            Err(WireError::Truncated {
                needed: 4,
                available: 2
            })
        );

        // length prefix claims 9 bytes, only 4 follow
        let bytes = [9, 0, 0, 0, b'a', b'b', b'c', 0];
        assert_eq!(
            decode::<Array<'_>>(&bytes),
            Err(WireError::Truncated {
                needed: 16,
                available: 8
            })
        );
    }

    #[test]
    fn reader_walks_mixed_arguments() {
        let payload = [1u8, 2, 3, 4, 5];
        let bytes = wire(&[
            Argument::Int(-7),
            Argument::Fixed(Fixed::from_f64(-2.5)),
            Argument::Array(&payload),
            Argument::Object(None),
            Argument::Object(Some(12)),
            Argument::NewId(0xff00_0000),
            Argument::Str(None),
        ]);

        let mut reader = ArgReader::new(&bytes);
        assert_eq!(reader.int().unwrap(), -7);
        assert_eq!(reader.fixed().unwrap().to_f64(), -2.5);
        assert_eq!(reader.array().unwrap().as_bytes(), &payload);
        assert_eq!(reader.object().unwrap(), None);
        assert_eq!(reader.object().unwrap(), Some(12));
        assert_eq!(reader.new_id().unwrap(), 0xff00_0000);
        assert_eq!(reader.optional_string().unwrap(), None);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.position(), bytes.len());
    }

    #[test]
    fn reader_pops_fds_in_order() {
        let mut queue = VecDeque::from(vec![10, 11]);
        let mut reader = ArgReader::new(&[]);

        assert_eq!(reader.fd(&mut queue).unwrap(), 10);
        assert_eq!(reader.fd(&mut queue).unwrap(), 11);
        assert_eq!(reader.fd(&mut queue), Err(WireError::MissingFd));
    }

    #[test]
    fn scalar_and_array_roundtrip() {
        for value in [i32::MIN, -1, 0, 1, i32::MAX] {
            let bytes = wire(&[Argument::Int(value)]);
            assert_eq!(decode::<i32>(&bytes).unwrap(), (4, value));
        }
        for len in 0..9usize {
            let data: Vec<u8> = (0..len as u8).collect();
            let bytes = wire(&[Argument::Array(&data)]);
            let (consumed, array) = decode::<Array<'_>>(&bytes).unwrap();
            assert_eq!(consumed, bytes.len());
            assert_eq!(array.as_bytes(), data.as_slice());
        }
    }
}
