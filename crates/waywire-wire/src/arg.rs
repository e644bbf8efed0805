use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::fixed::Fixed;
use crate::zstr::ZStr;
use crate::{ObjectId, RawFd, Version};

const ZEROES: [u8; 4] = [0; 4];

/// Round `len` up to the next multiple of four.
pub const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Opaque byte array argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Array<'a>(pub &'a [u8]);

impl<'a> Array<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }
}

/// One outgoing argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Argument<'a> {
    Int(i32),
    Uint(u32),
    Fixed(Fixed),
    /// String payload without its terminator. `None` is the null string.
    Str(Option<&'a [u8]>),
    Array(&'a [u8]),
    /// Reference to an existing object. `None` is the null object.
    Object(Option<ObjectId>),
    /// Id for an object of a statically known interface.
    NewId(ObjectId),
    /// Id for an object whose interface is only known at runtime; the
    /// interface name and version travel in front of the id.
    NewIdDynamic {
        interface: &'a str,
        version: Version,
        id: ObjectId,
    },
    /// Sent out-of-band, never written to the byte stream.
    Fd(RawFd),
}

impl<'a> Argument<'a> {
    /// A non-null string argument.
    pub fn str(s: &'a str) -> Self {
        Self::Str(Some(s.as_bytes()))
    }
}

impl<'a> From<ZStr<'a>> for Argument<'a> {
    fn from(s: ZStr<'a>) -> Self {
        Self::Str(Some(s.as_bytes()))
    }
}

fn string_size(payload: Option<&[u8]>) -> usize {
    match payload {
        None => 4,
        Some(bytes) => 4 + padded_len(bytes.len() + 1),
    }
}

/// Number of bytes `arg` occupies in the byte stream.
pub fn encoded_size(arg: &Argument<'_>) -> usize {
    match arg {
        Argument::Int(_)
        | Argument::Uint(_)
        | Argument::Fixed(_)
        | Argument::Object(_)
        | Argument::NewId(_) => 4,
        Argument::Str(payload) => string_size(*payload),
        Argument::Array(bytes) => 4 + padded_len(bytes.len()),
        Argument::NewIdDynamic { interface, .. } => string_size(Some(interface.as_bytes())) + 8,
        Argument::Fd(_) => 0,
    }
}

fn put_string(dst: &mut BytesMut, payload: Option<&[u8]>) {
    match payload {
        None => dst.put_u32_le(0),
        Some(bytes) => {
            let len = bytes.len() + 1;
            dst.put_u32_le(len as u32);
            dst.put_slice(bytes);
            dst.put_u8(0);
            dst.put_slice(&ZEROES[..padded_len(len) - len]);
        }
    }
}

/// Append `arg` to `dst`. File descriptors are pushed onto `fds` instead.
pub fn encode(arg: &Argument<'_>, dst: &mut BytesMut, fds: &mut Vec<RawFd>) {
    dst.reserve(encoded_size(arg));
    match arg {
        Argument::Int(v) => dst.put_i32_le(*v),
        Argument::Uint(v) => dst.put_u32_le(*v),
        Argument::Fixed(v) => dst.put_i32_le(v.to_raw()),
        Argument::Str(payload) => put_string(dst, *payload),
        Argument::Array(bytes) => {
            dst.put_u32_le(bytes.len() as u32);
            dst.put_slice(bytes);
            dst.put_slice(&ZEROES[..padded_len(bytes.len()) - bytes.len()]);
        }
        Argument::Object(id) => dst.put_u32_le(id.unwrap_or(0)),
        Argument::NewId(id) => dst.put_u32_le(*id),
        Argument::NewIdDynamic {
            interface,
            version,
            id,
        } => {
            put_string(dst, Some(interface.as_bytes()));
            dst.put_u32_le(*version);
            dst.put_u32_le(*id);
        }
        Argument::Fd(fd) => fds.push(*fd),
    }
}

impl fmt::Display for Argument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Int(v) => write!(f, "{v}"),
            Argument::Uint(v) => write!(f, "{v}"),
            Argument::Fixed(v) => write!(f, "{v}"),
            Argument::Str(None) => write!(f, "nil"),
            Argument::Str(Some(bytes)) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Argument::Array(bytes) => write!(f, "array[{}]", bytes.len()),
            Argument::Object(None) => write!(f, "nil"),
            Argument::Object(Some(id)) => write!(f, "@{id}"),
            Argument::NewId(id) => write!(f, "new id @{id}"),
            Argument::NewIdDynamic {
                interface,
                version,
                id,
            } => write!(f, "new id {interface}#{version}@{id}"),
            Argument::Fd(fd) => write!(f, "fd {fd}"),
        }
    }
}
