use std::ffi::CStr;
use std::fmt;

use crate::error::{Result, WireError};

/// Borrowed string that is guaranteed to be followed by a NUL terminator.
///
/// The terminator is not part of [`len`](ZStr::len) or [`as_bytes`](ZStr::as_bytes),
/// but it is present in memory so the view can be handed to C as-is.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZStr<'a> {
    with_nul: &'a [u8],
}

impl<'a> ZStr<'a> {
    /// The empty string.
    pub const EMPTY: ZStr<'static> = ZStr { with_nul: b"\0" };

    /// Wrap a byte slice whose last byte is the NUL terminator.
    pub fn from_bytes_with_nul(bytes: &'a [u8]) -> Result<Self> {
        match bytes.last() {
            Some(0) => Ok(Self { with_nul: bytes }),
            _ => Err(WireError::MissingNulTerminator),
        }
    }

    /// Borrow a `CStr` without copying.
    pub fn from_c_str(s: &'a CStr) -> Self {
        Self {
            with_nul: s.to_bytes_with_nul(),
        }
    }

    /// String bytes without the terminator.
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.with_nul[..self.with_nul.len() - 1]
    }

    /// String bytes including the terminator.
    pub fn as_bytes_with_nul(&self) -> &'a [u8] {
        self.with_nul
    }

    pub fn len(&self) -> usize {
        self.with_nul.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View as UTF-8.
    pub fn to_str(&self) -> Result<&'a str> {
        std::str::from_utf8(self.as_bytes()).map_err(|_| WireError::InvalidUtf8)
    }

    /// View as a C string. `None` if the payload contains an interior NUL.
    pub fn as_c_str(&self) -> Option<&'a CStr> {
        CStr::from_bytes_with_nul(self.with_nul).ok()
    }
}

impl Default for ZStr<'_> {
    fn default() -> Self {
        ZStr::EMPTY
    }
}

impl PartialEq<str> for ZStr<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for ZStr<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Display for ZStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for ZStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}
