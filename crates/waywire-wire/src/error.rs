/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The buffer ended before the value was complete.
    #[error("truncated wire data ({needed} bytes needed, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// A string argument was not followed by its NUL terminator.
    #[error("string argument is missing its NUL terminator")]
    MissingNulTerminator,

    /// A non-nullable string argument was sent as null (length 0).
    #[error("null string where a value is required")]
    NullString,

    /// A string argument is not valid UTF-8.
    #[error("string argument is not valid UTF-8")]
    InvalidUtf8,

    /// The encoded message does not fit in the 16-bit size field.
    #[error("message too large ({size} bytes, max 65535)")]
    MessageTooLarge { size: usize },

    /// A header declared a size smaller than the header itself.
    #[error("invalid message size {size} (header alone is 8 bytes)")]
    InvalidMessageSize { size: u16 },

    /// A file descriptor argument had no matching ancillary fd.
    #[error("file descriptor argument without ancillary data")]
    MissingFd,
}

pub type Result<T> = std::result::Result<T, WireError>;
