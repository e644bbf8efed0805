//! Byte-exact codec for the Wayland wire protocol.
//!
//! Every message on the wire is framed with an 8-byte header:
//! - A 4-byte little-endian target object id
//! - A 4-byte little-endian word packing `size << 16 | opcode`
//!
//! followed by the arguments, each aligned to 32 bits. Strings and arrays carry
//! a 4-byte length prefix and are zero-padded to the next multiple of four.
//! File descriptors never appear in the byte stream; they travel as ancillary
//! data next to the bytes of the message that declares them.
//!
//! Nothing in this crate performs I/O or object lookups.

pub mod arg;
pub mod decode;
pub mod error;
pub mod fixed;
pub mod header;
pub mod message;
pub mod zstr;

pub use arg::{encode, encoded_size, padded_len, Argument, Array};
pub use decode::{decode, ArgReader, Decode};
pub use error::{Result, WireError};
pub use fixed::Fixed;
pub use header::{MessageHeader, HEADER_SIZE, MAX_MESSAGE_SIZE};
pub use message::{encode_message, message_size, Message};
pub use zstr::ZStr;

/// Integer handle naming a protocol object.
pub type ObjectId = u32;

/// Protocol version negotiated for an object.
pub type Version = u32;

/// Request or event number, scoped to one interface.
pub type Opcode = u16;

/// File descriptor carried as ancillary data.
pub type RawFd = std::os::fd::RawFd;
