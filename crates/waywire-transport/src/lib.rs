//! Connects the waywire engine to a compositor over a Unix domain socket.
//!
//! The engine itself never touches a socket. This crate supplies the pieces
//! a client needs around it:
//! - [`socket_path`] resolves the compositor socket from the environment
//! - [`WaylandSocket`] sends and receives bytes with `SCM_RIGHTS` fd passing
//! - [`Connection`] owns socket, engine and input buffer, and drives dispatch

pub mod error;
pub mod path;

#[cfg(unix)]
pub mod connection;
#[cfg(unix)]
pub mod socket;

pub use error::{Result, TransportError};
pub use path::{socket_path, DEFAULT_DISPLAY};

#[cfg(unix)]
pub use connection::Connection;
#[cfg(unix)]
pub use socket::{SocketWriter, WaylandSocket};
