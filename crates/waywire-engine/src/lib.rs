//! Client-side dispatch engine for the Wayland wire protocol.
//!
//! The [`Engine`] owns every live protocol object in two [`ObjectTable`]s:
//! one for ids allocated locally (starting at 1) and one for ids allocated by
//! the compositor (starting at [`SERVER_ID_BASE`]). Incoming bytes are fed to
//! [`Engine::process_input`], which frames them and hands each message to the
//! addressed object's [`Object::dispatch`]. Outgoing requests are encoded and
//! passed to an [`OutputSink`] supplied by the caller.
//!
//! The engine does no I/O and keeps no input buffer of its own: the caller
//! owns the socket and must re-supply any bytes `process_input` did not
//! consume.

pub mod config;
pub mod engine;
pub mod error;
pub mod object;
pub mod sink;
pub mod table;

pub use config::EngineConfig;
pub use engine::{Engine, CLIENT_ID_BASE, DISPLAY_ID, SERVER_ID_BASE};
pub use error::{EngineError, Result};
pub use object::{
    Dispatch, Instance, Interface, InterfaceInfo, MessageInfo, NewObject, Object, Proxy,
};
pub use sink::{MemorySink, OutputSink};
pub use table::ObjectTable;

pub use waywire_wire as wire;
pub use waywire_wire::{ObjectId, Opcode, RawFd, Version};
