//! The core Wayland interfaces, written against the waywire engine.
//!
//! Each module follows the same shape:
//! - A marker type implementing [`Interface`], with request and event
//!   metadata and an event decoder
//! - An `Event` enum with one variant per protocol event
//! - An extension trait on [`Proxy`] with one method per request
//! - Ready-made handlers for the common cases
//!
//! ```no_run
//! use waywire_engine::{Engine, MemorySink};
//! use waywire_protocol::wl_display::{self, DisplayRequests};
//! use waywire_protocol::wl_registry::Globals;
//!
//! # fn main() -> waywire_engine::Result<()> {
//! let mut engine = Engine::new(MemorySink::new());
//! let display = wl_display::bind(&mut engine)?;
//! let registry = display.get_registry(&mut engine, Globals::default())?;
//! # let _ = registry;
//! # Ok(())
//! # }
//! ```

pub mod wl_callback;
pub mod wl_display;
pub mod wl_registry;

pub use wl_callback::{Completion, WlCallback};
pub use wl_display::{Display, DisplayRequests, ProtocolError, WlDisplay};
pub use wl_registry::{Global, Globals, RegistryRequests, WlRegistry};

use tracing::debug;
use waywire_engine::wire::Argument;
use waywire_engine::{Engine, Interface, Opcode, Proxy, Result};

/// Send a request that creates `created`, releasing it again if the request
/// cannot be written.
pub(crate) fn send_constructor<I: Interface, C: Interface>(
    engine: &mut Engine,
    this: Proxy<I>,
    opcode: Opcode,
    created: Proxy<C>,
    args: &[Argument<'_>],
) -> Result<Proxy<C>> {
    if let Err(err) = engine.send(this, opcode, args) {
        // the id never reached the peer, so it can be reused right away
        if let Err(unbind) = engine.unbind(created.id()) {
            debug!(id = created.id(), error = %unbind, "could not release unsent object");
        }
        return Err(err);
    }
    Ok(created)
}
