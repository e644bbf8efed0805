//! A Wayland client wire engine.
//!
//! waywire speaks the Wayland wire protocol from the client side: it frames
//! and decodes messages, tracks protocol objects in two id namespaces, and
//! dispatches events to typed handlers that may create or destroy objects
//! while they run.
//!
//! # Crate Structure
//!
//! - [`wire`]: message header, argument codec, fixed-point and string types
//! - [`engine`]: object table, dispatch loop and outgoing requests
//! - [`protocol`]: `wl_display`, `wl_registry` and `wl_callback`
//! - [`transport`]: compositor discovery and the Unix socket connection

/// Re-export wire codec types.
pub mod wire {
    pub use waywire_wire::*;
}

/// Re-export engine types.
pub mod engine {
    pub use waywire_engine::*;
}

/// Re-export the core protocol interfaces.
pub mod protocol {
    pub use waywire_protocol::*;
}

/// Re-export transport types.
pub mod transport {
    pub use waywire_transport::*;
}
