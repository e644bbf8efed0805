use std::io::ErrorKind;
use std::os::fd::OwnedFd;
use std::path::Path;

use bytes::{Buf, BytesMut};
use tracing::debug;
use waywire_engine::{Engine, EngineConfig, Proxy};
use waywire_protocol::wl_display::{self, DisplayRequests};
use waywire_protocol::{Completion, Display, ProtocolError, WlDisplay};

use crate::error::{Result, TransportError};
use crate::socket::WaylandSocket;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// A client connection: socket, engine and the unconsumed input tail.
///
/// The display object is bound on construction with the default
/// [`Display`] handler, so protocol errors and `delete_id` are handled
/// without further setup.
pub struct Connection {
    socket: WaylandSocket,
    engine: Engine,
    display: Proxy<WlDisplay>,
    input: BytesMut,
    fds: Vec<OwnedFd>,
}

impl Connection {
    /// Connect to the compositor named by the environment.
    pub fn connect() -> Result<Self> {
        Self::new(WaylandSocket::connect()?, EngineConfig::from_env())
    }

    /// Connect to a compositor socket at `path`.
    pub fn connect_to(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(WaylandSocket::connect_to(path)?, EngineConfig::from_env())
    }

    pub fn new(socket: WaylandSocket, config: EngineConfig) -> Result<Self> {
        let mut engine = Engine::with_config(socket.writer()?, config);
        let display = wl_display::bind(&mut engine)?;
        Ok(Self {
            socket,
            engine,
            display,
            input: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            fds: Vec::new(),
        })
    }

    pub fn display(&self) -> Proxy<WlDisplay> {
        self.display
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn socket(&self) -> &WaylandSocket {
        &self.socket
    }

    /// Bytes received but not yet dispatched (an incomplete message).
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// The protocol error reported by the compositor, if any.
    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        self.engine
            .handler::<WlDisplay, Display>(self.display)
            .and_then(Display::error)
    }

    /// Read once from the socket (blocking) and dispatch every complete
    /// message. Returns the number of bytes dispatched.
    pub fn dispatch_pending(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = loop {
            match self.socket.recv(&mut chunk, &mut self.fds) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        };
        if read == 0 {
            return Err(TransportError::Closed);
        }

        self.input.extend_from_slice(&chunk[..read]);
        self.engine.queue_fds(self.fds.drain(..));

        let consumed = self.engine.process_input(&self.input);
        self.input.advance(consumed);
        debug!(read, consumed, pending = self.input.len(), "dispatched input");

        if let Some(err) = self.engine.fatal_error() {
            return Err(TransportError::InvalidStream(err.to_string()));
        }
        if let Some(err) = self.protocol_error() {
            return Err(TransportError::Protocol(err.clone()));
        }
        Ok(consumed)
    }

    /// Send `wl_display.sync` and dispatch until the compositor answers.
    ///
    /// Every request sent before this call has been processed by the
    /// compositor, and every event it sent in response has been dispatched,
    /// when this returns.
    pub fn roundtrip(&mut self) -> Result<()> {
        let done = Completion::new();
        self.display.sync(&mut self.engine, done.clone())?;
        while !done.is_done() {
            self.dispatch_pending()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("socket", &self.socket)
            .field("engine", &self.engine)
            .field("pending_input", &self.input.len())
            .finish()
    }
}
