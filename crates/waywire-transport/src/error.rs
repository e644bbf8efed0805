use std::path::PathBuf;

use waywire_engine::EngineError;
use waywire_protocol::ProtocolError;

/// Errors that can occur while talking to the compositor.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// `WAYLAND_DISPLAY` is a relative name and `XDG_RUNTIME_DIR` is unset.
    #[error("XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,

    /// `XDG_RUNTIME_DIR` is not an absolute path.
    #[error("XDG_RUNTIME_DIR is not absolute: {0}")]
    RelativeRuntimeDir(PathBuf),

    /// The socket path does not fit in `sockaddr_un`.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Failed to connect to the compositor socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The compositor closed the connection.
    #[error("connection closed by compositor")]
    Closed,

    /// The incoming byte stream can no longer be framed.
    #[error("unrecoverable input: {0}")]
    InvalidStream(String),

    /// The engine rejected an operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The compositor reported a fatal protocol error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, TransportError>;
