use waywire_wire::{ObjectId, Version, WireError};

/// Errors raised by the engine and its object tables.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed wire data.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// A message addressed an id with no live object.
    #[error("message for unknown object {0}")]
    UnknownObject(ObjectId),

    /// The addressed interface has no event with this opcode.
    #[error("{interface} has no event with opcode {opcode}")]
    UnknownOpcode {
        interface: &'static str,
        opcode: u16,
    },

    /// The object is currently dispatching and cannot be lent out again.
    #[error("object {0} is busy dispatching")]
    ObjectBusy(ObjectId),

    /// The id lies outside the table's issued range.
    #[error("object id {0} is out of range")]
    IdOutOfRange(ObjectId),

    /// The id was issued but has since been released.
    #[error("object id {0} was already released")]
    AlreadyReleased(ObjectId),

    /// The id is already bound to a live object.
    #[error("object id {0} is already in use")]
    IdInUse(ObjectId),

    /// The local id namespace ran into the server namespace.
    #[error("object id space exhausted")]
    IdsExhausted,

    /// A request was sent on an object that is not bound.
    #[error("object {0} is not bound")]
    NotBound(ObjectId),

    /// An object reference resolved to an object of a different interface.
    #[error("object {id} is a {found}, expected {expected}")]
    InterfaceMismatch {
        id: ObjectId,
        expected: &'static str,
        found: &'static str,
    },

    /// A request needs a newer version than the one negotiated for the object.
    #[error(
        "{location}: version check failed for {interface}.{request}: \
         object version {version}, minimum required {since}"
    )]
    VersionTooLow {
        interface: &'static str,
        request: &'static str,
        since: Version,
        version: Version,
        location: String,
    },

    /// The output sink failed to accept data.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
