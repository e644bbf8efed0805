//! `wl_display`: the connection's root object.
//!
//! The display is always object 1. Besides creating the registry and
//! synchronisation callbacks, it reports fatal protocol errors and tells the
//! client when an id it created may be reused.

use tracing::{debug, warn};
use waywire_engine::wire::{Argument, Message, ZStr};
use waywire_engine::{
    Dispatch, Engine, EngineError, Interface, MessageInfo, ObjectId, Opcode, Proxy, Result,
    Version,
};

use crate::send_constructor;
use crate::wl_callback::WlCallback;
use crate::wl_registry::WlRegistry;

pub struct WlDisplay;

const SYNC: Opcode = 0;
const GET_REGISTRY: Opcode = 1;

const REQUESTS: &[MessageInfo] = &[
    MessageInfo {
        name: "sync",
        signature: "n",
        since: 1,
    },
    MessageInfo {
        name: "get_registry",
        signature: "n",
        since: 1,
    },
];

const EVENTS: &[MessageInfo] = &[
    MessageInfo {
        name: "error",
        signature: "ous",
        since: 1,
    },
    MessageInfo {
        name: "delete_id",
        signature: "u",
        since: 1,
    },
];

/// Global error codes carried by the `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    InvalidObject = 0,
    InvalidMethod = 1,
    NoMemory = 2,
    Implementation = 3,
}

impl ErrorCode {
    pub fn from_raw(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::InvalidObject),
            1 => Some(Self::InvalidMethod),
            2 => Some(Self::NoMemory),
            3 => Some(Self::Implementation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    /// A fatal error on `object_id`. Interface-specific codes are only
    /// meaningful together with that object's interface.
    Error {
        object_id: ObjectId,
        code: u32,
        message: ZStr<'a>,
    },
    /// The compositor no longer uses `id`; the client may reuse it.
    DeleteId { id: u32 },
}

impl Interface for WlDisplay {
    const NAME: &'static str = "wl_display";
    const VERSION: Version = 1;
    const REQUESTS: &'static [MessageInfo] = REQUESTS;
    const EVENTS: &'static [MessageInfo] = EVENTS;

    type Event<'a> = Event<'a>;

    fn parse_event<'a>(
        engine: &mut Engine,
        this: Proxy<Self>,
        message: Message<'a>,
    ) -> Result<Event<'a>> {
        let mut args = message.args();
        match message.opcode() {
            0 => {
                let object_id = args.object()?.unwrap_or(0);
                let code = args.uint()?;
                let text = args.string()?;
                engine.log_event(
                    this,
                    0,
                    &[
                        Argument::Object(Some(object_id)),
                        Argument::Uint(code),
                        Argument::from(text),
                    ],
                );
                Ok(Event::Error {
                    object_id,
                    code,
                    message: text,
                })
            }
            1 => {
                let id = args.uint()?;
                engine.log_event(this, 1, &[Argument::Uint(id)]);
                Ok(Event::DeleteId { id })
            }
            opcode => Err(EngineError::UnknownOpcode {
                interface: Self::NAME,
                opcode,
            }),
        }
    }
}

/// Requests on the display.
pub trait DisplayRequests {
    /// Ask for a `done` event once every earlier request has been handled.
    fn sync<H: Dispatch<WlCallback>>(
        self,
        engine: &mut Engine,
        handler: H,
    ) -> Result<Proxy<WlCallback>>;

    /// Create the registry, which announces the compositor's globals.
    fn get_registry<H: Dispatch<WlRegistry>>(
        self,
        engine: &mut Engine,
        handler: H,
    ) -> Result<Proxy<WlRegistry>>;
}

impl DisplayRequests for Proxy<WlDisplay> {
    #[track_caller]
    fn sync<H: Dispatch<WlCallback>>(
        self,
        engine: &mut Engine,
        handler: H,
    ) -> Result<Proxy<WlCallback>> {
        engine.check_request(self, SYNC)?;
        let callback = engine.create::<WlCallback, H>(handler, self.version())?;
        send_constructor(
            engine,
            self,
            SYNC,
            callback,
            &[Argument::NewId(callback.id())],
        )
    }

    #[track_caller]
    fn get_registry<H: Dispatch<WlRegistry>>(
        self,
        engine: &mut Engine,
        handler: H,
    ) -> Result<Proxy<WlRegistry>> {
        engine.check_request(self, GET_REGISTRY)?;
        let registry = engine.create::<WlRegistry, H>(handler, self.version())?;
        send_constructor(
            engine,
            self,
            GET_REGISTRY,
            registry,
            &[Argument::NewId(registry.id())],
        )
    }
}

/// A fatal protocol error reported by the compositor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("protocol error {code} on object {object_id}: {message}")]
pub struct ProtocolError {
    pub object_id: ObjectId,
    pub code: u32,
    pub message: String,
}

/// Default display handler.
///
/// Records the first protocol error and releases ids named by `delete_id`.
#[derive(Debug, Default)]
pub struct Display {
    error: Option<ProtocolError>,
}

impl Display {
    pub fn error(&self) -> Option<&ProtocolError> {
        self.error.as_ref()
    }
}

impl Dispatch<WlDisplay> for Display {
    fn event(&mut self, engine: &mut Engine, _: Proxy<WlDisplay>, event: Event<'_>) -> Result<()> {
        match event {
            Event::Error {
                object_id,
                code,
                message,
            } => {
                let message = String::from_utf8_lossy(message.as_bytes()).into_owned();
                warn!(object_id, code, %message, "compositor reported a protocol error");
                self.error.get_or_insert(ProtocolError {
                    object_id,
                    code,
                    message,
                });
                Ok(())
            }
            Event::DeleteId { id } => release_id(engine, id),
        }
    }
}

/// Bind the display as the engine's root object with the default handler.
pub fn bind(engine: &mut Engine) -> Result<Proxy<WlDisplay>> {
    engine.create_root::<WlDisplay, Display>(Display::default())
}

/// Handle `delete_id`: unbind the object if it is still bound.
///
/// Objects the application already unbound are not an error.
pub fn release_id(engine: &mut Engine, id: ObjectId) -> Result<()> {
    match engine.unbind(id) {
        Ok(()) => Ok(()),
        Err(EngineError::AlreadyReleased(_) | EngineError::IdOutOfRange(_)) => {
            debug!(id, "delete_id for an id that is not bound");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waywire_engine::wire::encode_message;
    use waywire_engine::{EngineConfig, MemorySink, DISPLAY_ID};

    use crate::wl_callback::Completion;

    fn event(id: ObjectId, opcode: Opcode, args: &[Argument<'_>]) -> Vec<u8> {
        let mut buf = bytes::BytesMut::new();
        encode_message(id, opcode, args, &mut buf, &mut Vec::new()).unwrap();
        buf.to_vec()
    }

    fn setup() -> (Engine, MemorySink, Proxy<WlDisplay>) {
        let sink = MemorySink::new();
        let mut engine = Engine::with_config(sink.clone(), EngineConfig::default());
        let display = bind(&mut engine).unwrap();
        (engine, sink, display)
    }

    #[test]
    fn display_is_object_one() {
        let (_, _, display) = setup();
        assert_eq!(display.id(), DISPLAY_ID);
        assert_eq!(display.version(), 1);
    }

    #[test]
    fn sync_sends_new_id() {
        let (mut engine, sink, display) = setup();
        let callback = display.sync(&mut engine, Completion::new()).unwrap();
        assert_eq!(callback.id(), 2);
        assert_eq!(sink.take_bytes(), vec![1, 0, 0, 0, 0, 0, 12, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn error_event_is_recorded_once() {
        let (mut engine, _, display) = setup();

        let mut input = event(
            1,
            0,
            &[
                Argument::Object(Some(5)),
                Argument::Uint(1),
                Argument::str("bad request"),
            ],
        );
        input.extend(event(
            1,
            0,
            &[
                Argument::Object(Some(6)),
                Argument::Uint(3),
                Argument::str("later"),
            ],
        ));
        assert_eq!(engine.process_input(&input), input.len());

        let error = engine
            .handler::<WlDisplay, Display>(display)
            .and_then(Display::error)
            .cloned()
            .unwrap();
        assert_eq!(error.object_id, 5);
        assert_eq!(ErrorCode::from_raw(error.code), Some(ErrorCode::InvalidMethod));
        assert_eq!(error.message, "bad request");
        assert_eq!(error.to_string(), "protocol error 1 on object 5: bad request");
    }

    #[test]
    fn delete_id_releases_and_tolerates_unknown_ids() {
        let (mut engine, _, display) = setup();
        let callback = display.sync(&mut engine, Completion::new()).unwrap();

        let mut input = event(1, 1, &[Argument::Uint(callback.id())]);
        input.extend(event(1, 1, &[Argument::Uint(callback.id())]));
        input.extend(event(1, 1, &[Argument::Uint(99)]));
        assert_eq!(engine.process_input(&input), input.len());

        assert!(engine.drain_errors().is_empty());
        assert!(!engine.is_bound(callback.id()));
    }

    #[test]
    fn requests_fail_once_the_display_is_gone() {
        let (mut engine, sink, display) = setup();
        engine.unbind(display.id()).unwrap();

        assert!(matches!(
            display.sync(&mut engine, Completion::new()),
            Err(EngineError::NotBound(1))
        ));
        assert_eq!(engine.live_objects(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn failed_write_releases_the_new_object() {
        let mut engine = Engine::with_config(
            |_: &[u8], _: &[waywire_engine::RawFd]| -> std::io::Result<()> {
                Err(std::io::ErrorKind::BrokenPipe.into())
            },
            EngineConfig::release(),
        );
        let display = bind(&mut engine).unwrap();

        assert!(matches!(
            display.sync(&mut engine, Completion::new()),
            Err(EngineError::Output(_))
        ));
        assert!(!engine.is_bound(2));
        assert_eq!(engine.live_objects(), 1);
    }

    #[test]
    fn id_of_an_unsent_request_is_reused() {
        let mut writes = 0;
        let sink = move |_: &[u8], _: &[waywire_engine::RawFd]| -> std::io::Result<()> {
            writes += 1;
            if writes == 1 {
                return Err(std::io::ErrorKind::WouldBlock.into());
            }
            Ok(())
        };
        let mut engine = Engine::with_config(sink, EngineConfig::release());
        let display = bind(&mut engine).unwrap();

        assert!(display.sync(&mut engine, Completion::new()).is_err());
        let callback = display.sync(&mut engine, Completion::new()).unwrap();
        assert_eq!(callback.id(), 2);
        assert_eq!(engine.live_objects(), 2);
    }
}
