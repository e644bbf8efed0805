use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use waywire_wire::{Message, ObjectId, Version};

use crate::engine::Engine;
use crate::error::Result;

/// Name and minimum version of one request or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    pub name: &'static str,
    /// Argument signature in libwayland notation (`i u f s o n a h`, `?` for nullable).
    pub signature: &'static str,
    pub since: Version,
}

/// Static description of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: &'static str,
    pub version: Version,
    pub requests: &'static [MessageInfo],
    pub events: &'static [MessageInfo],
}

impl InterfaceInfo {
    pub fn of<I: Interface>() -> Self {
        Self {
            name: I::NAME,
            version: I::VERSION,
            requests: I::REQUESTS,
            events: I::EVENTS,
        }
    }

    pub fn request_name(&self, opcode: u16) -> &'static str {
        self.requests
            .get(opcode as usize)
            .map_or("<unknown>", |m| m.name)
    }

    pub fn event_name(&self, opcode: u16) -> &'static str {
        self.events
            .get(opcode as usize)
            .map_or("<unknown>", |m| m.name)
    }
}

/// A protocol interface, as declared in a protocol description.
///
/// Implemented by zero-sized marker types. Opcodes index into `REQUESTS` and
/// `EVENTS` in declaration order. Each interface decodes its own events into
/// [`Interface::Event`], which a [`Dispatch`] implementation then handles.
pub trait Interface: Sized + 'static {
    const NAME: &'static str;
    const VERSION: Version;
    const REQUESTS: &'static [MessageInfo];
    const EVENTS: &'static [MessageInfo];

    /// One variant per event. May borrow strings and arrays from the message.
    type Event<'a>;

    /// Decode the event carried by `message`, addressed to `this`.
    ///
    /// File descriptor arguments are taken from the engine's inbound queue.
    fn parse_event<'a>(
        engine: &mut Engine,
        this: Proxy<Self>,
        message: Message<'a>,
    ) -> Result<Self::Event<'a>>;
}

/// A live protocol object stored in the engine's tables.
///
/// Objects are created by user code and handed to the engine, which assigns
/// the id and version through [`attach`](Object::attach). Messages addressed
/// to the object arrive at [`dispatch`](Object::dispatch) with full access to
/// the engine, so a handler may bind new objects or send requests before
/// returning.
pub trait Object: Any {
    fn interface(&self) -> InterfaceInfo;

    /// Assigned id, 0 while unbound.
    fn id(&self) -> ObjectId;

    fn version(&self) -> Version;

    /// Called by the engine when the object is bound.
    fn attach(&mut self, id: ObjectId, version: Version);

    /// Decode and handle one message addressed to this object. `message`
    /// includes its header.
    fn dispatch(&mut self, engine: &mut Engine, message: Message<'_>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Event handling for an interface `I`.
///
/// Implemented by application state types, once per interface they handle.
/// The handler receives the engine, so it may bind objects announced by the
/// event or send requests before returning.
pub trait Dispatch<I: Interface>: 'static {
    fn event(&mut self, engine: &mut Engine, this: Proxy<I>, event: I::Event<'_>) -> Result<()>;
}

/// Typed handle to a bound object.
///
/// Requests are methods on `Proxy<I>`. A proxy is only a name: it stays
/// valid until the object is unbound, after which the id may be reused.
pub struct Proxy<I> {
    id: ObjectId,
    version: Version,
    _interface: PhantomData<fn() -> I>,
}

impl<I: Interface> Proxy<I> {
    pub fn new(id: ObjectId, version: Version) -> Self {
        Self {
            id,
            version,
            _interface: PhantomData,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }
}

impl<I> Clone for Proxy<I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I> Copy for Proxy<I> {}

impl<I> PartialEq for Proxy<I> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl<I> Eq for Proxy<I> {}

impl<I: Interface> fmt::Debug for Proxy<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} v{}", I::NAME, self.id, self.version)
    }
}

/// An object created by the peer, announced through a `new_id` event argument.
///
/// The id is already reserved on the wire; call [`bind`](NewObject::bind) to
/// attach a handler so events for it can be dispatched. Dropping the binder
/// without binding leaves the id unbound and its events are reported as
/// addressed to an unknown object.
#[must_use = "events for the new object are dropped until it is bound"]
pub struct NewObject<I> {
    id: ObjectId,
    version: Version,
    _interface: PhantomData<fn() -> I>,
}

impl<I: Interface> NewObject<I> {
    pub fn new(id: ObjectId, version: Version) -> Self {
        Self {
            id,
            version,
            _interface: PhantomData,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Register `handler` under the announced id.
    pub fn bind<H: Dispatch<I>>(self, engine: &mut Engine, handler: H) -> Result<Proxy<I>> {
        engine.bind_at(self.id, Box::new(Instance::<I, H>::new(handler)), self.version)?;
        Ok(Proxy::new(self.id, self.version))
    }
}

impl<I: Interface> fmt::Debug for NewObject<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "new {}@{} v{}", I::NAME, self.id, self.version)
    }
}

/// The stored form of a handler bound as interface `I`.
pub struct Instance<I, H> {
    id: ObjectId,
    version: Version,
    handler: H,
    _interface: PhantomData<fn() -> I>,
}

impl<I: Interface, H: Dispatch<I>> Instance<I, H> {
    pub fn new(handler: H) -> Self {
        Self {
            id: 0,
            version: 0,
            handler,
            _interface: PhantomData,
        }
    }

    pub fn proxy(&self) -> Proxy<I> {
        Proxy::new(self.id, self.version)
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}

impl<I: Interface, H: Dispatch<I>> Object for Instance<I, H> {
    fn interface(&self) -> InterfaceInfo {
        InterfaceInfo::of::<I>()
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn attach(&mut self, id: ObjectId, version: Version) {
        self.id = id;
        self.version = version;
    }

    fn dispatch(&mut self, engine: &mut Engine, message: Message<'_>) -> Result<()> {
        let this = self.proxy();
        let event = I::parse_event(engine, this, message)?;
        self.handler.event(engine, this, event)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<I: Interface, H: fmt::Debug> fmt::Debug for Instance<I, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("interface", &I::NAME)
            .field("id", &self.id)
            .field("version", &self.version)
            .field("handler", &self.handler)
            .finish()
    }
}
