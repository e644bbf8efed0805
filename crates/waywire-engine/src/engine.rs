use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::os::fd::OwnedFd;
use std::panic::Location;

use bytes::BytesMut;
use tracing::{debug, trace, warn};
use waywire_wire::{encode_message, Argument, Message, ObjectId, Opcode, RawFd, Version};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::object::{Dispatch, Instance, Interface, InterfaceInfo, MessageInfo, Object, Proxy};
use crate::sink::OutputSink;
use crate::table::ObjectTable;

/// First id handed out for locally created objects.
pub const CLIENT_ID_BASE: ObjectId = 1;

/// Id of the display object, always the first object bound.
pub const DISPLAY_ID: ObjectId = 1;

/// Ids at or above this value are allocated by the compositor.
pub const SERVER_ID_BASE: ObjectId = 0xFF00_0000;

/// Per-message errors kept for [`Engine::drain_errors`].
const MAX_QUEUED_ERRORS: usize = 64;

type ObjectBox = Box<dyn Object>;

/// Client side of one Wayland connection.
///
/// The engine routes incoming messages to the objects it owns and encodes
/// outgoing requests into the [`OutputSink`]. It never reads from or writes
/// to a socket itself.
pub struct Engine {
    client: ObjectTable<ObjectBox>,
    server: ObjectTable<ObjectBox>,
    sink: Box<dyn OutputSink>,
    config: EngineConfig,
    out_buf: BytesMut,
    out_fds: Vec<RawFd>,
    in_fds: VecDeque<OwnedFd>,
    /// Event tables of unbound objects, so late events can release their fds.
    retired: HashMap<ObjectId, &'static [MessageInfo]>,
    errors: VecDeque<EngineError>,
    dropped: u64,
    fatal: Option<EngineError>,
}

impl Engine {
    /// Create an engine with [`EngineConfig::default`].
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self::with_config(sink, EngineConfig::default())
    }

    pub fn with_config(sink: impl OutputSink + 'static, config: EngineConfig) -> Self {
        Self {
            client: ObjectTable::new(CLIENT_ID_BASE, SERVER_ID_BASE),
            server: ObjectTable::new(SERVER_ID_BASE, ObjectId::MAX),
            sink: Box::new(sink),
            config,
            out_buf: BytesMut::with_capacity(256),
            out_fds: Vec::new(),
            in_fds: VecDeque::new(),
            retired: HashMap::new(),
            errors: VecDeque::new(),
            dropped: 0,
            fatal: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Replace the output sink, returning the previous one.
    pub fn set_output(&mut self, sink: impl OutputSink + 'static) -> Box<dyn OutputSink> {
        std::mem::replace(&mut self.sink, Box::new(sink))
    }

    fn table(&self, id: ObjectId) -> &ObjectTable<ObjectBox> {
        if id >= SERVER_ID_BASE {
            &self.server
        } else {
            &self.client
        }
    }

    fn table_mut(&mut self, id: ObjectId) -> &mut ObjectTable<ObjectBox> {
        if id >= SERVER_ID_BASE {
            &mut self.server
        } else {
            &mut self.client
        }
    }

    /// Dispatch every complete message at the front of `input`.
    ///
    /// Returns the number of bytes consumed. The caller keeps
    /// `input[consumed..]` and presents it again, followed by newly read
    /// bytes, on the next call.
    ///
    /// A message that cannot be delivered (unknown object, unknown opcode,
    /// malformed arguments) is skipped and recorded; see
    /// [`drain_errors`](Self::drain_errors). A header declaring a size smaller
    /// than the header itself leaves no way to find the next message: the
    /// engine records it as [`fatal_error`](Self::fatal_error) and consumes
    /// nothing further.
    pub fn process_input(&mut self, input: &[u8]) -> usize {
        if self.fatal.is_some() {
            return 0;
        }

        let mut consumed = 0;
        loop {
            let message = match Message::parse(&input[consumed..]) {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(err) => {
                    warn!(offset = consumed, error = %err, "unparseable input, stopping");
                    self.fatal = Some(err.into());
                    break;
                }
            };
            consumed += message.len();

            if let Err(err) = self.dispatch(message) {
                self.record(message, err);
            }
        }

        trace!(consumed, pending = input.len() - consumed, "processed input");
        consumed
    }

    fn dispatch(&mut self, message: Message<'_>) -> Result<()> {
        let id = message.object_id();
        let mut object = match self.table_mut(id).lend(id) {
            Ok(object) => object,
            Err(err) => {
                let events = self.retired.get(&id).copied();
                self.discard_fds(events, message.opcode(), 0);
                return Err(match err {
                    EngineError::IdOutOfRange(_) | EngineError::AlreadyReleased(_) => {
                        EngineError::UnknownObject(id)
                    }
                    other => other,
                });
            }
        };

        let events = object.interface().events;
        let queued = self.in_fds.len();
        let result = object.dispatch(self, message);
        if !self.table_mut(id).restore(id, object) {
            debug!(id, "object released during its own dispatch");
            self.retired.insert(id, events);
        }
        if result.is_err() {
            let claimed = queued.saturating_sub(self.in_fds.len());
            self.discard_fds(Some(events), message.opcode(), claimed);
        }
        result
    }

    /// Close the descriptors a dropped message carried but nobody claimed.
    ///
    /// The count comes from the event signature. Without one (an id that
    /// was never bound, or an unknown opcode) the association between
    /// queued descriptors and messages is lost and the whole queue is closed.
    fn discard_fds(&mut self, events: Option<&[MessageInfo]>, opcode: Opcode, claimed: usize) {
        let expected = events
            .and_then(|events| events.get(opcode as usize))
            .map(|event| event.signature.matches('h').count());
        let count = match expected {
            Some(expected) => expected.saturating_sub(claimed),
            None => self.in_fds.len(),
        }
        .min(self.in_fds.len());

        if count > 0 {
            warn!(count, opcode, "closing descriptors of dropped message");
            self.in_fds.drain(..count);
        }
    }

    fn record(&mut self, message: Message<'_>, err: EngineError) {
        warn!(
            object = message.object_id(),
            opcode = message.opcode(),
            size = message.len(),
            error = %err,
            "dropping message"
        );
        self.dropped += 1;
        if self.errors.len() == MAX_QUEUED_ERRORS {
            self.errors.pop_front();
        }
        self.errors.push_back(err);
    }

    /// Take the per-message errors recorded by `process_input`, oldest first.
    ///
    /// Only the most recent 64 are kept; [`dropped_messages`](Self::dropped_messages)
    /// counts all of them.
    pub fn drain_errors(&mut self) -> Vec<EngineError> {
        self.errors.drain(..).collect()
    }

    /// Total number of messages skipped because they could not be delivered.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped
    }

    /// The framing error that stopped input processing, if any.
    pub fn fatal_error(&self) -> Option<&EngineError> {
        self.fatal.as_ref()
    }

    /// Append file descriptors received as ancillary data.
    ///
    /// They are handed out in order to `fd` arguments of subsequent messages.
    /// Descriptors still queued when the engine is dropped are closed.
    pub fn queue_fds(&mut self, fds: impl IntoIterator<Item = OwnedFd>) {
        self.in_fds.extend(fds);
    }

    /// Inbound descriptors not yet claimed by a decoded message.
    pub fn incoming_fds(&mut self) -> &mut VecDeque<OwnedFd> {
        &mut self.in_fds
    }

    /// Trace an incoming event when wire debugging is on.
    pub fn log_event<I: Interface>(&self, this: Proxy<I>, opcode: Opcode, args: &[Argument<'_>]) {
        if self.config.wire_debug {
            debug!(
                target: "waywire::wire",
                "<- {}@{}.{}({})",
                I::NAME,
                this.id(),
                InterfaceInfo::of::<I>().event_name(opcode),
                ArgList(args)
            );
        }
    }

    /// Register a locally created object and return its new id.
    pub fn bind(&mut self, object: Box<dyn Object>, version: Version) -> Result<ObjectId> {
        let interface = object.interface().name;
        let id = self.client.insert(object)?;
        self.retired.remove(&id);
        if let Some(object) = self.client.get_mut(id) {
            object.attach(id, version);
        }
        debug!(id, version, interface, "bound object");
        Ok(id)
    }

    /// Register an object under an id chosen by the compositor.
    pub fn bind_at(
        &mut self,
        id: ObjectId,
        mut object: Box<dyn Object>,
        version: Version,
    ) -> Result<()> {
        let interface = object.interface().name;
        object.attach(id, version);
        self.table_mut(id).insert_at(id, object)?;
        self.retired.remove(&id);
        debug!(id, version, interface, "bound object at peer id");
        Ok(())
    }

    /// Register the display object, which must land at [`DISPLAY_ID`].
    ///
    /// # Panics
    ///
    /// With [`EngineConfig::debug`] set, panics if another object already
    /// holds the first id. Otherwise the object is bound at whatever id is
    /// free and a warning is logged; the compositor will not recognise it.
    pub fn bind_root(&mut self, object: Box<dyn Object>, version: Version) -> Result<ObjectId> {
        let id = self.bind(object, version)?;
        if id != DISPLAY_ID {
            assert!(
                !self.config.debug,
                "display object bound at id {id}; it must be the first object bound"
            );
            warn!(id, "display object bound after other objects");
        }
        Ok(id)
    }

    /// Bind `handler` as a new local object of interface `I`.
    pub fn create<I: Interface, H: Dispatch<I>>(
        &mut self,
        handler: H,
        version: Version,
    ) -> Result<Proxy<I>> {
        let id = self.bind(Box::new(Instance::<I, H>::new(handler)), version)?;
        Ok(Proxy::new(id, version))
    }

    /// Bind `handler` as the display object at the interface's own version.
    pub fn create_root<I: Interface, H: Dispatch<I>>(&mut self, handler: H) -> Result<Proxy<I>> {
        let id = self.bind_root(Box::new(Instance::<I, H>::new(handler)), I::VERSION)?;
        Ok(Proxy::new(id, I::VERSION))
    }

    /// Drop the object at `id` and release the id.
    ///
    /// Unbinding the object that is currently dispatching is allowed; it is
    /// dropped when its handler returns.
    pub fn unbind(&mut self, id: ObjectId) -> Result<()> {
        let events = self.table(id).get(id).map(|object| object.interface().events);
        self.table_mut(id).erase(id)?;
        if let Some(events) = events {
            self.retired.insert(id, events);
        }
        debug!(id, "unbound object");
        Ok(())
    }

    /// Whether `id` names a live object, including one that is dispatching.
    pub fn is_bound(&self, id: ObjectId) -> bool {
        self.table(id).contains(id)
    }

    /// Look up a live object.
    ///
    /// Returns `None` for unbound ids and for the object that is currently
    /// dispatching.
    pub fn get_interface(&self, id: ObjectId) -> Option<&dyn Object> {
        self.table(id).get(id).map(|object| object.as_ref())
    }

    pub fn get_interface_mut(&mut self, id: ObjectId) -> Option<&mut dyn Object> {
        let object = self.table_mut(id).get_mut(id)?;
        Some(object.as_mut())
    }

    /// Resolve an object-reference argument to a typed proxy.
    pub fn proxy<I: Interface>(&self, id: ObjectId) -> Result<Proxy<I>> {
        let object = self.table(id).try_get(id).map_err(|err| match err {
            EngineError::IdOutOfRange(_) | EngineError::AlreadyReleased(_) => {
                EngineError::NotBound(id)
            }
            other => other,
        })?;

        let found = object.interface().name;
        if found != I::NAME {
            return Err(EngineError::InterfaceMismatch {
                id,
                expected: I::NAME,
                found,
            });
        }
        Ok(Proxy::new(id, object.version()))
    }

    /// The handler bound behind `this`, if it has type `H`.
    pub fn handler<I: Interface, H: Dispatch<I>>(&self, this: Proxy<I>) -> Option<&H> {
        self.get_interface(this.id())?
            .as_any()
            .downcast_ref::<Instance<I, H>>()
            .map(Instance::handler)
    }

    pub fn handler_mut<I: Interface, H: Dispatch<I>>(&mut self, this: Proxy<I>) -> Option<&mut H> {
        self.get_interface_mut(this.id())?
            .as_any_mut()
            .downcast_mut::<Instance<I, H>>()
            .map(Instance::handler_mut)
    }

    /// Live objects in both namespaces, in id order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &dyn Object)> + '_ {
        self.client
            .iter()
            .chain(self.server.iter())
            .map(|(id, object)| (id, object.as_ref()))
    }

    /// Number of live objects, including one that is dispatching.
    pub fn live_objects(&self) -> usize {
        self.client.live() + self.server.live()
    }

    /// Check that a request may be sent on `this`.
    ///
    /// Fails if the object is not bound or, when version checks are on, if
    /// the request needs a newer version than the object was bound with.
    /// The error names the call site of the outermost `#[track_caller]`
    /// request method.
    #[track_caller]
    pub fn check_request<I: Interface>(&self, this: Proxy<I>, opcode: Opcode) -> Result<()> {
        if !self.is_bound(this.id()) {
            return Err(EngineError::NotBound(this.id()));
        }
        if !self.config.version_check {
            return Ok(());
        }

        let Some(request) = I::REQUESTS.get(opcode as usize) else {
            return Ok(());
        };
        if this.version() >= request.since {
            return Ok(());
        }

        Err(EngineError::VersionTooLow {
            interface: I::NAME,
            request: request.name,
            since: request.since,
            version: this.version(),
            location: Location::caller().to_string(),
        })
    }

    /// Encode a request on `this` and hand it to the output sink.
    pub fn send<I: Interface>(
        &mut self,
        this: Proxy<I>,
        opcode: Opcode,
        args: &[Argument<'_>],
    ) -> Result<()> {
        if !self.is_bound(this.id()) {
            return Err(EngineError::NotBound(this.id()));
        }
        if self.config.wire_debug {
            debug!(
                target: "waywire::wire",
                "-> {}@{}.{}({})",
                I::NAME,
                this.id(),
                InterfaceInfo::of::<I>().request_name(opcode),
                ArgList(args)
            );
        }
        self.write_message(this.id(), opcode, args)
    }

    /// Encode a request on an object without knowing its interface.
    pub fn send_raw(&mut self, id: ObjectId, opcode: Opcode, args: &[Argument<'_>]) -> Result<()> {
        if !self.is_bound(id) {
            return Err(EngineError::NotBound(id));
        }
        if self.config.wire_debug {
            debug!(target: "waywire::wire", "-> @{id}.#{opcode}({})", ArgList(args));
        }
        self.write_message(id, opcode, args)
    }

    fn write_message(&mut self, id: ObjectId, opcode: Opcode, args: &[Argument<'_>]) -> Result<()> {
        self.out_buf.clear();
        self.out_fds.clear();
        let size = encode_message(id, opcode, args, &mut self.out_buf, &mut self.out_fds)?;
        trace!(id, opcode, size, fds = self.out_fds.len(), "writing message");
        self.sink.on_output(&self.out_buf, &self.out_fds)?;
        Ok(())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("client_objects", &self.client.live())
            .field("server_objects", &self.server.live())
            .field("config", &self.config)
            .field("pending_fds", &self.in_fds.len())
            .field("dropped", &self.dropped)
            .field("fatal", &self.fatal)
            .finish_non_exhaustive()
    }
}

struct ArgList<'a, 'b>(&'a [Argument<'b>]);

impl fmt::Display for ArgList<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::AsRawFd;

    use super::*;
    use crate::object::NewObject;
    use crate::sink::MemorySink;

    struct Gadget;

    enum GadgetEvent {
        Value(u32),
        Spawn(NewObject<Gadget>),
        Close,
    }

    impl Interface for Gadget {
        const NAME: &'static str = "test_gadget";
        const VERSION: Version = 3;
        const REQUESTS: &'static [MessageInfo] = &[
            MessageInfo {
                name: "destroy",
                signature: "",
                since: 1,
            },
            MessageInfo {
                name: "ping",
                signature: "u",
                since: 1,
            },
            MessageInfo {
                name: "frobnicate",
                signature: "u",
                since: 2,
            },
            MessageInfo {
                name: "set",
                signature: "u",
                since: 1,
            },
        ];
        const EVENTS: &'static [MessageInfo] = &[
            MessageInfo {
                name: "value",
                signature: "u",
                since: 1,
            },
            MessageInfo {
                name: "spawn",
                signature: "n",
                since: 1,
            },
            MessageInfo {
                name: "close",
                signature: "",
                since: 1,
            },
        ];

        type Event<'a> = GadgetEvent;

        fn parse_event<'a>(
            engine: &mut Engine,
            this: Proxy<Self>,
            message: Message<'a>,
        ) -> Result<GadgetEvent> {
            let mut args = message.args();
            let event = match message.opcode() {
                0 => {
                    let value = args.uint()?;
                    engine.log_event(this, 0, &[Argument::Uint(value)]);
                    GadgetEvent::Value(value)
                }
                1 => GadgetEvent::Spawn(NewObject::new(args.new_id()?, this.version())),
                2 => GadgetEvent::Close,
                opcode => {
                    return Err(EngineError::UnknownOpcode {
                        interface: Self::NAME,
                        opcode,
                    })
                }
            };
            Ok(event)
        }
    }

    struct Widget;

    impl Interface for Widget {
        const NAME: &'static str = "test_widget";
        const VERSION: Version = 1;
        const REQUESTS: &'static [MessageInfo] = &[];
        const EVENTS: &'static [MessageInfo] = &[];

        type Event<'a> = std::convert::Infallible;

        fn parse_event<'a>(
            _: &mut Engine,
            _: Proxy<Self>,
            message: Message<'a>,
        ) -> Result<std::convert::Infallible> {
            Err(EngineError::UnknownOpcode {
                interface: Self::NAME,
                opcode: message.opcode(),
            })
        }
    }

    #[derive(Debug, Default)]
    struct Recorder {
        values: Vec<u32>,
        spawned: Vec<ObjectId>,
    }

    impl Dispatch<Gadget> for Recorder {
        fn event(
            &mut self,
            engine: &mut Engine,
            this: Proxy<Gadget>,
            event: GadgetEvent,
        ) -> Result<()> {
            match event {
                GadgetEvent::Value(value) => self.values.push(value),
                GadgetEvent::Spawn(child) => {
                    let child = child.bind(engine, Recorder::default())?;
                    self.spawned.push(child.id());
                }
                GadgetEvent::Close => engine.unbind(this.id())?,
            }
            Ok(())
        }
    }

    impl Dispatch<Widget> for () {
        fn event(
            &mut self,
            _: &mut Engine,
            _: Proxy<Widget>,
            event: std::convert::Infallible,
        ) -> Result<()> {
            match event {}
        }
    }

    fn event(id: ObjectId, opcode: Opcode, args: &[Argument<'_>]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        let mut fds = Vec::new();
        encode_message(id, opcode, args, &mut buf, &mut fds).unwrap();
        buf.to_vec()
    }

    fn engine() -> (Engine, MemorySink) {
        let sink = MemorySink::new();
        let config = EngineConfig {
            debug: true,
            version_check: true,
            wire_debug: true,
        };
        (Engine::with_config(sink.clone(), config), sink)
    }

    fn values(engine: &Engine, this: Proxy<Gadget>) -> Vec<u32> {
        engine
            .handler::<Gadget, Recorder>(this)
            .map(|r| r.values.clone())
            .unwrap_or_default()
    }

    #[test]
    fn bind_reuse_and_encode_scenario() {
        let (mut engine, sink) = engine();

        let a = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();
        assert_eq!(a.id(), 1);

        engine.unbind(1).unwrap();
        assert!(engine.get_interface(1).is_none());
        assert!(!engine.is_bound(1));

        let b = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();
        let c = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();
        assert_eq!(b.id(), 1);
        assert_eq!(c.id(), 2);

        engine.check_request(c, 3).unwrap();
        engine.send(c, 3, &[Argument::Uint(9)]).unwrap();

        assert_eq!(
            sink.take_bytes(),
            vec![0x02, 0, 0, 0, 0x03, 0x00, 0x0c, 0x00, 0x09, 0, 0, 0]
        );
        assert_eq!(sink.chunks(), 1);
    }

    #[test]
    fn partial_message_is_left_for_the_caller() {
        let (mut engine, _) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let mut input = event(1, 0, &[Argument::Uint(7)]);
        input.extend(event(1, 0, &[Argument::Uint(8)]));

        let consumed = engine.process_input(&input[..15]);
        assert_eq!(consumed, 12);
        assert_eq!(values(&engine, gadget), vec![7]);

        let consumed = engine.process_input(&input[12..]);
        assert_eq!(consumed, 12);
        assert_eq!(values(&engine, gadget), vec![7, 8]);
    }

    #[test]
    fn short_input_consumes_nothing() {
        let (mut engine, _) = engine();
        engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        assert_eq!(engine.process_input(&[]), 0);
        assert_eq!(engine.process_input(&[1, 0, 0, 0, 0]), 0);
        let input = event(1, 0, &[Argument::Uint(7)]);
        assert_eq!(engine.process_input(&input[..11]), 0);
        assert!(engine.fatal_error().is_none());
    }

    #[test]
    fn unknown_object_is_dropped_and_engine_stays_usable() {
        let (mut engine, _) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let mut input = event(5, 0, &[Argument::Uint(1)]);
        input.extend(event(0, 0, &[Argument::Uint(2)]));
        input.extend(event(SERVER_ID_BASE + 4, 0, &[Argument::Uint(3)]));
        input.extend(event(1, 0, &[Argument::Uint(4)]));

        assert_eq!(engine.process_input(&input), input.len());
        assert_eq!(values(&engine, gadget), vec![4]);
        assert_eq!(engine.dropped_messages(), 3);

        let errors = engine.drain_errors();
        assert!(matches!(errors[0], EngineError::UnknownObject(5)));
        assert!(matches!(errors[1], EngineError::UnknownObject(0)));
        assert!(matches!(errors[2], EngineError::UnknownObject(id) if id == SERVER_ID_BASE + 4));
        assert!(engine.drain_errors().is_empty());
    }

    #[test]
    fn bad_arguments_and_opcodes_are_reported_per_message() {
        let (mut engine, _) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let mut input = event(1, 9, &[]);
        // value event with no argument
        input.extend(event(1, 0, &[]));
        input.extend(event(1, 0, &[Argument::Uint(5)]));

        assert_eq!(engine.process_input(&input), input.len());
        assert_eq!(values(&engine, gadget), vec![5]);

        let errors = engine.drain_errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            EngineError::UnknownOpcode {
                interface: "test_gadget",
                opcode: 9
            }
        ));
        assert!(matches!(errors[1], EngineError::Wire(_)));
        assert!(engine.is_bound(gadget.id()));
    }

    #[test]
    fn undersized_header_is_fatal() {
        let (mut engine, _) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let mut input = event(1, 0, &[Argument::Uint(1)]);
        // size field of 4 cannot hold the header
        input.extend([1, 0, 0, 0, 0, 0, 4, 0]);
        input.extend(event(1, 0, &[Argument::Uint(2)]));

        assert_eq!(engine.process_input(&input), 12);
        assert!(matches!(
            engine.fatal_error(),
            Some(EngineError::Wire(waywire_wire::WireError::InvalidMessageSize { size: 4 }))
        ));
        assert_eq!(engine.process_input(&input[12..]), 0);
        assert_eq!(values(&engine, gadget), vec![1]);
    }

    #[test]
    fn error_queue_is_bounded() {
        let (mut engine, _) = engine();
        let input = event(42, 0, &[]);
        for _ in 0..100 {
            engine.process_input(&input);
        }
        assert_eq!(engine.dropped_messages(), 100);
        assert_eq!(engine.drain_errors().len(), MAX_QUEUED_ERRORS);
    }

    #[test]
    fn handler_binds_server_object_during_dispatch() {
        let (mut engine, _) = engine();
        let parent = engine.create::<Gadget, _>(Recorder::default(), 2).unwrap();

        let child_id = SERVER_ID_BASE;
        let mut input = event(1, 1, &[Argument::NewId(child_id)]);
        input.extend(event(child_id, 0, &[Argument::Uint(11)]));
        assert_eq!(engine.process_input(&input), input.len());
        assert!(engine.drain_errors().is_empty());

        let spawned = engine
            .handler::<Gadget, Recorder>(parent)
            .map(|r| r.spawned.clone())
            .unwrap();
        assert_eq!(spawned, vec![child_id]);

        let child = engine.proxy::<Gadget>(child_id).unwrap();
        assert_eq!(child.version(), 2);
        assert_eq!(values(&engine, child), vec![11]);
        assert_eq!(engine.live_objects(), 2);
    }

    #[test]
    fn peer_reusing_a_live_id_is_reported() {
        let (mut engine, _) = engine();
        engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let spawn = event(1, 1, &[Argument::NewId(SERVER_ID_BASE)]);
        engine.process_input(&spawn);
        engine.process_input(&spawn);

        let errors = engine.drain_errors();
        assert!(matches!(errors.as_slice(), [EngineError::IdInUse(id)] if *id == SERVER_ID_BASE));
    }

    #[test]
    fn object_can_unbind_itself_while_dispatching() {
        let (mut engine, _) = engine();
        engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();
        let other = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let close = event(1, 2, &[]);
        assert_eq!(engine.process_input(&close), close.len());
        assert!(engine.drain_errors().is_empty());
        assert!(!engine.is_bound(1));
        assert!(engine.is_bound(other.id()));

        // message for the released id is now unknown
        engine.process_input(&close);
        assert!(matches!(
            engine.drain_errors().as_slice(),
            [EngineError::UnknownObject(1)]
        ));

        let again = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();
        assert_eq!(again.id(), 1);
    }

    #[test]
    fn namespaces_stay_separate() {
        let (mut engine, _) = engine();
        for _ in 0..50 {
            let a = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();
            let b = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();
            assert!(a.id() < SERVER_ID_BASE && b.id() < SERVER_ID_BASE);
            engine.unbind(a.id()).unwrap();
        }

        engine
            .bind_at(SERVER_ID_BASE, Box::new(Instance::<Widget, ()>::new(())), 1)
            .unwrap();
        assert!(engine.get_interface(SERVER_ID_BASE).is_some());
        assert!(matches!(
            engine.bind_at(3, Box::new(Instance::<Widget, ()>::new(())), 1),
            Err(EngineError::IdInUse(3))
        ));

        let ids: Vec<_> = engine.objects().map(|(id, _)| id).collect();
        assert_eq!(ids.last(), Some(&SERVER_ID_BASE));
        assert!(ids[..ids.len() - 1].iter().all(|id| *id < SERVER_ID_BASE));
    }

    #[test]
    fn unbind_reports_range_and_release_distinctly() {
        let (mut engine, _) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        assert!(matches!(engine.unbind(7), Err(EngineError::IdOutOfRange(7))));
        engine.unbind(gadget.id()).unwrap();
        assert!(matches!(
            engine.unbind(gadget.id()),
            Err(EngineError::AlreadyReleased(1))
        ));
    }

    #[test]
    fn version_check_names_the_call_site() {
        let (mut engine, sink) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let err = engine.check_request(gadget, 2).unwrap_err();
        match err {
            EngineError::VersionTooLow {
                interface,
                request,
                since,
                version,
                location,
            } => {
                assert_eq!(interface, "test_gadget");
                assert_eq!(request, "frobnicate");
                assert_eq!((since, version), (2, 1));
                assert!(location.contains("engine.rs"), "{location}");
            }
            other => panic!("unexpected error: {other}"),
        }

        engine.config_mut().version_check = false;
        engine.check_request(gadget, 2).unwrap();
        engine.send(gadget, 2, &[Argument::Uint(1)]).unwrap();
        assert_eq!(sink.chunks(), 1);
    }

    #[test]
    fn requests_on_unbound_objects_fail() {
        let (mut engine, sink) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();
        engine.unbind(gadget.id()).unwrap();

        assert!(matches!(
            engine.check_request(gadget, 1),
            Err(EngineError::NotBound(1))
        ));
        assert!(matches!(
            engine.send(gadget, 1, &[Argument::Uint(0)]),
            Err(EngineError::NotBound(1))
        ));
        assert!(matches!(
            engine.send_raw(1, 1, &[]),
            Err(EngineError::NotBound(1))
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn fds_travel_beside_the_bytes() {
        let (mut engine, sink) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        engine
            .send(gadget, 1, &[Argument::Fd(7), Argument::Uint(1), Argument::Fd(9)])
            .unwrap();
        assert_eq!(sink.take_bytes().len(), 12);
        assert_eq!(sink.take_fds(), vec![7, 9]);
        assert_eq!(sink.chunks(), 1);

        let first = OwnedFd::from(std::fs::File::open("/dev/null").unwrap());
        let second = OwnedFd::from(std::fs::File::open("/dev/null").unwrap());
        let first_raw = first.as_raw_fd();
        engine.queue_fds([first, second]);
        let popped = engine.incoming_fds().pop_front().unwrap();
        assert_eq!(popped.as_raw_fd(), first_raw);
        assert_eq!(engine.incoming_fds().len(), 1);
    }

    #[test]
    fn peer_cannot_grow_the_server_table_out_of_sequence() {
        let (mut engine, _) = engine();
        engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let far = event(1, 1, &[Argument::NewId(ObjectId::MAX - 1)]);
        assert_eq!(engine.process_input(&far), far.len());
        assert!(matches!(
            engine.drain_errors().as_slice(),
            [EngineError::IdOutOfRange(id)] if *id == ObjectId::MAX - 1
        ));
        assert_eq!(engine.server.len(), 0);

        let gap = event(1, 1, &[Argument::NewId(SERVER_ID_BASE + 1)]);
        engine.process_input(&gap);
        assert_eq!(engine.drain_errors().len(), 1);

        let next = event(1, 1, &[Argument::NewId(SERVER_ID_BASE)]);
        engine.process_input(&next);
        assert!(engine.drain_errors().is_empty());
        assert_eq!(engine.server.len(), 1);
        assert!(engine.is_bound(SERVER_ID_BASE));
    }

    #[test]
    fn oversized_request_is_refused() {
        let (mut engine, sink) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        let big = vec![0u8; 70_000];
        let err = engine.send(gadget, 1, &[Argument::Array(&big)]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Wire(waywire_wire::WireError::MessageTooLarge { .. })
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn sink_failure_surfaces_as_output_error() {
        let failing = |_: &[u8], _: &[RawFd]| -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        };
        let mut engine = Engine::with_config(failing, EngineConfig::release());
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 1).unwrap();

        assert!(matches!(
            engine.send(gadget, 1, &[Argument::Uint(0)]),
            Err(EngineError::Output(_))
        ));

        let previous = engine.set_output(MemorySink::new());
        drop(previous);
        engine.send(gadget, 1, &[Argument::Uint(0)]).unwrap();
    }

    #[test]
    fn proxy_checks_interface() {
        let (mut engine, _) = engine();
        let gadget = engine.create::<Gadget, _>(Recorder::default(), 3).unwrap();

        let resolved = engine.proxy::<Gadget>(gadget.id()).unwrap();
        assert_eq!(resolved, gadget);

        assert!(matches!(
            engine.proxy::<Widget>(gadget.id()),
            Err(EngineError::InterfaceMismatch {
                expected: "test_widget",
                found: "test_gadget",
                ..
            })
        ));
        assert!(matches!(
            engine.proxy::<Gadget>(40),
            Err(EngineError::NotBound(40))
        ));
        let wrong = Proxy::<Widget>::new(gadget.id(), 3);
        assert!(engine.handler::<Widget, ()>(wrong).is_none());
    }

    #[test]
    fn root_lands_at_display_id() {
        let (mut engine, _) = engine();
        let root = engine.create_root::<Widget, _>(()).unwrap();
        assert_eq!(root.id(), DISPLAY_ID);
        assert_eq!(root.version(), Widget::VERSION);
    }

    #[test]
    #[should_panic(expected = "must be the first object bound")]
    fn second_root_panics_with_debug_checks() {
        let (mut engine, _) = engine();
        engine.create_root::<Widget, _>(()).unwrap();
        let _ = engine.create_root::<Widget, _>(());
    }

    #[test]
    fn second_root_is_accepted_without_debug_checks() {
        let mut engine = Engine::with_config(MemorySink::new(), EngineConfig::release());
        engine.create_root::<Widget, _>(()).unwrap();
        let second = engine.create_root::<Widget, _>(()).unwrap();
        assert_eq!(second.id(), 2);
    }
}
