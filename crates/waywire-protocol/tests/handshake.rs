//! Client side of a typical startup exchange against a scripted compositor.

use bytes::BytesMut;
use waywire_engine::wire::{encode_message, Argument, Message};
use waywire_engine::{
    Dispatch, Engine, EngineConfig, EngineError, Interface, MemorySink, MessageInfo, ObjectId,
    Opcode, Proxy, Result, Version,
};
use waywire_protocol::wl_display::{self, DisplayRequests};
use waywire_protocol::{Completion, Display, Globals, WlDisplay, WlRegistry};

struct WlShm;

#[derive(Debug, PartialEq, Eq)]
enum ShmEvent {
    Format(u32),
}

impl Interface for WlShm {
    const NAME: &'static str = "wl_shm";
    const VERSION: Version = 1;
    const REQUESTS: &'static [MessageInfo] = &[];
    const EVENTS: &'static [MessageInfo] = &[MessageInfo {
        name: "format",
        signature: "u",
        since: 1,
    }];

    type Event<'a> = ShmEvent;

    fn parse_event<'a>(_: &mut Engine, _: Proxy<Self>, message: Message<'a>) -> Result<ShmEvent> {
        match message.opcode() {
            0 => Ok(ShmEvent::Format(message.args().uint()?)),
            opcode => Err(EngineError::UnknownOpcode {
                interface: Self::NAME,
                opcode,
            }),
        }
    }
}

#[derive(Default)]
struct Formats(Vec<u32>);

impl Dispatch<WlShm> for Formats {
    fn event(&mut self, _: &mut Engine, _: Proxy<WlShm>, event: ShmEvent) -> Result<()> {
        let ShmEvent::Format(format) = event;
        self.0.push(format);
        Ok(())
    }
}

fn wire(id: ObjectId, opcode: Opcode, args: &[Argument<'_>]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_message(id, opcode, args, &mut buf, &mut Vec::new()).unwrap();
    buf.to_vec()
}

#[test]
fn registry_roundtrip_and_bind() {
    let sink = MemorySink::new();
    let mut engine = Engine::with_config(sink.clone(), EngineConfig::default());

    let display = wl_display::bind(&mut engine).unwrap();
    let registry = display.get_registry(&mut engine, Globals::default()).unwrap();
    let done = Completion::new();
    let callback = display.sync(&mut engine, done.clone()).unwrap();
    assert_eq!((registry.id(), callback.id()), (2, 3));

    let mut expected = wire(1, 1, &[Argument::NewId(2)]);
    expected.extend(wire(1, 0, &[Argument::NewId(3)]));
    assert_eq!(sink.take_bytes(), expected);

    // compositor answers: globals, then the sync callback and its deletion
    let mut input = wire(
        2,
        0,
        &[Argument::Uint(1), Argument::str("wl_compositor"), Argument::Uint(6)],
    );
    input.extend(wire(
        2,
        0,
        &[Argument::Uint(7), Argument::str("wl_shm"), Argument::Uint(2)],
    ));
    input.extend(wire(3, 0, &[Argument::Uint(55)]));
    input.extend(wire(1, 1, &[Argument::Uint(3)]));

    // delivered in two reads, split inside the second global
    let split = 50;
    let consumed = engine.process_input(&input[..split]);
    assert_eq!(consumed, 36);
    let mut pending = input[consumed..split].to_vec();
    pending.extend_from_slice(&input[split..]);
    assert_eq!(engine.process_input(&pending), pending.len());
    assert!(engine.drain_errors().is_empty());

    assert_eq!(done.data(), Some(55));
    assert!(!engine.is_bound(callback.id()));

    let globals = engine
        .handler::<WlRegistry, Globals>(registry)
        .cloned()
        .unwrap();
    assert_eq!(globals.len(), 2);

    let shm = globals
        .bind::<WlShm, _>(&mut engine, registry, Formats::default())
        .unwrap()
        .unwrap();
    // id 3 was released by delete_id and is reused
    assert_eq!(shm.id(), 3);
    assert_eq!(shm.version(), 1);

    let bind = wire(
        2,
        0,
        &[
            Argument::Uint(7),
            Argument::NewIdDynamic {
                interface: "wl_shm",
                version: 1,
                id: 3,
            },
        ],
    );
    assert_eq!(bind.len(), 32);
    assert_eq!(sink.take_bytes(), bind);

    let mut formats = wire(3, 0, &[Argument::Uint(0)]);
    formats.extend(wire(3, 0, &[Argument::Uint(1)]));
    engine.process_input(&formats);
    assert_eq!(
        engine.handler::<WlShm, Formats>(shm).map(|f| f.0.clone()),
        Some(vec![0, 1])
    );

    assert!(globals.find("xdg_wm_base").is_none());
}

#[test]
fn protocol_error_is_visible_on_the_display() {
    let mut engine = Engine::with_config(MemorySink::new(), EngineConfig::release());
    let display = wl_display::bind(&mut engine).unwrap();

    let input = wire(
        1,
        0,
        &[
            Argument::Object(Some(1)),
            Argument::Uint(1),
            Argument::str("invalid method 9, object wl_display@1"),
        ],
    );
    engine.process_input(&input);

    let error = engine
        .handler::<WlDisplay, Display>(display)
        .and_then(Display::error)
        .unwrap();
    assert_eq!(error.object_id, 1);
    assert!(error.message.contains("invalid method"));
}
