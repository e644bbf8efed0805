//! `wl_registry`: announces globals and binds them to client objects.

use waywire_engine::wire::{Argument, Message, ZStr};
use waywire_engine::{
    Dispatch, Engine, EngineError, Interface, MessageInfo, Opcode, Proxy, Result, Version,
};

use crate::send_constructor;

pub struct WlRegistry;

const BIND: Opcode = 0;

const REQUESTS: &[MessageInfo] = &[MessageInfo {
    name: "bind",
    signature: "usun",
    since: 1,
}];

const EVENTS: &[MessageInfo] = &[
    MessageInfo {
        name: "global",
        signature: "usu",
        since: 1,
    },
    MessageInfo {
        name: "global_remove",
        signature: "u",
        since: 1,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    /// A global is available under the numeric `name`.
    Global {
        name: u32,
        interface: ZStr<'a>,
        version: u32,
    },
    /// The global is gone. Objects already bound to it stay valid until
    /// the client destroys them.
    GlobalRemove { name: u32 },
}

impl Interface for WlRegistry {
    const NAME: &'static str = "wl_registry";
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
                let name = args.uint()?;
                let interface = args.string()?;
                let version = args.uint()?;
                engine.log_event(
                    this,
                    0,
                    &[
                        Argument::Uint(name),
                        Argument::from(interface),
                        Argument::Uint(version),
                    ],
                );
                Ok(Event::Global {
                    name,
                    interface,
                    version,
                })
            }
            1 => {
                let name = args.uint()?;
                engine.log_event(this, 1, &[Argument::Uint(name)]);
                Ok(Event::GlobalRemove { name })
            }
            opcode => Err(EngineError::UnknownOpcode {
                interface: Self::NAME,
                opcode,
            }),
        }
    }
}

/// Requests on the registry.
pub trait RegistryRequests {
    /// Bind global `name` as a new object of interface `I` at `version`.
    ///
    /// `version` must not exceed what the global advertised nor what `I`
    /// supports; [`Globals::bind`] picks the highest common version.
    fn bind<I: Interface, H: Dispatch<I>>(
        self,
        engine: &mut Engine,
        name: u32,
        version: Version,
        handler: H,
    ) -> Result<Proxy<I>>;
}

impl RegistryRequests for Proxy<WlRegistry> {
    #[track_caller]
    fn bind<I: Interface, H: Dispatch<I>>(
        self,
        engine: &mut Engine,
        name: u32,
        version: Version,
        handler: H,
    ) -> Result<Proxy<I>> {
        engine.check_request(self, BIND)?;
        let object = engine.create::<I, H>(handler, version)?;
        send_constructor(
            engine,
            self,
            BIND,
            object,
            &[
                Argument::Uint(name),
                Argument::NewIdDynamic {
                    interface: I::NAME,
                    version,
                    id: object.id(),
                },
            ],
        )
    }
}

/// One advertised global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub name: u32,
    pub interface: String,
    pub version: u32,
}

/// Registry handler that keeps the current list of globals.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    globals: Vec<Global>,
}

impl Globals {
    /// Globals in announcement order.
    pub fn list(&self) -> &[Global] {
        &self.globals
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    /// First global advertising `interface`.
    pub fn find(&self, interface: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.interface == interface)
    }

    /// Bind the first global of interface `I` at the highest version both
    /// sides support. Returns `Ok(None)` if no such global is advertised.
    #[track_caller]
    pub fn bind<I: Interface, H: Dispatch<I>>(
        &self,
        engine: &mut Engine,
        registry: Proxy<WlRegistry>,
        handler: H,
    ) -> Result<Option<Proxy<I>>> {
        let Some(global) = self.find(I::NAME) else {
            return Ok(None);
        };
        let version = global.version.min(I::VERSION);
        registry
            .bind::<I, H>(engine, global.name, version, handler)
            .map(Some)
    }
}

impl Dispatch<WlRegistry> for Globals {
    fn event(&mut self, _: &mut Engine, _: Proxy<WlRegistry>, event: Event<'_>) -> Result<()> {
        match event {
            Event::Global {
                name,
                interface,
                version,
            } => {
                let global = Global {
                    name,
                    interface: String::from_utf8_lossy(interface.as_bytes()).into_owned(),
                    version,
                };
                match self.globals.iter_mut().find(|g| g.name == name) {
                    Some(existing) => *existing = global,
                    None => self.globals.push(global),
                }
            }
            Event::GlobalRemove { name } => self.globals.retain(|g| g.name != name),
        }
        Ok(())
    }
}
