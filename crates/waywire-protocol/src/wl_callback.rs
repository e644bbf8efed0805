//! `wl_callback`: a one-shot notification.

use std::cell::Cell;
use std::rc::Rc;

use waywire_engine::wire::{Argument, Message};
use waywire_engine::{
    Dispatch, Engine, EngineError, Interface, MessageInfo, Proxy, Result, Version,
};

pub struct WlCallback;

const EVENTS: &[MessageInfo] = &[MessageInfo {
    name: "done",
    signature: "u",
    since: 1,
}];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The request completed. The compositor destroys the callback right
    /// after sending this.
    Done { callback_data: u32 },
}

impl Interface for WlCallback {
    const NAME: &'static str = "wl_callback";
    const VERSION: Version = 1;
    const REQUESTS: &'static [MessageInfo] = &[];
    const EVENTS: &'static [MessageInfo] = EVENTS;

    type Event<'a> = Event;

    fn parse_event<'a>(
        engine: &mut Engine,
        this: Proxy<Self>,
        message: Message<'a>,
    ) -> Result<Event> {
        let mut args = message.args();
        match message.opcode() {
            0 => {
                let callback_data = args.uint()?;
                engine.log_event(this, 0, &[Argument::Uint(callback_data)]);
                Ok(Event::Done { callback_data })
            }
            opcode => Err(EngineError::UnknownOpcode {
                interface: Self::NAME,
                opcode,
            }),
        }
    }
}

/// Callback handler that records completion in a shared cell.
///
/// Keep one clone and give the other to the engine; the engine's copy is
/// dropped when the compositor deletes the callback id, while the state
/// stays readable through the kept clone.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    data: Rc<Cell<Option<u32>>>,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.data.get().is_some()
    }

    /// The `callback_data` of the `done` event, once received.
    pub fn data(&self) -> Option<u32> {
        self.data.get()
    }
}

impl Dispatch<WlCallback> for Completion {
    fn event(&mut self, _: &mut Engine, _: Proxy<WlCallback>, event: Event) -> Result<()> {
        let Event::Done { callback_data } = event;
        self.data.set(Some(callback_data));
        Ok(())
    }
}

/// Callback handler that runs a closure on `done`.
pub struct OnDone<F>(pub F);

impl<F> Dispatch<WlCallback> for OnDone<F>
where
    F: FnMut(&mut Engine, u32) -> Result<()> + 'static,
{
    fn event(&mut self, engine: &mut Engine, _: Proxy<WlCallback>, event: Event) -> Result<()> {
        let Event::Done { callback_data } = event;
        (self.0)(engine, callback_data)
    }
}
