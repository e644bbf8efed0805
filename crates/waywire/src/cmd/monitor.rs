use std::cell::Cell;
use std::io::ErrorKind;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use waywire::engine::{Dispatch, Engine, Proxy, Result};
use waywire::protocol::wl_registry::Event;
use waywire::protocol::{DisplayRequests, WlRegistry};
use waywire::transport::TransportError;

use crate::cmd::{connect, socket_label, MonitorArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_registry_event, OutputFormat, RegistryEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Registry handler that prints each event, up to an optional limit.
struct Printer {
    format: OutputFormat,
    limit: Option<usize>,
    printed: Rc<Cell<usize>>,
}

impl Printer {
    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.printed.get() >= limit)
    }
}

impl Dispatch<WlRegistry> for Printer {
    fn event(&mut self, _: &mut Engine, _: Proxy<WlRegistry>, event: Event<'_>) -> Result<()> {
        if self.exhausted() {
            return Ok(());
        }
        match event {
            Event::Global {
                name,
                interface,
                version,
            } => {
                let interface = String::from_utf8_lossy(interface.as_bytes());
                let event = RegistryEvent::Global {
                    name,
                    interface: &interface,
                    version,
                };
                print_registry_event(&event, self.format);
            }
            Event::GlobalRemove { name } => {
                print_registry_event(&RegistryEvent::GlobalRemove { name }, self.format);
            }
        }
        self.printed.set(self.printed.get() + 1);
        Ok(())
    }
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let mut conn = connect(args.socket.as_deref())?;
    info!(socket = %socket_label(&conn), "monitoring registry");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    conn.socket()
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(|err| transport_error("socket setup failed", err))?;

    let printed = Rc::new(Cell::new(0usize));
    let printer = Printer {
        format,
        limit: args.count,
        printed: printed.clone(),
    };
    let display = conn.display();
    display
        .get_registry(conn.engine_mut(), printer)
        .map_err(|err| transport_error("get_registry failed", err.into()))?;

    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| printed.get() >= count) {
            break;
        }
        match conn.dispatch_pending() {
            Ok(_) => {}
            Err(TransportError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) => return Err(transport_error("dispatch failed", err)),
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
