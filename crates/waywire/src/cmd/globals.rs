use waywire::protocol::{DisplayRequests, Globals, WlRegistry};

use crate::cmd::{connect, parse_timeout, socket_label, GlobalsArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_globals, OutputFormat};

pub fn run(args: GlobalsArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let mut conn = connect(args.socket.as_deref())?;
    conn.socket()
        .set_read_timeout(Some(timeout))
        .map_err(|err| transport_error("socket setup failed", err))?;

    let display = conn.display();
    let registry = display
        .get_registry(conn.engine_mut(), Globals::default())
        .map_err(|err| transport_error("get_registry failed", err.into()))?;
    conn.roundtrip()
        .map_err(|err| transport_error("roundtrip failed", err))?;

    let globals = conn
        .engine()
        .handler::<WlRegistry, Globals>(registry)
        .ok_or_else(|| CliError::new(INTERNAL, "registry handler missing after roundtrip"))?;

    let mut list = globals.list().to_vec();
    if let Some(filter) = &args.interface {
        list.retain(|global| global.interface.contains(filter.as_str()));
    }

    print_globals(&socket_label(&conn), &list, format);
    Ok(SUCCESS)
}
