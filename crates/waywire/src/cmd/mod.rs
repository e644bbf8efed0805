use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use tracing::debug;
use waywire::engine::EngineConfig;
use waywire::transport::{Connection, WaylandSocket};

use crate::exit::{transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod doctor;
pub mod envinfo;
pub mod globals;
pub mod monitor;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the globals the compositor advertises.
    Globals(GlobalsArgs),
    /// Print registry events as they arrive.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Check that a compositor is reachable.
    Doctor(DoctorArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Globals(args) => globals::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct GlobalsArgs {
    /// Compositor socket. Default: resolved from WAYLAND_DISPLAY and XDG_RUNTIME_DIR.
    #[arg(long, value_name = "PATH")]
    pub socket: Option<PathBuf>,
    /// Only list globals whose interface name contains this string.
    #[arg(long)]
    pub interface: Option<String>,
    /// Maximum time to wait for the compositor (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Compositor socket. Default: resolved from WAYLAND_DISPLAY and XDG_RUNTIME_DIR.
    #[arg(long, value_name = "PATH")]
    pub socket: Option<PathBuf>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// Compositor socket. Default: resolved from WAYLAND_DISPLAY and XDG_RUNTIME_DIR.
    #[arg(long, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

/// Open a connection to `socket`, or to the compositor named by the
/// environment when no path is given.
pub fn connect(socket: Option<&Path>) -> CliResult<Connection> {
    let socket = match socket {
        Some(path) => WaylandSocket::connect_to(path),
        None => WaylandSocket::connect(),
    }
    .map_err(|err| transport_error("connect failed", err))?;
    debug!(socket = ?socket.path(), "connected");

    Connection::new(socket, EngineConfig::from_env())
        .map_err(|err| transport_error("connection setup failed", err))
}

pub fn socket_label(conn: &Connection) -> String {
    conn.socket()
        .path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unnamed>".to_string())
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
