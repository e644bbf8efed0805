use clap::ValueEnum;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

/// Target the engine traces every sent and received message on.
pub const WIRE_TARGET: &str = "waywire::wire";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Whether a `WAYLAND_DEBUG` value asks for client-side wire tracing.
pub fn wire_requested(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1" | "client"))
}

/// Per-target filter: everything at `level`, wire traffic at debug when
/// `wire` is set no matter how quiet the rest is.
pub fn filter(level: LogLevel, wire: bool) -> Targets {
    let targets = Targets::new().with_default(level.as_filter());
    if wire {
        targets.with_target(WIRE_TARGET, LevelFilter::DEBUG)
    } else {
        targets
    }
}

/// Install the stderr subscriber.
///
/// Targets are printed so wire lines can be told apart from engine
/// diagnostics.
pub fn init_logging(format: LogFormat, level: LogLevel, wire: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(filter(level, wire));

    let installed = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    if let Err(err) = installed {
        eprintln!("warning: keeping existing log subscriber: {err}");
    }
}
