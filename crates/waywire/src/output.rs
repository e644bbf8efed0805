use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use waywire::protocol::Global;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GlobalRow<'a> {
    pub name: u32,
    pub interface: &'a str,
    pub version: u32,
}

impl<'a> From<&'a Global> for GlobalRow<'a> {
    fn from(global: &'a Global) -> Self {
        Self {
            name: global.name,
            interface: &global.interface,
            version: global.version,
        }
    }
}

#[derive(Serialize)]
struct GlobalsOutput<'a> {
    socket: &'a str,
    count: usize,
    globals: Vec<GlobalRow<'a>>,
}

pub fn print_globals(socket: &str, globals: &[Global], format: OutputFormat) {
    let rows: Vec<GlobalRow<'_>> = globals.iter().map(GlobalRow::from).collect();
    match format {
        OutputFormat::Json => {
            let out = GlobalsOutput {
                socket,
                count: rows.len(),
                globals: rows,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["NAME", "INTERFACE", "VERSION"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.interface.to_string(),
                    row.version.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{socket}: {} globals", rows.len());
            for row in &rows {
                println!("  {:>4}  {:<40} v{}", row.name, row.interface, row.version);
            }
        }
        OutputFormat::Raw => {
            for row in &rows {
                println!("{} {} {}", row.name, row.interface, row.version);
            }
        }
    }
}

/// A registry event observed by `monitor`.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent<'a> {
    Global {
        name: u32,
        interface: &'a str,
        version: u32,
    },
    GlobalRemove {
        name: u32,
    },
}

#[derive(Serialize)]
struct EventOutput<'a> {
    #[serde(flatten)]
    event: &'a RegistryEvent<'a>,
    timestamp: String,
}

pub fn print_registry_event(event: &RegistryEvent<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                event,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => match event {
            RegistryEvent::Global {
                name,
                interface,
                version,
            } => println!("+ {name:>4}  {interface} v{version}"),
            RegistryEvent::GlobalRemove { name } => println!("- {name:>4}"),
        },
        OutputFormat::Raw => match event {
            RegistryEvent::Global {
                name,
                interface,
                version,
            } => println!("global {name} {interface} {version}"),
            RegistryEvent::GlobalRemove { name } => println!("global_remove {name}"),
        },
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
