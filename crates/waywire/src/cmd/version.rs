use waywire::engine::{Interface, CLIENT_ID_BASE, SERVER_ID_BASE};
use waywire::protocol::{WlCallback, WlDisplay, WlRegistry};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("waywire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: waywire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "interfaces: {} v{}, {} v{}, {} v{}",
        WlDisplay::NAME,
        WlDisplay::VERSION,
        WlRegistry::NAME,
        WlRegistry::VERSION,
        WlCallback::NAME,
        WlCallback::VERSION
    );
    println!("client_ids: {CLIENT_ID_BASE:#010x}..{SERVER_ID_BASE:#010x}");
    println!("server_ids: {SERVER_ID_BASE:#010x}..");

    Ok(SUCCESS)
}
