use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use waywire::engine::EngineConfig;
use waywire::protocol::{DisplayRequests, Globals, WlRegistry};
use waywire::transport::socket_path;

use crate::cmd::{connect, DoctorArgs};
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let mut checks = vec![
        platform_transport_check(),
        runtime_dir_check(std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from)),
        display_name_check(std::env::var("WAYLAND_DISPLAY").ok()),
        engine_config_check(EngineConfig::from_env()),
    ];

    let path = match args.socket {
        Some(path) => Some(path),
        None => match socket_path() {
            Ok(path) => Some(path),
            Err(err) => {
                checks.push(CheckResult::new(
                    "socket_path",
                    CheckStatus::Fail,
                    err.to_string(),
                ));
                None
            }
        },
    };

    match path {
        Some(path) => {
            let socket = socket_file_check(&path);
            let reachable = matches!(socket.status, CheckStatus::Pass);
            checks.push(socket);
            if reachable {
                checks.extend(connection_checks(&path));
            } else {
                checks.push(CheckResult::new(
                    "roundtrip",
                    CheckStatus::Skip,
                    "no socket to connect to",
                ));
            }
        }
        None => checks.push(CheckResult::new(
            "roundtrip",
            CheckStatus::Skip,
            "socket path unresolved",
        )),
    }

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("waywire doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn platform_transport_check() -> CheckResult {
    if cfg!(unix) {
        CheckResult::new(
            "platform_transport",
            CheckStatus::Pass,
            "Unix domain sockets available",
        )
    } else {
        CheckResult::new(
            "platform_transport",
            CheckStatus::Fail,
            "Wayland requires Unix domain sockets",
        )
    }
}

fn runtime_dir_check(dir: Option<PathBuf>) -> CheckResult {
    let Some(dir) = dir.filter(|dir| !dir.as_os_str().is_empty()) else {
        return CheckResult::new("runtime_dir", CheckStatus::Warn, "XDG_RUNTIME_DIR not set");
    };
    if !dir.is_absolute() {
        return CheckResult::new(
            "runtime_dir",
            CheckStatus::Fail,
            format!("{} is not absolute", dir.display()),
        );
    }
    if !dir.is_dir() {
        return CheckResult::new(
            "runtime_dir",
            CheckStatus::Fail,
            format!("{} is not a directory", dir.display()),
        );
    }
    CheckResult::new("runtime_dir", CheckStatus::Pass, dir.display().to_string())
}

fn display_name_check(display: Option<String>) -> CheckResult {
    match display.filter(|value| !value.is_empty()) {
        Some(name) => CheckResult::new("wayland_display", CheckStatus::Pass, name),
        None => CheckResult::new(
            "wayland_display",
            CheckStatus::Info,
            "WAYLAND_DISPLAY not set, using wayland-0",
        ),
    }
}

fn engine_config_check(config: EngineConfig) -> CheckResult {
    CheckResult::new(
        "engine_config",
        CheckStatus::Info,
        format!(
            "debug={} version_check={} wire_debug={}",
            config.debug, config.version_check, config.wire_debug
        ),
    )
}

fn socket_file_check(path: &Path) -> CheckResult {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        match std::fs::metadata(path) {
            Ok(meta) if meta.file_type().is_socket() => {
                CheckResult::new("socket", CheckStatus::Pass, path.display().to_string())
            }
            Ok(_) => CheckResult::new(
                "socket",
                CheckStatus::Fail,
                format!("{} is not a socket", path.display()),
            ),
            Err(err) => CheckResult::new(
                "socket",
                CheckStatus::Fail,
                format!("{}: {err}", path.display()),
            ),
        }
    }

    #[cfg(not(unix))]
    {
        CheckResult::new(
            "socket",
            CheckStatus::Skip,
            format!("cannot inspect {} on this platform", path.display()),
        )
    }
}

fn connection_checks(path: &Path) -> Vec<CheckResult> {
    let mut conn = match connect(Some(path)) {
        Ok(conn) => conn,
        Err(err) => return vec![CheckResult::new("roundtrip", CheckStatus::Fail, err.message)],
    };
    if let Err(err) = conn.socket().set_read_timeout(Some(PROBE_TIMEOUT)) {
        return vec![CheckResult::new("roundtrip", CheckStatus::Fail, err.to_string())];
    }

    let display = conn.display();
    let registry = match display.get_registry(conn.engine_mut(), Globals::default()) {
        Ok(registry) => registry,
        Err(err) => return vec![CheckResult::new("roundtrip", CheckStatus::Fail, err.to_string())],
    };

    let start = Instant::now();
    let roundtrip = match conn.roundtrip() {
        Ok(()) => {
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            let globals = conn
                .engine()
                .handler::<WlRegistry, Globals>(registry)
                .map_or(0, Globals::len);
            CheckResult::new(
                "roundtrip",
                CheckStatus::Pass,
                format!("{globals} globals in {elapsed_ms:.2}ms"),
            )
        }
        Err(err) => CheckResult::new("roundtrip", CheckStatus::Fail, err.to_string()),
    };

    let credentials = match conn.socket().peer_credentials() {
        Some((uid, gid, pid)) => CheckResult::new(
            "peer_credentials",
            CheckStatus::Info,
            format!("uid={uid} gid={gid} pid={pid}"),
        ),
        None => CheckResult::new("peer_credentials", CheckStatus::Skip, "unavailable"),
    };

    vec![roundtrip, credentials]
}
