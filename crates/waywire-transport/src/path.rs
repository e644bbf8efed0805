use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Result, TransportError};

/// Display name used when `WAYLAND_DISPLAY` is unset.
pub const DEFAULT_DISPLAY: &str = "wayland-0";

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 elsewhere.
#[cfg(target_os = "linux")]
pub(crate) const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
pub(crate) const MAX_PATH_LEN: usize = 104;

/// Resolve the compositor socket from the environment.
///
/// `WAYLAND_DISPLAY` (default `wayland-0`) is used as-is when absolute and
/// otherwise joined onto `XDG_RUNTIME_DIR`, which must then be set and
/// absolute.
pub fn socket_path() -> Result<PathBuf> {
    resolve(|name| std::env::var_os(name))
}

pub(crate) fn resolve(lookup: impl Fn(&str) -> Option<OsString>) -> Result<PathBuf> {
    let display = lookup("WAYLAND_DISPLAY")
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DISPLAY.into());
    let display = PathBuf::from(display);

    let path = if display.is_absolute() {
        display
    } else {
        let runtime_dir = lookup("XDG_RUNTIME_DIR")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .ok_or(TransportError::NoRuntimeDir)?;
        if !runtime_dir.is_absolute() {
            return Err(TransportError::RelativeRuntimeDir(runtime_dir));
        }
        runtime_dir.join(display)
    };

    check_len(&path)?;
    Ok(path)
}

pub(crate) fn check_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}
