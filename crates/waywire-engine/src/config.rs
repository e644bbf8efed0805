/// Runtime switches for the engine's debug behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Enable integration checks that panic on misuse (double display binding).
    pub debug: bool,
    /// Refuse requests that need a newer version than the object negotiated.
    pub version_check: bool,
    /// Trace every message sent and received on target `waywire::wire`.
    pub wire_debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let debug = cfg!(debug_assertions);
        Self {
            debug,
            version_check: debug,
            wire_debug: debug,
        }
    }
}

impl EngineConfig {
    /// Everything off.
    pub fn release() -> Self {
        Self {
            debug: false,
            version_check: false,
            wire_debug: false,
        }
    }

    /// Start from [`EngineConfig::default`] and apply environment overrides.
    ///
    /// - `WAYWIRE_DEBUG`: debug checks (`0`/`1`)
    /// - `WAYWIRE_CHECK_VERSION`: version checks (`0`/`1`)
    /// - `WAYLAND_DEBUG`: wire tracing (`1` or `client` to enable)
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("WAYWIRE_DEBUG").as_deref().and_then(parse_flag) {
            self.debug = value;
        }
        if let Some(value) = lookup("WAYWIRE_CHECK_VERSION")
            .as_deref()
            .and_then(parse_flag)
        {
            self.version_check = value;
        }
        if let Some(value) = lookup("WAYLAND_DEBUG") {
            self.wire_debug = matches!(value.trim(), "1" | "client");
        }
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
