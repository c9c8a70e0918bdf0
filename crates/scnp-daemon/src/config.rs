//! Daemon configuration loaded from TOML.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scnp_types::{key_state, ExitDirection, ShortcutStep};

use crate::error::DaemonError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Shortcut declarations. Empty means "use the built-in defaults".
    #[serde(default)]
    pub shortcuts: Vec<ShortcutConfig>,
    /// Bindable network interfaces for the UDP link backend.
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            identity: IdentityConfig::default(),
            shortcuts: default_shortcuts(),
            links: Vec::new(),
        }
    }
}

impl Config {
    /// The configured shortcuts, falling back to the built-in defaults.
    #[must_use]
    pub fn effective_shortcuts(&self) -> Vec<ShortcutConfig> {
        if self.shortcuts.is_empty() {
            default_shortcuts()
        } else {
            self.shortcuts.clone()
        }
    }

    /// Path of the persisted shortcut store.
    #[must_use]
    pub fn shortcut_store(&self) -> PathBuf {
        match &self.daemon.state_dir {
            Some(dir) => dir.join("shortcuts.bin"),
            None => shortcut_store_path(),
        }
    }

    /// Path of the persisted peer list.
    #[must_use]
    pub fn peer_store(&self) -> PathBuf {
        match &self.daemon.state_dir {
            Some(dir) => dir.join("peers.bin"),
            None => peer_store_path(),
        }
    }
}

/// Daemon network and runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Interface to bind at startup; `None` picks the backend's first.
    #[serde(default)]
    pub interface: Option<String>,
    /// Directory for the persisted shortcut and peer stores; `None` uses
    /// the per-user config directory.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Ring navigation wraps at the ends instead of clamping.
    #[serde(default = "default_true")]
    pub wrap: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_screen_width")]
    pub screen_width: u32,
    #[serde(default = "default_screen_height")]
    pub screen_height: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interface: None,
            state_dir: None,
            wrap: true,
            log_level: default_log_level(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
        }
    }
}

/// Machine identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
        }
    }
}

/// One bindable interface for the UDP link backend. Addresses are kept as
/// strings here; the binary parses them when it assembles the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    /// Hardware address, `aa:bb:cc:dd:ee:ff`.
    pub addr: String,
    /// Local socket address to bind, e.g. `0.0.0.0:28888`.
    pub bind: String,
    /// Broadcast destination on the segment, e.g. `192.168.1.255:28888`.
    pub broadcast: String,
}

/// A declared shortcut sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub direction: ExitDirection,
    pub steps: Vec<StepConfig>,
}

impl ShortcutConfig {
    /// Convert the declared steps into matcher steps. A `timeout_ms` of 0
    /// means no timeout.
    #[must_use]
    pub fn steps(&self) -> Vec<ShortcutStep> {
        self.steps
            .iter()
            .map(|s| {
                let timeout = if s.timeout_ms == 0 {
                    None
                } else {
                    Some(Duration::from_millis(u64::from(s.timeout_ms)))
                };
                ShortcutStep::new(s.code, s.state, timeout)
            })
            .collect()
    }
}

/// One declared shortcut step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepConfig {
    pub code: u16,
    pub state: i32,
    /// Maximum milliseconds since the previous step; 0 disables the timeout.
    #[serde(default)]
    pub timeout_ms: u32,
}

/// The built-in shortcut set: ring navigation both ways plus quit.
///
/// Key codes follow the evdev convention (29 = left ctrl, 105/106 = arrow
/// left/right, 16 = q).
#[must_use]
pub fn default_shortcuts() -> Vec<ShortcutConfig> {
    let chord = |name: &str, description: &str, direction, trigger: u16| ShortcutConfig {
        name: name.to_string(),
        description: description.to_string(),
        direction,
        steps: vec![
            StepConfig {
                code: 29,
                state: key_state::PRESSED,
                timeout_ms: 0,
            },
            StepConfig {
                code: trigger,
                state: key_state::PRESSED,
                timeout_ms: 500,
            },
        ],
    };
    vec![
        chord(
            "switch-right",
            "Hand control to the peer on the right",
            ExitDirection::Right,
            106,
        ),
        chord(
            "switch-left",
            "Hand control to the peer on the left",
            ExitDirection::Left,
            105,
        ),
        chord("quit", "Stop the daemon", ExitDirection::None, 16),
    ]
}

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<&str>) -> Result<Config, DaemonError> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| DaemonError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DaemonError::Config(format!("failed to parse config: {e}")))?;
        tracing::info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        tracing::info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Get the default config directory path.
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("scnp")
}

fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default path of the persisted shortcut store.
#[must_use]
pub fn shortcut_store_path() -> PathBuf {
    config_dir().join("shortcuts.bin")
}

/// Default path of the persisted peer list.
#[must_use]
pub fn peer_store_path() -> PathBuf {
    config_dir().join("peers.bin")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "scnp".to_string())
}

fn default_screen_width() -> u32 {
    1920
}

fn default_screen_height() -> u32 {
    1080
}
