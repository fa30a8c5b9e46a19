//! Configuration loading and typed config structures.
//!
//! The configuration lives in `hatnode-config.yaml` next to the binary's
//! working directory. Every field has a default, so a missing file or a
//! partial one is fine. A handful of deployment-relevant values can be
//! overridden with environment variables.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::value::{LedColor, SwitchPosition};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value for {var}: {message}")]
    Override {
        /// The environment variable name.
        var: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HatnodeConfig {
    /// Protocol server binding.
    #[serde(default)]
    pub server: ServerConfig,

    /// Which hardware to drive and how to find it.
    #[serde(default)]
    pub hardware: HardwareConfig,

    /// Joystick poller settings.
    #[serde(default)]
    pub joystick: JoystickConfig,

    /// LED display settings.
    #[serde(default)]
    pub led: LedConfig,

    /// Dispatcher task settings.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl HatnodeConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides:
    /// - `HATNODE_HOST` overrides `server.host`
    /// - `HATNODE_PORT` overrides `server.port`
    /// - `HATNODE_BACKEND` overrides `hardware.backend`
    /// - `HATNODE_DEBOUNCE_MS` overrides `joystick.debounce_ms`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HATNODE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("HATNODE_PORT") {
            self.server.port = port.parse().map_err(|e| ConfigError::Override {
                var: "HATNODE_PORT",
                message: format!("{e}"),
            })?;
        }
        if let Some(backend) = lookup("HATNODE_BACKEND") {
            self.hardware.backend = match backend.to_lowercase().as_str() {
                "sensehat" => HardwareBackend::SenseHat,
                "simulated" => HardwareBackend::Simulated,
                other => {
                    return Err(ConfigError::Override {
                        var: "HATNODE_BACKEND",
                        message: format!("unknown backend {other:?}"),
                    });
                }
            };
        }
        if let Some(ms) = lookup("HATNODE_DEBOUNCE_MS") {
            self.joystick.debounce_ms = ms.parse().map_err(|e| ConfigError::Override {
                var: "HATNODE_DEBOUNCE_MS",
                message: format!("{e}"),
            })?;
        }
        Ok(())
    }
}

/// Protocol server binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which hardware implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    /// The Raspberry Pi Sense HAT (framebuffer LED matrix + evdev joystick).
    #[default]
    SenseHat,
    /// In-process fakes, for running without the board.
    Simulated,
}

/// Hardware discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HardwareConfig {
    /// Backend to drive.
    #[serde(default)]
    pub backend: HardwareBackend,

    /// Input device name of the joystick.
    #[serde(default = "default_joystick_device")]
    pub joystick_device: String,

    /// Framebuffer name of the LED matrix.
    #[serde(default = "default_framebuffer")]
    pub framebuffer: String,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: HardwareBackend::default(),
            joystick_device: default_joystick_device(),
            framebuffer: default_framebuffer(),
        }
    }
}

/// Joystick poller settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoystickConfig {
    /// Minimum time between accepted transitions, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Position reported before the first transition.
    #[serde(default = "default_initial_position")]
    pub initial_position: SwitchPosition,
}

impl JoystickConfig {
    /// The debounce window.
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            initial_position: default_initial_position(),
        }
    }
}

/// LED display settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedConfig {
    /// Color shown and reported at startup.
    #[serde(default = "default_initial_color")]
    pub initial_color: LedColor,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            initial_color: default_initial_color(),
        }
    }
}

/// Dispatcher task settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DispatcherConfig {
    /// Capacity of the request queue feeding the dispatcher task.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

fn default_joystick_device() -> String {
    String::from("Raspberry Pi Sense HAT Joystick")
}

fn default_framebuffer() -> String {
    String::from("RPi-Sense FB")
}

const fn default_debounce_ms() -> u64 {
    1000
}

const fn default_initial_position() -> SwitchPosition {
    SwitchPosition::Down
}

const fn default_initial_color() -> LedColor {
    LedColor::Green
}

const fn default_queue_capacity() -> usize {
    64
}
