//! Configuration loading and typed config structures for the bridge.
//!
//! The canonical configuration lives in `fable-config.yaml` at the project
//! root. Every field has a default, so a missing section (or a missing
//! file, at the binary's discretion) yields a working bridge.
//!
//! LLM credentials are not part of this file; they are read from the
//! environment by `fable-reasoning`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use fable_types::PersonaGuid;
use serde::Deserialize;

use crate::observation::{DEFAULT_LIMIT, DEFAULT_RADIUS, FilterParams};

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
    #[error("invalid environment override {name}: {reason}")]
    Env {
        /// The variable name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BridgeConfig {
    /// Listening address for the WebSocket and status endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observation filter and auto-observer settings.
    #[serde(default)]
    pub observation: ObservationConfig,

    /// Persona synchronization loop timing.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Prompt templates, timeouts and the action catalog.
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

impl BridgeConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `FABLE_PORT` overrides `server.port`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Env`] if `FABLE_PORT` is not a port number.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.server.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// Listening address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
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

impl ServerConfig {
    /// Apply `FABLE_PORT` if it is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if the value is not a valid port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("FABLE_PORT") {
            self.port = val.parse().map_err(|e| ConfigError::Env {
                name: "FABLE_PORT".to_owned(),
                reason: format!("{e}"),
            })?;
        }
        Ok(())
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Observation filter settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObservationConfig {
    /// Maximum observer-to-subject distance in metres.
    #[serde(default = "default_radius")]
    pub radius: f64,

    /// Maximum number of candidates per observation.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Personas that observe their surroundings on every tick.
    #[serde(default = "default_auto_observers")]
    pub auto_observers: Vec<PersonaGuid>,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            limit: default_limit(),
            auto_observers: default_auto_observers(),
        }
    }
}

impl ObservationConfig {
    /// The filter parameters derived from this section.
    pub const fn filter_params(&self) -> FilterParams {
        FilterParams {
            radius: self.radius,
            limit: self.limit,
        }
    }
}

/// Synchronization loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Idle period between checks once personas are loaded.
    #[serde(default = "default_sync_interval_ms")]
    pub interval_ms: u64,

    /// Period used while waiting for a connection or a persona reload.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sync_interval_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
        }
    }
}

impl SyncConfig {
    /// Idle period as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Backoff period as a [`Duration`].
    pub const fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

/// Reasoning adapter settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReasoningConfig {
    /// Directory holding the prompt templates.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,

    /// Deadline for one LLM call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Action catalog offered when a persona chooses its next sequence,
    /// keyed by action name.
    #[serde(default = "default_actions")]
    pub actions: BTreeMap<String, String>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
            timeout_ms: default_timeout_ms(),
            actions: default_actions(),
        }
    }
}

impl ReasoningConfig {
    /// LLM deadline as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_radius() -> f64 {
    DEFAULT_RADIUS
}

const fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_auto_observers() -> Vec<PersonaGuid> {
    vec![PersonaGuid::from("wyatt_cooper")]
}

const fn default_sync_interval_ms() -> u64 {
    5000
}

const fn default_reconnect_backoff_ms() -> u64 {
    1000
}

fn default_templates_dir() -> String {
    "templates".to_owned()
}

const fn default_timeout_ms() -> u64 {
    30_000
}

fn default_actions() -> BTreeMap<String, String> {
    [
        ("continue", "Keep doing the current sequence."),
        ("idle", "Stand still and take in the surroundings."),
        ("walk_to", "Walk to a named place or persona."),
        ("talk_to", "Start a conversation with a nearby persona."),
        ("work", "Do the work expected of you at this hour."),
        ("eat", "Find something to eat."),
        ("sleep", "Go home and sleep."),
    ]
    .into_iter()
    .map(|(name, description)| (name.to_owned(), description.to_owned()))
    .collect()
}
