//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `webthing.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How the Things are named and mounted.
    pub registry: RegistryConfig,
    /// Notification fan-out settings.
    pub notifier: NotifierConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Thing definitions. When empty, the built-in lamp and humidity sensor
    /// are served.
    pub things: Vec<ThingConfig>,
}

/// Registry naming and mount point.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Name reported when several Things are served.
    pub name: String,
    /// Path prefix every Thing is mounted under (empty for the root).
    pub base_path: String,
}

/// Notification bus configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Broadcast channel capacity; slower subscribers lose older updates.
    pub capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One Thing to serve.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ThingConfig {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Capability types (`@type`).
    pub types: Vec<String>,
    pub properties: Vec<PropertyConfig>,
    /// Declared actions, name → metadata.
    pub actions: BTreeMap<String, Value>,
    /// Declared events, name → metadata.
    pub events: BTreeMap<String, Value>,
}

/// One property of a configured Thing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PropertyConfig {
    pub name: String,
    pub value: Value,
    pub metadata: Value,
}

impl Config {
    /// Load configuration from `webthing.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// the result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("webthing.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("WEBTHING_NAME") {
            self.registry.name = val;
        }
        if let Ok(val) = std::env::var("WEBTHING_BASE_PATH") {
            self.registry.base_path = val;
        }
        if let Ok(val) = std::env::var("WEBTHING_NOTIFIER_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.notifier.capacity = capacity;
            }
        }
        if let Ok(val) = std::env::var("WEBTHING_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.notifier.capacity == 0 {
            return Err(ConfigError::Validation(
                "notifier capacity must be non-zero".to_string(),
            ));
        }
        if !self.registry.base_path.is_empty() && !self.registry.base_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "base path {:?} must start with '/'",
                self.registry.base_path
            )));
        }
        let mut seen = HashSet::new();
        for thing in &self.things {
            if thing.id.is_empty() {
                return Err(ConfigError::Validation("thing id must not be empty".to_string()));
            }
            if !seen.insert(thing.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate thing id {:?}",
                    thing.id
                )));
            }
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "WebThings".to_string(),
            base_path: String::new(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "webthingd=info,webthing_app=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
