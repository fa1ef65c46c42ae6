//! Configuration management for the coordinator
//!
//! Two kinds of configuration live here:
//!
//! - [`CoordinatorConfig`] - the durable app registry plus coordinator
//!   settings, persisted as JSON by [`ConfigStore`]
//! - [`DaemonSettings`] - runtime knobs for the daemon process, read from
//!   environment variables or a TOML file

pub mod settings;
pub mod store;

pub use settings::{DaemonSettings, DaemonSettingsBuilder};
pub use store::ConfigStore;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AppConfig, AppEntry};
use crate::ports::strategy::{Candidates, StrategyError, MIN_APP_PORT};

/// Default port the coordinator listens on
pub const DEFAULT_COORDINATOR_PORT: u16 = 9000;

/// Default inclusive range for apps without their own ports
pub const DEFAULT_PORT_RANGE: (u16, u16) = (8100, 8199);

// ============================================================================
// Coordinator Config
// ============================================================================

/// Durable coordinator state: settings and registered apps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConfigDocument", into = "ConfigDocument")]
pub struct CoordinatorConfig {
    /// Port the coordinator HTTP API listens on
    pub coordinator_port: u16,

    /// Inclusive fallback range for `Any` and unregistered apps
    pub default_port_range: (u16, u16),

    /// Registered apps by name
    pub apps: BTreeMap<String, AppConfig>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            coordinator_port: DEFAULT_COORDINATOR_PORT,
            default_port_range: DEFAULT_PORT_RANGE,
            apps: BTreeMap::new(),
        }
    }
}

impl CoordinatorConfig {
    /// Validate coordinator-level values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "coordinator_port".to_string(),
                reason: "port 0 is not a listening port".to_string(),
            });
        }

        let (start, end) = self.default_port_range;
        if start < MIN_APP_PORT || start > end {
            return Err(ConfigError::InvalidValue {
                field: "default_port_range".to_string(),
                reason: format!("[{start}, {end}] must satisfy {MIN_APP_PORT} <= start <= end"),
            });
        }

        Ok(())
    }

    /// Candidate ports for an app
    ///
    /// Unregistered apps and apps with the `Any` strategy fall back to the
    /// default range.
    pub fn candidates_for(&self, app_name: &str) -> Candidates {
        match self.apps.get(app_name) {
            Some(app) if !app.port_strategy.is_any() => app.port_strategy.candidates(),
            _ => self.default_candidates(),
        }
    }

    /// The default range as a candidate sequence
    pub fn default_candidates(&self) -> Candidates {
        let (start, end) = self.default_port_range;
        Candidates::range(start, end)
    }
}

/// Serialized layout of [`CoordinatorConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default = "default_coordinator_port")]
    pub coordinator_port: u16,

    #[serde(default = "default_port_range")]
    pub default_port_range: (u16, u16),

    #[serde(default)]
    pub apps: BTreeMap<String, AppEntry>,
}

fn default_coordinator_port() -> u16 {
    DEFAULT_COORDINATOR_PORT
}

fn default_port_range() -> (u16, u16) {
    DEFAULT_PORT_RANGE
}

impl TryFrom<ConfigDocument> for CoordinatorConfig {
    type Error = ConfigError;

    fn try_from(doc: ConfigDocument) -> Result<Self, Self::Error> {
        let apps = doc
            .apps
            .into_iter()
            .map(|(name, entry)| {
                AppConfig::from_entry(name.clone(), entry)
                    .map(|app| (name.clone(), app))
                    .map_err(|source| ConfigError::InvalidApp { app: name, source })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let config = Self {
            coordinator_port: doc.coordinator_port,
            default_port_range: doc.default_port_range,
            apps,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<CoordinatorConfig> for ConfigDocument {
    fn from(config: CoordinatorConfig) -> Self {
        Self {
            coordinator_port: config.coordinator_port,
            default_port_range: config.default_port_range,
            apps: config
                .apps
                .iter()
                .map(|(name, app)| (name.clone(), app.to_entry()))
                .collect(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but cannot be parsed
    #[error("Config file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// A value is out of bounds
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// An app entry has bad strategy parameters
    #[error("Invalid app '{app}': {source}")]
    InvalidApp {
        app: String,
        #[source]
        source: StrategyError,
    },

    /// Reading or writing the file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding the document failed
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}
