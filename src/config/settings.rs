//! Runtime settings for the coordinator daemon

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Settings that shape how the daemon runs, not what it stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Address the HTTP API binds to
    pub bind_host: IpAddr,

    /// Listening port; overrides `coordinator_port` from the config file
    pub port: Option<u16>,

    /// Seconds between background dead-instance sweeps
    pub sweep_interval_secs: u64,

    /// Enable CORS for the API
    pub enable_cors: bool,

    /// Log every HTTP request
    pub enable_request_logging: bool,

    /// Config file location; `None` uses the default path
    pub config_path: Option<PathBuf>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: None,
            sweep_interval_secs: 30,
            enable_cors: false,
            enable_request_logging: true,
            config_path: None,
        }
    }
}

impl DaemonSettings {
    /// Create a new settings builder
    pub fn builder() -> DaemonSettingsBuilder {
        DaemonSettingsBuilder::default()
    }

    /// Load settings from `DEVPORTS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_host = match std::env::var("DEVPORTS_BIND_HOST") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                field: "DEVPORTS_BIND_HOST".to_string(),
                reason: format!("Invalid address: {v}"),
            })?,
            Err(_) => defaults.bind_host,
        };

        let port = std::env::var("DEVPORTS_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok());

        let sweep_interval_secs = std::env::var("DEVPORTS_SWEEP_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.sweep_interval_secs);

        let enable_cors = env_flag("DEVPORTS_CORS").unwrap_or(defaults.enable_cors);

        let enable_request_logging =
            env_flag("DEVPORTS_REQUEST_LOGGING").unwrap_or(defaults.enable_request_logging);

        let config_path = std::env::var(super::store::CONFIG_PATH_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let settings = Self {
            bind_host,
            port,
            sweep_interval_secs,
            enable_cors,
            enable_request_logging,
            config_path,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep_interval_secs".to_string(),
                reason: "Must be at least 1 second".to_string(),
            });
        }

        if self.port == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                reason: "Port 0 is not a listening port".to_string(),
            });
        }

        Ok(())
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for DaemonSettings
#[derive(Debug, Default)]
pub struct DaemonSettingsBuilder {
    bind_host: Option<IpAddr>,
    port: Option<u16>,
    sweep_interval_secs: Option<u64>,
    enable_cors: Option<bool>,
    enable_request_logging: Option<bool>,
    config_path: Option<PathBuf>,
}

impl DaemonSettingsBuilder {
    /// Set bind host
    pub fn bind_host(mut self, host: IpAddr) -> Self {
        self.bind_host = Some(host);
        self
    }

    /// Set bind host from string
    pub fn bind_host_str(mut self, host: &str) -> Result<Self, ConfigError> {
        self.bind_host = Some(host.parse().map_err(|_| ConfigError::InvalidValue {
            field: "bind_host".to_string(),
            reason: format!("Invalid address: {host}"),
        })?);
        Ok(self)
    }

    /// Override the listening port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set sweep interval
    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = Some(secs);
        self
    }

    /// Enable/disable CORS
    pub fn enable_cors(mut self, enable: bool) -> Self {
        self.enable_cors = Some(enable);
        self
    }

    /// Enable/disable request logging
    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Set config file location
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Build the settings
    pub fn build(self) -> Result<DaemonSettings, ConfigError> {
        let defaults = DaemonSettings::default();
        let settings = DaemonSettings {
            bind_host: self.bind_host.unwrap_or(defaults.bind_host),
            port: self.port.or(defaults.port),
            sweep_interval_secs: self
                .sweep_interval_secs
                .unwrap_or(defaults.sweep_interval_secs),
            enable_cors: self.enable_cors.unwrap_or(defaults.enable_cors),
            enable_request_logging: self
                .enable_request_logging
                .unwrap_or(defaults.enable_request_logging),
            config_path: self.config_path.or(defaults.config_path),
        };

        settings.validate()?;
        Ok(settings)
    }
}
