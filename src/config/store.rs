//! Persistent app registry backed by a JSON file

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::models::AppConfig;

use super::{ConfigError, CoordinatorConfig};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "DEVPORTS_CONFIG";

/// Loads, holds and persists the [`CoordinatorConfig`]
///
/// Every mutation is written to disk before it becomes visible in memory, so
/// a failed write leaves the registry exactly as it was.
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<CoordinatorConfig>,
}

impl ConfigStore {
    /// Open the store at `path`, creating a default file if none exists
    ///
    /// A file that exists but does not parse is an error; it is never
    /// replaced with defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = if path.exists() {
            load_file(&path)?
        } else {
            let config = CoordinatorConfig::default();
            save_file(&path, &config)?;
            tracing::info!(path = %path.display(), "Created default config file");
            config
        };

        tracing::debug!(
            path = %path.display(),
            apps = config.apps.len(),
            "Loaded coordinator config"
        );

        Ok(Self {
            path,
            config: RwLock::new(config),
        })
    }

    /// Open the store at [`ConfigStore::default_path`]
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(Self::default_path())
    }

    /// `$DEVPORTS_CONFIG`, else `~/.devports/config.json`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".devports")
            .join("config.json")
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the current config
    pub async fn read(&self) -> RwLockReadGuard<'_, CoordinatorConfig> {
        self.config.read().await
    }

    /// Clone of the current config
    pub async fn snapshot(&self) -> CoordinatorConfig {
        self.config.read().await.clone()
    }

    /// Replace the in-memory config with the file contents
    ///
    /// On failure the current config stays in place.
    pub async fn reload(&self) -> Result<(), ConfigError> {
        let mut config = self.config.write().await;
        *config = load_file(&self.path)?;
        tracing::info!(path = %self.path.display(), apps = config.apps.len(), "Config reloaded");
        Ok(())
    }

    /// Register or replace an app
    pub async fn add_app(&self, app: AppConfig) -> Result<(), ConfigError> {
        app.validate().map_err(|source| ConfigError::InvalidApp {
            app: app.name.clone(),
            source,
        })?;

        let mut config = self.config.write().await;
        let mut updated = config.clone();
        let name = app.name.clone();
        updated.apps.insert(name.clone(), app);

        save_file(&self.path, &updated)?;
        *config = updated;

        tracing::info!(app = %name, "App registered");
        Ok(())
    }

    /// Remove an app; `false` if it was not registered
    pub async fn remove_app(&self, name: &str) -> Result<bool, ConfigError> {
        let mut config = self.config.write().await;
        if !config.apps.contains_key(name) {
            return Ok(false);
        }

        let mut updated = config.clone();
        updated.apps.remove(name);

        save_file(&self.path, &updated)?;
        *config = updated;

        tracing::info!(app = %name, "App removed");
        Ok(true)
    }

    /// Look up one app
    pub async fn get_app(&self, name: &str) -> Option<AppConfig> {
        self.config.read().await.apps.get(name).cloned()
    }

    /// All registered apps
    pub async fn list_apps(&self) -> BTreeMap<String, AppConfig> {
        self.config.read().await.apps.clone()
    }
}

/// Parse a config file
pub fn load_file(path: &Path) -> Result<CoordinatorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|e| ConfigError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write a config file atomically
///
/// The document goes to a temporary file in the same directory which is then
/// renamed over `path`.
pub fn save_file(path: &Path, config: &CoordinatorConfig) -> Result<(), ConfigError> {
    let io_err = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_err)?;

    let mut json = serde_json::to_string_pretty(config)?;
    json.push('\n');

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
