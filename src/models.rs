//! Core data structures shared by the coordinator, its API and the CLI

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::strategy::{PortStrategy, StrategyError, StrategyKind};

/// Launch command used when an app is registered without one
pub const DEFAULT_COMMAND: &str = "uvicorn app.main:app --reload";

/// Maximum number of ports listed in an [`AppInfo`]
pub const AVAILABLE_PORTS_PREVIEW: usize = 10;

// ============================================================================
// Applications
// ============================================================================

/// A registered application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Unique application name
    pub name: String,

    /// Application directory
    pub path: String,

    /// Launch command template
    pub command: String,

    /// How the app's ports are chosen
    pub port_strategy: PortStrategy,
}

impl AppConfig {
    /// Create an app with the default command and the `Any` strategy
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            command: DEFAULT_COMMAND.to_string(),
            port_strategy: PortStrategy::Any,
        }
    }

    /// Set the launch command
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Set the port strategy
    pub fn with_strategy(mut self, strategy: PortStrategy) -> Self {
        self.port_strategy = strategy;
        self
    }

    /// Validate name and strategy parameters
    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.name.trim().is_empty() {
            return Err(StrategyError::InvalidParameter {
                field: "name",
                reason: "app name is empty".to_string(),
            });
        }
        self.port_strategy.validate()
    }

    /// Build from the persisted form, rejecting fields foreign to the strategy
    pub fn from_entry(name: impl Into<String>, entry: AppEntry) -> Result<Self, StrategyError> {
        let port_strategy = entry.strategy()?;
        let app = Self {
            name: name.into(),
            path: entry.path,
            command: entry.command,
            port_strategy,
        };
        app.validate()?;
        Ok(app)
    }

    /// Persisted form of this app
    pub fn to_entry(&self) -> AppEntry {
        let mut entry = AppEntry {
            path: self.path.clone(),
            command: self.command.clone(),
            port_strategy: self.port_strategy.kind(),
            port: None,
            port_range: None,
            ports: None,
            port_step: None,
        };

        match &self.port_strategy {
            PortStrategy::Dedicated(port) => entry.port = Some(*port),
            PortStrategy::Range { start, end } => entry.port_range = Some((*start, *end)),
            PortStrategy::List(ports) => entry.ports = Some(ports.clone()),
            PortStrategy::Stepped { start, step, count } => {
                entry.port_step = Some(SteppedPorts {
                    start: *start,
                    step: *step,
                    count: *count,
                })
            }
            PortStrategy::Any => {}
        }

        entry
    }
}

/// On-disk and wire representation of an app
///
/// Only the field belonging to `port_strategy` may be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub path: String,

    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default)]
    pub port_strategy: StrategyKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range: Option<(u16, u16)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<u16>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_step: Option<SteppedPorts>,
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

impl AppEntry {
    /// Resolve the strategy, checking that exactly its own fields are set
    pub fn strategy(&self) -> Result<PortStrategy, StrategyError> {
        let kind = self.port_strategy;
        let present = [
            ("port", self.port.is_some(), StrategyKind::Dedicated),
            ("port_range", self.port_range.is_some(), StrategyKind::Range),
            ("ports", self.ports.is_some(), StrategyKind::List),
            ("port_step", self.port_step.is_some(), StrategyKind::Stepped),
        ];
        if let Some((field, _, _)) = present
            .into_iter()
            .find(|(_, is_set, owner)| *is_set && *owner != kind)
        {
            return Err(StrategyError::UnexpectedField { kind, field });
        }

        let strategy = match kind {
            StrategyKind::Dedicated => PortStrategy::Dedicated(self.port.ok_or(
                StrategyError::MissingField {
                    kind,
                    field: "port",
                },
            )?),
            StrategyKind::Range => {
                let (start, end) = self.port_range.ok_or(StrategyError::MissingField {
                    kind,
                    field: "port_range",
                })?;
                PortStrategy::Range { start, end }
            }
            StrategyKind::List => PortStrategy::List(self.ports.clone().ok_or(
                StrategyError::MissingField {
                    kind,
                    field: "ports",
                },
            )?),
            StrategyKind::Stepped => {
                let step = self.port_step.ok_or(StrategyError::MissingField {
                    kind,
                    field: "port_step",
                })?;
                PortStrategy::Stepped {
                    start: step.start,
                    step: step.step,
                    count: step.count,
                }
            }
            StrategyKind::Any => PortStrategy::Any,
        };

        strategy.validate()?;
        Ok(strategy)
    }
}

/// Parameters of a stepped strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteppedPorts {
    pub start: u16,

    #[serde(default = "default_step")]
    pub step: u16,

    #[serde(default = "default_count")]
    pub count: u16,
}

fn default_step() -> u16 {
    1
}

fn default_count() -> u16 {
    10
}

/// App summary returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub path: String,
    pub command: String,
    pub port_strategy: StrategyKind,
    /// Strategy candidates; listings keep only the first [`AVAILABLE_PORTS_PREVIEW`]
    pub available_ports: Vec<u16>,
}

impl AppInfo {
    /// Listing form with at most [`AVAILABLE_PORTS_PREVIEW`] ports
    pub fn summary(app: &AppConfig) -> Self {
        Self::with_ports(app, AVAILABLE_PORTS_PREVIEW)
    }

    fn with_ports(app: &AppConfig, limit: usize) -> Self {
        Self {
            name: app.name.clone(),
            path: app.path.clone(),
            command: app.command.clone(),
            port_strategy: app.port_strategy.kind(),
            available_ports: app.port_strategy.candidates().take(limit).collect(),
        }
    }
}

/// Full form with every candidate port
impl From<&AppConfig> for AppInfo {
    fn from(app: &AppConfig) -> Self {
        Self::with_ports(app, usize::MAX)
    }
}

/// Request body for registering an app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddAppRequest {
    pub name: String,

    #[serde(flatten)]
    pub entry: AppEntry,
}

impl TryFrom<AddAppRequest> for AppConfig {
    type Error = StrategyError;

    fn try_from(request: AddAppRequest) -> Result<Self, Self::Error> {
        Self::from_entry(request.name, request.entry)
    }
}

impl From<&AppConfig> for AddAppRequest {
    fn from(app: &AppConfig) -> Self {
        Self {
            name: app.name.clone(),
            entry: app.to_entry(),
        }
    }
}

// ============================================================================
// Instances
// ============================================================================

/// One running instance of an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveInstance {
    pub app_name: String,
    pub instance_id: String,
    pub port: u16,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl ActiveInstance {
    /// Create an instance stamped with the current time
    pub fn new(
        app_name: impl Into<String>,
        instance_id: impl Into<String>,
        port: u16,
        pid: u32,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            instance_id: instance_id.into(),
            port,
            pid,
            started_at: Utc::now(),
        }
    }

    /// Registry key of this instance
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(&self.app_name, &self.instance_id)
    }

    /// Seconds since the port was allocated
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// Identity of an instance: `(app_name, instance_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    pub app_name: String,
    pub instance_id: String,
}

impl InstanceKey {
    pub fn new(app_name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            instance_id: instance_id.into(),
        }
    }
}

impl std::fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.app_name, self.instance_id)
    }
}

// ============================================================================
// Port Requests
// ============================================================================

/// Request for a port allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRequest {
    pub app_name: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    pub pid: u32,
}

impl PortRequest {
    pub fn new(app_name: impl Into<String>, pid: u32) -> Self {
        Self {
            app_name: app_name.into(),
            instance_id: None,
            pid,
        }
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }
}

/// Result of a port allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortResponse {
    pub port: u16,
    pub app_name: String,
    pub instance_id: String,
}

/// Request to release a port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub app_name: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub pid: Option<u32>,
}

/// Release result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// Cleanup result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub cleaned: usize,
}

/// Coordinator health summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub apps_registered: usize,
    pub active_instances: usize,
}
