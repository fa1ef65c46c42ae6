//! Unified error handling for the devports crate
//!
//! Domain modules keep their own error enums ([`ConfigError`],
//! [`StrategyError`], [`RegistryError`]); [`Error`] wraps them together with
//! the allocation-level failures so every boundary operation returns one type.
//!
//! No variant is fatal to a running daemon. [`ConfigError::Corrupt`] aborts
//! startup only because the binary chooses to stop on it.

use std::io;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::ports::registry::RegistryError;
pub use crate::ports::strategy::StrategyError;

/// Common trait for devports error types
pub trait DevportsErrorTrait: std::error::Error {
    /// Whether retrying the same request later may succeed
    fn is_recoverable(&self) -> bool;

    /// The error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Port allocation could not be satisfied
    Allocation,
    /// Unknown app or instance
    Registry,
    /// Configuration and validation errors
    Config,
    /// Storage and I/O errors
    Storage,
    /// Talking to the coordinator failed
    Network,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short label for the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allocation => "allocation",
            Self::Registry => "registry",
            Self::Config => "config",
            Self::Storage => "storage",
            Self::Network => "network",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the devports crate
#[derive(Error, Debug)]
pub enum Error {
    /// No candidate port is both unheld and bindable
    #[error("No available ports for app '{app}'")]
    PortExhaustion { app: String },

    /// Lookup or removal of an unregistered app
    #[error("App '{name}' not found")]
    AppNotFound { name: String },

    /// Registration with bad strategy parameters
    #[error("Invalid strategy for app '{app}': {source}")]
    InvalidStrategy {
        app: String,
        #[source]
        source: StrategyError,
    },

    /// Request body could not be decoded
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(ConfigError),

    /// Instance registry invariant violated
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidApp { app, source } => Self::InvalidStrategy { app, source },
            other => Self::Config(other),
        }
    }
}

impl DevportsErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::PortExhaustion { .. } => true,
            Self::AppNotFound { .. } => false,
            Self::InvalidStrategy { .. } => false,
            Self::InvalidRequest { .. } => false,
            Self::Config(e) => matches!(e, ConfigError::Io { .. }),
            Self::Registry(_) => true,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::PortExhaustion { .. } => ErrorCategory::Allocation,
            Self::AppNotFound { .. } | Self::Registry(_) => ErrorCategory::Registry,
            Self::InvalidStrategy { .. } | Self::InvalidRequest { .. } => ErrorCategory::Config,
            Self::Config(ConfigError::Io { .. }) | Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) | Self::Json(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Machine-readable error kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PortExhaustion { .. } => "port_exhaustion",
            Self::AppNotFound { .. } => "app_not_found",
            Self::InvalidStrategy { .. } => "invalid_strategy",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Config(ConfigError::Corrupt { .. }) => "config_corrupt",
            Self::Config(_) => "config",
            Self::Registry(_) => "registry",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other { .. } => "other",
        }
    }

    /// Create a not-found error
    pub fn app_not_found(name: impl Into<String>) -> Self {
        Self::AppNotFound { name: name.into() }
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
