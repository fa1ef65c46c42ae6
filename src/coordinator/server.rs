//! Coordinator server implementation
//!
//! Wires the [`Coordinator`] context into the HTTP router and owns the
//! background sweep task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::DaemonSettings;

use super::api::create_router;
use super::context::Coordinator;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Config store and allocation engine
    pub coordinator: Arc<Coordinator>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Coordinator Server
// ============================================================================

/// The coordinator HTTP daemon
pub struct CoordinatorServer {
    settings: DaemonSettings,
    bind_address: SocketAddr,
    state: AppState,
}

impl CoordinatorServer {
    /// Create a server around `coordinator`
    ///
    /// The listening port is `settings.port` when set, else the
    /// `coordinator_port` of the loaded config.
    pub async fn new(
        coordinator: Arc<Coordinator>,
        settings: DaemonSettings,
    ) -> Result<Self, ServerError> {
        settings
            .validate()
            .map_err(|e| ServerError::ConfigError(e.to_string()))?;

        let port = match settings.port {
            Some(port) => port,
            None => coordinator.store().read().await.coordinator_port,
        };
        let bind_address = SocketAddr::new(settings.bind_host, port);

        Ok(Self {
            settings,
            bind_address,
            state: AppState::new(coordinator),
        })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.settings.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.settings.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("{addr}: {e}")))?;

        tracing::info!(%addr, "Coordinator listening");

        let sweeper = self.start_background_tasks();

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()));

        sweeper.abort();
        tracing::info!("Coordinator server shutdown complete");
        result
    }

    /// Start the periodic dead-instance sweep
    fn start_background_tasks(&self) -> JoinHandle<()> {
        let coordinator = self.state.coordinator.clone();
        let period = Duration::from_secs(self.settings.sweep_interval_secs);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let cleaned = coordinator.cleanup_dead_instances().await;
                tracing::debug!(cleaned, "Background sweep finished");
            }
        });

        tracing::info!(
            interval_secs = self.settings.sweep_interval_secs,
            "Background sweep started"
        );
        handle
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.bind_address,
            config_path: self.state.coordinator.store().path().display().to_string(),
            sweep_interval_secs: self.settings.sweep_interval_secs,
            cors_enabled: self.settings.enable_cors,
            request_logging_enabled: self.settings.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub config_path: String,
    pub sweep_interval_secs: u64,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "Port Coordinator\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Config File: {}\n\
             Sweep Interval: {}s\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.config_path,
            self.sweep_interval_secs,
            if self.cors_enabled { "enabled" } else { "disabled" },
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to bind: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    ServeError(String),
}

// ============================================================================
// Tests
// ============================================================================
