//! devports - Port coordinator for local development servers
//!
//! A small daemon that hands out TCP ports to app instances running on one
//! machine, so several dev servers (or several copies of one) never fight
//! over the same port.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Persisted app registry and daemon settings
//! - [`ports`] - Port strategies, liveness probing, instance registry, allocation
//! - [`coordinator`] - Coordinator context, HTTP API, server and client
//! - [`models`] - Core data structures and wire types
//! - [`metrics`] - Prometheus metrics
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use devports::coordinator::Coordinator;
//! use devports::models::PortRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let coordinator = Coordinator::open("/tmp/devports.json")?;
//!     let allocation = coordinator
//!         .allocate_port(&PortRequest::new("web", std::process::id()))
//!         .await?;
//!     println!("listen on {}", allocation.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigStore, CoordinatorConfig, DaemonSettings};
    pub use crate::coordinator::{Coordinator, CoordinatorClient, CoordinatorServer};
    pub use crate::error::{DevportsErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{ActiveInstance, AppConfig, PortRequest, PortResponse};
    pub use crate::ports::{LivenessProbe, PortAllocator, PortStrategy, SystemProbe};
}

// Direct re-exports for convenience
pub use models::{ActiveInstance, AppConfig, PortRequest, PortResponse};
