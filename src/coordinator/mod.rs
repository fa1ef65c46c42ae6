//! Coordinator daemon and its HTTP client
//!
//! The daemon is one long-running process per machine that hands out ports
//! to local app instances and tracks which process holds which port.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Coordinator Server            │
//! │                                         │
//! │  ┌───────────────────────────────────┐  │
//! │  │           Coordinator             │  │
//! │  │  - ConfigStore (apps, JSON file)  │  │
//! │  │  - PortAllocator (instances)      │  │
//! │  └───────────────────────────────────┘  │
//! │                                         │
//! │  ┌───────────────────────────────────┐  │
//! │  │            REST API               │  │
//! │  │  POST   /port/allocate            │  │
//! │  │  POST   /port/release             │  │
//! │  │  GET    /instances[/{app}]        │  │
//! │  │  POST   /instances/cleanup        │  │
//! │  │  GET    /apps[/{name}]            │  │
//! │  │  POST   /apps                     │  │
//! │  │  DELETE /apps/{name}              │  │
//! │  │  GET    /config                   │  │
//! │  │  POST   /config/reload            │  │
//! │  │  GET    /health, /metrics         │  │
//! │  └───────────────────────────────────┘  │
//! │                                         │
//! │  background sweep every N seconds       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use devports::config::DaemonSettings;
//! use devports::coordinator::{Coordinator, CoordinatorServer};
//!
//! let coordinator = Arc::new(Coordinator::open("/tmp/devports.json")?);
//! let server = CoordinatorServer::new(coordinator, DaemonSettings::default()).await?;
//! server.start_with_shutdown(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

pub mod api;
pub mod client;
pub mod context;
pub mod server;

// Re-export main types
pub use client::{ClientConfig, ClientError, CoordinatorClient};
pub use context::Coordinator;
pub use server::{AppState, CoordinatorServer, ServerError};
