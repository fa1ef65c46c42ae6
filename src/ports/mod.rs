//! Port allocation and instance registry engine
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              PortAllocator               │
//! │   allocate / release / cleanup / views   │
//! │                                          │
//! │  ┌──────────────┐   ┌─────────────────┐  │
//! │  │ PortStrategy │   │ InstanceRegistry│  │
//! │  │  candidates  │   │ (app, id) → inst│  │
//! │  └──────────────┘   └─────────────────┘  │
//! │           ┌────────────────┐             │
//! │           │ LivenessProbe  │             │
//! │           │ pid alive?     │             │
//! │           │ port bindable? │             │
//! │           └────────────────┘             │
//! └──────────────────────────────────────────┘
//! ```

pub mod allocator;
pub mod liveness;
pub mod registry;
pub mod strategy;

pub use allocator::{generate_instance_id, PortAllocator};
pub use liveness::{LivenessProbe, SystemProbe};
pub use registry::{InstanceRegistry, RegistryError};
pub use strategy::{
    Candidates, PortStrategy, StrategyError, StrategyKind, MAX_APP_PORT, MIN_APP_PORT,
};
