//! Coordinator context shared by every request handler

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ConfigStore;
use crate::error::{Error, Result};
use crate::models::{ActiveInstance, AppConfig, Health, PortRequest, PortResponse};
use crate::ports::{LivenessProbe, PortAllocator, SystemProbe};

/// The config store and allocation engine behind one handle
///
/// Lock order is always config first, registry second. Allocation keeps the
/// config read guard while the allocator holds the registry, so a concurrent
/// `add_app` or reload cannot change the strategy mid-allocation.
pub struct Coordinator {
    store: ConfigStore,
    allocator: PortAllocator,
}

impl Coordinator {
    /// Open the config at `path` and start with an empty instance registry
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = ConfigStore::open(path)?;
        Ok(Self::with_probe(store, Arc::new(SystemProbe)))
    }

    /// Build a coordinator over an existing store with a custom probe
    pub fn with_probe(store: ConfigStore, probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            store,
            allocator: PortAllocator::new(probe),
        }
    }

    /// Underlying config store
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Ports
    // ------------------------------------------------------------------------

    pub async fn allocate_port(&self, request: &PortRequest) -> Result<PortResponse> {
        let config = self.store.read().await;
        self.allocator.allocate(request, &config).await
    }

    pub async fn release_port(
        &self,
        app_name: &str,
        instance_id: Option<&str>,
        pid: Option<u32>,
    ) -> bool {
        self.allocator.release(app_name, instance_id, pid).await
    }

    /// Live instances, optionally restricted to one app
    pub async fn list_active_instances(&self, app_name: Option<&str>) -> Vec<ActiveInstance> {
        match app_name {
            Some(name) => self.allocator.instances_for_app(name).await,
            None => self.allocator.active_instances().await,
        }
    }

    pub async fn cleanup_dead_instances(&self) -> usize {
        self.allocator.cleanup().await
    }

    // ------------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------------

    /// Register or replace an app; invalid strategies leave the registry untouched
    pub async fn add_app(&self, app: AppConfig) -> Result<()> {
        self.store.add_app(app).await?;
        Ok(())
    }

    pub async fn remove_app(&self, name: &str) -> Result<()> {
        if self.store.remove_app(name).await? {
            Ok(())
        } else {
            Err(Error::app_not_found(name))
        }
    }

    pub async fn get_app(&self, name: &str) -> Option<AppConfig> {
        self.store.get_app(name).await
    }

    pub async fn list_apps(&self) -> BTreeMap<String, AppConfig> {
        self.store.list_apps().await
    }

    /// Re-read the config file; the current config survives a failed reload
    pub async fn reload_config(&self) -> Result<()> {
        self.store.reload().await?;
        Ok(())
    }

    /// Registered app count and raw instance count (no sweep)
    pub async fn health(&self) -> Health {
        let apps_registered = self.store.read().await.apps.len();
        Health {
            apps_registered,
            active_instances: self.allocator.active_count().await,
        }
    }
}
