//! Port allocation engine
//!
//! [`PortAllocator`] combines the strategy resolver, the liveness probe and
//! the instance registry. Every operation takes the registry lock for its
//! whole duration, so an allocation's stale check, candidate scan and insert
//! form one critical section with respect to other allocations and releases.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{ActiveInstance, PortRequest, PortResponse};

use super::liveness::{LivenessProbe, SystemProbe};
use super::registry::InstanceRegistry;

/// Length of generated instance ids, in hex characters
///
/// Eight hex characters are 32 random bits taken from a v4 UUID. With `k`
/// live instances of one app the chance that a fresh id matches one of them
/// is at most `k / 2^32`; a match is detected and a new id drawn.
pub const INSTANCE_ID_LEN: usize = 8;

/// Allocates ports and tracks the resulting instances
pub struct PortAllocator {
    registry: Mutex<InstanceRegistry>,
    probe: Arc<dyn LivenessProbe>,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(Arc::new(SystemProbe))
    }
}

impl PortAllocator {
    /// Create an allocator with an empty registry
    pub fn new(probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            registry: Mutex::new(InstanceRegistry::new()),
            probe,
        }
    }

    /// Allocate a port for `(app_name, instance_id)`
    ///
    /// Re-requesting a key whose owner is still alive returns the existing
    /// port. Fails with [`Error::PortExhaustion`] when no candidate is both
    /// unheld and bindable; nothing changes in that case.
    pub async fn allocate(
        &self,
        request: &PortRequest,
        config: &CoordinatorConfig,
    ) -> Result<PortResponse> {
        let app_name = request.app_name.as_str();
        let mut registry = self.registry.lock().await;

        let instance_id = match &request.instance_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => generate_unused_id(&registry, app_name),
        };

        if let Some(existing) = registry.lookup(app_name, &instance_id) {
            if self.probe.process_alive(existing.pid) {
                tracing::debug!(
                    app = %app_name,
                    instance = %instance_id,
                    port = existing.port,
                    "Returning existing allocation"
                );
                return Ok(PortResponse {
                    port: existing.port,
                    app_name: app_name.to_string(),
                    instance_id,
                });
            }

            tracing::info!(
                app = %app_name,
                instance = %instance_id,
                port = existing.port,
                pid = existing.pid,
                "Discarding stale allocation"
            );
            registry.remove_by_key(app_name, &instance_id);
        }

        let held = registry.held_ports();
        let selected = config
            .candidates_for(app_name)
            .filter(|port| !held.contains(port))
            .find(|port| self.probe.port_bindable(*port));

        let Some(port) = selected else {
            tracing::warn!(app = %app_name, held = held.len(), "No available ports");
            metrics::record_exhaustion(app_name);
            return Err(Error::PortExhaustion {
                app: app_name.to_string(),
            });
        };

        registry.insert(ActiveInstance::new(
            app_name,
            instance_id.clone(),
            port,
            request.pid,
        ))?;
        metrics::record_allocation(app_name);
        metrics::set_active_instances(registry.len());

        tracing::info!(
            app = %app_name,
            instance = %instance_id,
            port,
            pid = request.pid,
            "Port allocated"
        );

        Ok(PortResponse {
            port,
            app_name: app_name.to_string(),
            instance_id,
        })
    }

    /// Release by instance id, or else every instance of the app owned by `pid`
    ///
    /// An empty id counts as no id, as in [`allocate`](Self::allocate).
    /// Returns whether anything was removed.
    pub async fn release(
        &self,
        app_name: &str,
        instance_id: Option<&str>,
        pid: Option<u32>,
    ) -> bool {
        let instance_id = instance_id.filter(|id| !id.is_empty());
        let mut registry = self.registry.lock().await;

        let removed = match (instance_id, pid) {
            (Some(id), _) => usize::from(registry.remove_by_key(app_name, id)),
            (None, Some(pid)) => registry.remove_by_pid(app_name, pid),
            (None, None) => 0,
        };

        if removed > 0 {
            metrics::record_release(app_name, removed);
            metrics::set_active_instances(registry.len());
            tracing::info!(
                app = %app_name,
                instance = ?instance_id,
                pid = ?pid,
                removed,
                "Port released"
            );
        } else {
            tracing::debug!(app = %app_name, instance = ?instance_id, pid = ?pid, "Nothing to release");
        }

        removed > 0
    }

    /// Remove instances whose process has exited
    pub async fn cleanup(&self) -> usize {
        let mut registry = self.registry.lock().await;
        let cleaned = registry.sweep_dead(self.probe.as_ref());
        if cleaned > 0 {
            metrics::record_swept(cleaned);
            metrics::set_active_instances(registry.len());
            tracing::info!(cleaned, "Dead instances cleaned up");
        }
        cleaned
    }

    /// Live instances of all apps
    pub async fn active_instances(&self) -> Vec<ActiveInstance> {
        let mut registry = self.registry.lock().await;
        let instances = registry.all(self.probe.as_ref());
        metrics::set_active_instances(registry.len());
        instances
    }

    /// Live instances of one app
    pub async fn instances_for_app(&self, app_name: &str) -> Vec<ActiveInstance> {
        let mut registry = self.registry.lock().await;
        let instances = registry.for_app(self.probe.as_ref(), app_name);
        metrics::set_active_instances(registry.len());
        instances
    }

    /// Number of tracked instances, without sweeping
    pub async fn active_count(&self) -> usize {
        self.registry.lock().await.len()
    }
}

/// Draw a fresh instance id not bound for `app_name`
fn generate_unused_id(registry: &InstanceRegistry, app_name: &str) -> String {
    loop {
        let id = generate_instance_id();
        if registry.lookup(app_name, &id).is_none() {
            return id;
        }
    }
}

/// Short random instance id (see [`INSTANCE_ID_LEN`])
pub fn generate_instance_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(INSTANCE_ID_LEN);
    id
}
