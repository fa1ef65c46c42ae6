//! Instance registry for tracking running app instances
//!
//! The registry is the in-memory table of `(app_name, instance_id)` bindings.
//! It is plain data: callers serialize access to it (see
//! [`PortAllocator`](super::allocator::PortAllocator)), which lets one
//! allocation run its whole check-then-insert sequence under a single lock.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::models::{ActiveInstance, InstanceKey};

use super::liveness::LivenessProbe;

// ============================================================================
// Instance Registry
// ============================================================================

/// Table of active instances
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: HashMap<InstanceKey, ActiveInstance>,
}

impl InstanceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the instance bound to `(app_name, instance_id)`
    pub fn lookup(&self, app_name: &str, instance_id: &str) -> Option<&ActiveInstance> {
        self.instances.get(&InstanceKey::new(app_name, instance_id))
    }

    /// Insert a new binding
    ///
    /// Fails if the key is already bound or the port is held by another entry.
    pub fn insert(&mut self, instance: ActiveInstance) -> Result<(), RegistryError> {
        let key = instance.key();
        if self.instances.contains_key(&key) {
            return Err(RegistryError::DuplicateKey(key));
        }
        if let Some(holder) = self.instances.values().find(|i| i.port == instance.port) {
            return Err(RegistryError::PortHeld {
                port: instance.port,
                holder: holder.key(),
            });
        }

        self.instances.insert(key, instance);
        Ok(())
    }

    /// Remove one binding by key
    pub fn remove_by_key(&mut self, app_name: &str, instance_id: &str) -> bool {
        self.instances
            .remove(&InstanceKey::new(app_name, instance_id))
            .is_some()
    }

    /// Remove every binding of `app_name` owned by `pid`
    pub fn remove_by_pid(&mut self, app_name: &str, pid: u32) -> usize {
        let before = self.instances.len();
        self.instances
            .retain(|_, i| !(i.app_name == app_name && i.pid == pid));
        before - self.instances.len()
    }

    /// Remove bindings whose owning process has exited
    pub fn sweep_dead(&mut self, probe: &dyn LivenessProbe) -> usize {
        let before = self.instances.len();
        self.instances.retain(|key, instance| {
            let alive = probe.process_alive(instance.pid);
            if !alive {
                tracing::info!(
                    instance = %key,
                    port = instance.port,
                    pid = instance.pid,
                    "Removing instance with dead process"
                );
            }
            alive
        });
        before - self.instances.len()
    }

    /// Ports held by any binding
    pub fn held_ports(&self) -> HashSet<u16> {
        self.instances.values().map(|i| i.port).collect()
    }

    /// Snapshot of all live instances (sweeps first)
    pub fn all(&mut self, probe: &dyn LivenessProbe) -> Vec<ActiveInstance> {
        self.sweep_dead(probe);
        self.sorted(|_| true)
    }

    /// Snapshot of live instances of one app (sweeps first)
    pub fn for_app(&mut self, probe: &dyn LivenessProbe, app_name: &str) -> Vec<ActiveInstance> {
        self.sweep_dead(probe);
        self.sorted(|i| i.app_name == app_name)
    }

    /// Number of bindings, stale ones included
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn sorted(&self, filter: impl Fn(&ActiveInstance) -> bool) -> Vec<ActiveInstance> {
        let mut instances: Vec<_> = self
            .instances
            .values()
            .filter(|i| filter(i))
            .cloned()
            .collect();
        instances.sort_by(|a, b| (&a.app_name, a.port).cmp(&(&b.app_name, b.port)));
        instances
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Key already bound
    #[error("Instance already registered: {0}")]
    DuplicateKey(InstanceKey),

    /// Port held by another binding
    #[error("Port {port} is already held by {holder}")]
    PortHeld { port: u16, holder: InstanceKey },
}

// ============================================================================
// Tests
// ============================================================================
