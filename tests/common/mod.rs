//! Common test utilities

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use devports::config::ConfigStore;
use devports::coordinator::Coordinator;
use devports::models::AppConfig;
use devports::ports::{LivenessProbe, PortStrategy};
use tempfile::TempDir;

/// Liveness probe driven by the test
///
/// Every pid is alive and every port bindable until the test says otherwise.
#[derive(Default)]
pub struct FakeProbe {
    dead: Mutex<HashSet<u32>>,
    blocked: Mutex<HashSet<u16>>,
}

impl FakeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `pid` as exited
    pub fn kill(&self, pid: u32) {
        self.dead.lock().unwrap().insert(pid);
    }

    /// Make `port` look bound by some unrelated process
    pub fn block(&self, port: u16) {
        self.blocked.lock().unwrap().insert(port);
    }
}

impl LivenessProbe for FakeProbe {
    fn process_alive(&self, pid: u32) -> bool {
        !self.dead.lock().unwrap().contains(&pid)
    }

    fn port_bindable(&self, port: u16) -> bool {
        !self.blocked.lock().unwrap().contains(&port)
    }
}

/// Coordinator over a fresh config file in `dir`
pub fn coordinator_in(dir: &TempDir, probe: Arc<FakeProbe>) -> Coordinator {
    let store = ConfigStore::open(dir.path().join("config.json")).unwrap();
    Coordinator::with_probe(store, probe)
}

/// The `web1` app used throughout: three ports, 8010-8012
pub fn web1() -> AppConfig {
    AppConfig::new("web1", "/src/web1").with_strategy(PortStrategy::Range {
        start: 8010,
        end: 8012,
    })
}
