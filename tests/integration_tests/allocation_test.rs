//! Allocation engine scenarios
//!
//! Drives the coordinator context with a fake liveness probe:
//! 1. Sequential allocation and exhaustion
//! 2. Idempotent re-allocation
//! 3. Concurrent allocation without collisions
//! 4. Release and sweep

use std::collections::HashSet;
use std::sync::Arc;

use devports::error::Error;
use devports::models::{AppConfig, PortRequest};
use devports::ports::PortStrategy;
use tempfile::TempDir;

use crate::common::{coordinator_in, web1, FakeProbe};

// ============================================================================
// Sequential Allocation
// ============================================================================

#[tokio::test]
async fn test_range_fills_in_order_then_exhausts() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());
    coordinator.add_app(web1()).await.unwrap();

    let mut ports = Vec::new();
    for (i, id) in ["A", "B", "C"].into_iter().enumerate() {
        let response = coordinator
            .allocate_port(&PortRequest::new("web1", 100 + i as u32).with_instance_id(id))
            .await
            .unwrap();
        assert_eq!(response.instance_id, id);
        ports.push(response.port);
    }
    assert_eq!(ports, vec![8010, 8011, 8012]);

    let result = coordinator
        .allocate_port(&PortRequest::new("web1", 200).with_instance_id("D"))
        .await;
    assert!(matches!(result, Err(Error::PortExhaustion { ref app }) if app == "web1"));
    assert_eq!(coordinator.health().await.active_instances, 3);
}

#[tokio::test]
async fn test_unregistered_app_uses_default_range() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());

    let response = coordinator
        .allocate_port(&PortRequest::new("scratch", 1))
        .await
        .unwrap();

    assert_eq!(response.port, 8100);
    assert_eq!(response.app_name, "scratch");
}

#[tokio::test]
async fn test_ports_are_unique_across_apps() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());
    coordinator.add_app(web1()).await.unwrap();
    coordinator
        .add_app(AppConfig::new("api", "/src/api").with_strategy(PortStrategy::List(vec![
            8011, 8012, 8020,
        ])))
        .await
        .unwrap();

    let a = coordinator
        .allocate_port(&PortRequest::new("web1", 1).with_instance_id("x"))
        .await
        .unwrap();
    let b = coordinator
        .allocate_port(&PortRequest::new("web1", 2).with_instance_id("y"))
        .await
        .unwrap();
    let c = coordinator
        .allocate_port(&PortRequest::new("api", 3))
        .await
        .unwrap();

    assert_eq!((a.port, b.port), (8010, 8011));
    assert_eq!(c.port, 8012);
}

#[tokio::test]
async fn test_single_port_list_held_exhausts() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());
    coordinator
        .add_app(AppConfig::new("solo", "/src/solo").with_strategy(PortStrategy::List(vec![8300])))
        .await
        .unwrap();

    coordinator
        .allocate_port(&PortRequest::new("solo", 1).with_instance_id("a"))
        .await
        .unwrap();
    let result = coordinator
        .allocate_port(&PortRequest::new("solo", 2).with_instance_id("b"))
        .await;

    assert!(matches!(result, Err(Error::PortExhaustion { .. })));
}

#[tokio::test]
async fn test_foreign_listener_is_skipped() {
    let dir = TempDir::new().unwrap();
    let probe = FakeProbe::new();
    probe.block(8010);
    let coordinator = coordinator_in(&dir, probe);
    coordinator.add_app(web1()).await.unwrap();

    let response = coordinator
        .allocate_port(&PortRequest::new("web1", 1))
        .await
        .unwrap();

    assert_eq!(response.port, 8011);
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_reallocate_live_instance_returns_same_port() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());
    coordinator.add_app(web1()).await.unwrap();

    let first = coordinator
        .allocate_port(&PortRequest::new("web1", 100).with_instance_id("A"))
        .await
        .unwrap();
    let second = coordinator
        .allocate_port(&PortRequest::new("web1", 100).with_instance_id("A"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(coordinator.list_active_instances(None).await.len(), 1);
}

#[tokio::test]
async fn test_dead_owner_is_replaced_on_reallocate() {
    let dir = TempDir::new().unwrap();
    let probe = FakeProbe::new();
    let coordinator = coordinator_in(&dir, probe.clone());
    coordinator.add_app(web1()).await.unwrap();

    coordinator
        .allocate_port(&PortRequest::new("web1", 100).with_instance_id("A"))
        .await
        .unwrap();
    probe.kill(100);

    let response = coordinator
        .allocate_port(&PortRequest::new("web1", 300).with_instance_id("A"))
        .await
        .unwrap();

    assert_eq!(response.port, 8010);
    let instances = coordinator.list_active_instances(Some("web1")).await;
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].pid, 300);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_never_collide() {
    let dir = TempDir::new().unwrap();
    let coordinator = Arc::new(coordinator_in(&dir, FakeProbe::new()));
    coordinator
        .add_app(AppConfig::new("swarm", "/src/swarm").with_strategy(PortStrategy::Range {
            start: 9100,
            end: 9119,
        }))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for pid in 0..32u32 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .allocate_port(&PortRequest::new("swarm", 1000 + pid))
                .await
        }));
    }

    let mut granted = Vec::new();
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(response) => granted.push(response.port),
            Err(Error::PortExhaustion { .. }) => exhausted += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let unique: HashSet<u16> = granted.iter().copied().collect();
    assert_eq!(unique.len(), granted.len());
    assert_eq!(granted.len(), 20);
    assert_eq!(exhausted, 12);
}

// ============================================================================
// Release and Sweep
// ============================================================================

#[tokio::test]
async fn test_release_then_reallocate_reuses_port() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());
    coordinator.add_app(web1()).await.unwrap();

    let first = coordinator
        .allocate_port(&PortRequest::new("web1", 1).with_instance_id("A"))
        .await
        .unwrap();
    assert!(coordinator.release_port("web1", Some("A"), None).await);
    assert!(!coordinator.release_port("web1", Some("A"), None).await);

    let second = coordinator
        .allocate_port(&PortRequest::new("web1", 2).with_instance_id("B"))
        .await
        .unwrap();
    assert_eq!(first.port, second.port);
}

#[tokio::test]
async fn test_release_by_pid_removes_every_match() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());
    coordinator.add_app(web1()).await.unwrap();

    for id in ["A", "B"] {
        coordinator
            .allocate_port(&PortRequest::new("web1", 77).with_instance_id(id))
            .await
            .unwrap();
    }
    coordinator
        .allocate_port(&PortRequest::new("web1", 78).with_instance_id("C"))
        .await
        .unwrap();

    assert!(coordinator.release_port("web1", None, Some(77)).await);

    let remaining = coordinator.list_active_instances(Some("web1")).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].instance_id, "C");
    assert!(!coordinator.release_port("other", None, Some(78)).await);
}

#[tokio::test]
async fn test_empty_instance_id_releases_by_pid() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());

    let granted = coordinator
        .allocate_port(&PortRequest::new("web", 100).with_instance_id(""))
        .await
        .unwrap();
    assert!(!granted.instance_id.is_empty());
    assert_eq!(granted.port, 8100);

    assert!(coordinator.release_port("web", Some(""), Some(100)).await);
    assert!(coordinator.list_active_instances(Some("web")).await.is_empty());
}

#[tokio::test]
async fn test_sweep_removes_exactly_dead_instances() {
    let dir = TempDir::new().unwrap();
    let probe = FakeProbe::new();
    let coordinator = coordinator_in(&dir, probe.clone());
    coordinator.add_app(web1()).await.unwrap();

    for (id, pid) in [("A", 1), ("B", 2), ("C", 3)] {
        coordinator
            .allocate_port(&PortRequest::new("web1", pid).with_instance_id(id))
            .await
            .unwrap();
    }
    probe.kill(1);
    probe.kill(3);

    assert_eq!(coordinator.cleanup_dead_instances().await, 2);
    assert_eq!(coordinator.cleanup_dead_instances().await, 0);

    let live = coordinator.list_active_instances(None).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].instance_id, "B");
}

#[tokio::test]
async fn test_listing_never_shows_dead_pids() {
    let dir = TempDir::new().unwrap();
    let probe = FakeProbe::new();
    let coordinator = coordinator_in(&dir, probe.clone());

    coordinator
        .allocate_port(&PortRequest::new("a", 10))
        .await
        .unwrap();
    coordinator
        .allocate_port(&PortRequest::new("b", 11))
        .await
        .unwrap();
    probe.kill(10);

    let live = coordinator.list_active_instances(None).await;
    assert!(live.iter().all(|inst| inst.pid != 10));
    assert_eq!(coordinator.health().await.active_instances, 1);
}

#[tokio::test]
async fn test_listing_is_sorted_by_app_then_port() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator_in(&dir, FakeProbe::new());

    for app in ["zeta", "alpha", "zeta", "alpha"] {
        coordinator
            .allocate_port(&PortRequest::new(app, 5))
            .await
            .unwrap();
    }

    let keys: Vec<(String, u16)> = coordinator
        .list_active_instances(None)
        .await
        .into_iter()
        .map(|inst| (inst.app_name, inst.port))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}
