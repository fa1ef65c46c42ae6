//! Prometheus metrics for the port coordinator
//!
//! This module tracks:
//! - Allocations, releases and exhaustion failures per app
//! - Dead instances reclaimed by sweeps
//! - Currently tracked instances
//! - API requests by endpoint and status
//!
//! # Usage
//!
//! Call `init_metrics()` at daemon startup to register all metrics.
//! Until then (and if initialization fails) the record functions are no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec, Counter,
    CounterVec, Encoder, Gauge, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all coordinator metrics
struct CoordinatorMetrics {
    allocations: CounterVec,
    releases: CounterVec,
    exhaustions: CounterVec,
    swept_instances: Counter,
    active_instances: Gauge,
    api_requests: CounterVec,
    api_duration: HistogramVec,
}

/// Global storage for coordinator metrics
static COORDINATOR_METRICS: OnceLock<CoordinatorMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers anything.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = devports::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let coordinator = CoordinatorMetrics {
        allocations: register_counter_vec!(
            "devports_allocations_total",
            "Total ports allocated by app",
            &["app"]
        )?,
        releases: register_counter_vec!(
            "devports_releases_total",
            "Total instances released by app",
            &["app"]
        )?,
        exhaustions: register_counter_vec!(
            "devports_exhaustions_total",
            "Total allocation requests that found no free port",
            &["app"]
        )?,
        swept_instances: register_counter!(
            "devports_swept_instances_total",
            "Total instances removed because their process exited"
        )?,
        active_instances: register_gauge!(
            "devports_active_instances",
            "Number of currently tracked instances"
        )?,
        api_requests: register_counter_vec!(
            "devports_api_requests_total",
            "Total API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "devports_api_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
        )?,
    };

    COORDINATOR_METRICS
        .set(coordinator)
        .map_err(|_| "Coordinator metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    COORDINATOR_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a successful allocation
pub fn record_allocation(app: &str) {
    if let Some(m) = COORDINATOR_METRICS.get() {
        m.allocations.with_label_values(&[app]).inc();
    }
}

/// Record released instances
pub fn record_release(app: &str, count: usize) {
    if let Some(m) = COORDINATOR_METRICS.get() {
        m.releases.with_label_values(&[app]).inc_by(count as f64);
    }
}

/// Record an allocation that found no free port
pub fn record_exhaustion(app: &str) {
    if let Some(m) = COORDINATOR_METRICS.get() {
        m.exhaustions.with_label_values(&[app]).inc();
    }
}

/// Record instances removed by a sweep
pub fn record_swept(count: usize) {
    if let Some(m) = COORDINATOR_METRICS.get() {
        m.swept_instances.inc_by(count as f64);
    }
}

/// Update the tracked-instance gauge
pub fn set_active_instances(count: usize) {
    if let Some(m) = COORDINATOR_METRICS.get() {
        m.active_instances.set(count as f64);
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = COORDINATOR_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, status_str.as_str()])
        .inc();
    m.api_duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}
