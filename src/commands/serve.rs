use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use devports::config::{ConfigStore, DaemonSettings};
use devports::coordinator::{Coordinator, CoordinatorServer};
use devports::metrics;

/// Parameters for the coordinator daemon
#[derive(Debug, Clone, Default)]
pub struct ServeParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub settings_file: Option<PathBuf>,
    pub sweep_interval: Option<u64>,
    pub enable_cors: bool,
    pub disable_request_logging: bool,
}

/// Resolve daemon settings: TOML file or environment, then CLI overrides
pub fn resolve_settings(params: &ServeParams) -> Result<DaemonSettings> {
    let base = match &params.settings_file {
        Some(path) => DaemonSettings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => DaemonSettings::from_env().context("Invalid DEVPORTS_* environment")?,
    };

    let mut builder = DaemonSettings::builder()
        .bind_host(base.bind_host)
        .sweep_interval_secs(params.sweep_interval.unwrap_or(base.sweep_interval_secs))
        .enable_cors(params.enable_cors || base.enable_cors)
        .enable_request_logging(base.enable_request_logging && !params.disable_request_logging);

    if let Some(host) = &params.host {
        builder = builder.bind_host_str(host)?;
    }
    if let Some(port) = params.port.or(base.port) {
        builder = builder.port(port);
    }
    if let Some(path) = params.config.clone().or(base.config_path) {
        builder = builder.config_path(path);
    }

    Ok(builder.build()?)
}

/// Run the coordinator daemon in the foreground
pub async fn serve(params: ServeParams) -> Result<()> {
    let settings = resolve_settings(&params)?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    let config_path = settings
        .config_path
        .clone()
        .unwrap_or_else(ConfigStore::default_path);

    let coordinator = Coordinator::open(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let server = CoordinatorServer::new(Arc::new(coordinator), settings)
        .await
        .context("Failed to create coordinator server")?;

    println!("{}", server.info().display());
    println!();
    println!("API Endpoints:");
    println!("  POST   /port/allocate      - Allocate a port for an instance");
    println!("  POST   /port/release       - Release an instance's port");
    println!("  GET    /instances          - List live instances");
    println!("  GET    /instances/{{app}}    - List live instances of one app");
    println!("  POST   /instances/cleanup  - Remove dead instances");
    println!("  GET    /apps               - List registered apps");
    println!("  GET    /apps/{{name}}        - Show one app");
    println!("  POST   /apps               - Register an app");
    println!("  DELETE /apps/{{name}}        - Remove an app");
    println!("  GET    /config             - Show daemon config");
    println!("  POST   /config/reload      - Re-read the config file");
    println!("  GET    /health             - Health check");
    println!("  GET    /metrics            - Prometheus metrics endpoint");
    println!();
    println!("Coordinator listening on http://{}", server.bind_address());
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Coordinator stopped.");
    Ok(())
}
