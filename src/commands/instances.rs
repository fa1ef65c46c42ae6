use anyhow::Result;

use super::{connect, explain};

/// Show running instances
pub async fn status() -> Result<()> {
    let client = connect()?;
    let instances = client.instances(None).await.map_err(|e| explain(&client, e))?;

    if instances.is_empty() {
        println!("No active instances.");
        return Ok(());
    }

    println!("Active Instances");
    println!("{:-<78}", "");
    println!(
        "{:<20} {:<10} {:<6} {:<8} STARTED",
        "APP", "INSTANCE", "PORT", "PID"
    );
    for inst in &instances {
        println!(
            "{:<20} {:<10} {:<6} {:<8} {}",
            inst.app_name,
            inst.instance_id,
            inst.port,
            inst.pid,
            inst.started_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Remove instances whose process has exited
pub async fn cleanup() -> Result<()> {
    let client = connect()?;
    let cleaned = client.cleanup().await.map_err(|e| explain(&client, e))?;

    println!("Cleaned up {cleaned} dead instance(s).");
    Ok(())
}

/// Check whether the coordinator is up
pub async fn health() -> Result<()> {
    let client = connect()?;
    let health = client.health().await.map_err(|e| explain(&client, e))?;
    let config = client.config().await.map_err(|e| explain(&client, e))?;

    println!("Coordinator is {} (v{})", health.status, health.version);
    println!("  URL: {}", client.base_url());
    println!("  Uptime: {}s", health.uptime_secs);
    println!("  Apps registered: {}", health.apps_registered);
    println!("  Active instances: {}", health.active_instances);
    println!(
        "  Default range: {}-{}",
        config.default_port_range.0, config.default_port_range.1
    );
    println!("  Config file: {}", config.config_path);
    Ok(())
}

/// Ask the coordinator to re-read its config file
pub async fn reload() -> Result<()> {
    let client = connect()?;
    client
        .reload_config()
        .await
        .map_err(|e| explain(&client, e))?;

    println!("Configuration reloaded.");
    Ok(())
}
