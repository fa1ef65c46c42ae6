use anyhow::{bail, Context, Result};

use devports::models::{AddAppRequest, AppConfig, AppInfo};
use devports::ports::PortStrategy;

use super::{connect, explain};

/// Parameters for `devports add`
#[derive(Debug, Clone, Default)]
pub struct AddParams {
    pub name: String,
    pub path: String,
    pub command: Option<String>,
    pub dedicated: Option<u16>,
    pub range: Option<String>,
    pub ports: Option<String>,
    pub step_start: Option<u16>,
    pub step_size: u16,
    pub step_count: u16,
}

impl AddParams {
    /// Strategy selected by the flags; `Any` when none is given
    pub fn strategy(&self) -> Result<PortStrategy> {
        let strategy = if let Some(port) = self.dedicated {
            PortStrategy::dedicated(port)?
        } else if let Some(range) = &self.range {
            let (start, end) = parse_range(range)?;
            PortStrategy::range(start, end)?
        } else if let Some(ports) = &self.ports {
            PortStrategy::list(parse_port_list(ports)?)?
        } else if let Some(start) = self.step_start {
            PortStrategy::stepped(start, self.step_size, self.step_count)?
        } else {
            PortStrategy::Any
        };
        Ok(strategy)
    }
}

/// Parse `A-B`
pub fn parse_range(value: &str) -> Result<(u16, u16)> {
    let Some((start, end)) = value.split_once('-') else {
        bail!("Port range must look like 8010-8019, got '{value}'");
    };
    let start = start
        .trim()
        .parse()
        .with_context(|| format!("Invalid range start in '{value}'"))?;
    let end = end
        .trim()
        .parse()
        .with_context(|| format!("Invalid range end in '{value}'"))?;
    Ok((start, end))
}

/// Parse `A,B,C`
pub fn parse_port_list(value: &str) -> Result<Vec<u16>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse().with_context(|| format!("Invalid port '{p}'")))
        .collect()
}

/// Register an app with the coordinator
pub async fn add(params: AddParams) -> Result<()> {
    let strategy = params.strategy()?;

    let path = std::path::Path::new(&params.path);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path)
    };

    let mut app = AppConfig::new(&params.name, path.display().to_string()).with_strategy(strategy);
    if let Some(command) = params.command {
        app = app.with_command(command);
    }

    let client = connect()?;
    client
        .add_app(&AddAppRequest::from(&app))
        .await
        .map_err(|e| explain(&client, e))?;

    println!("Added app '{}' ({})", app.name, app.port_strategy.kind());
    Ok(())
}

/// Remove an app from the coordinator
pub async fn remove(name: String) -> Result<()> {
    let client = connect()?;
    client
        .remove_app(&name)
        .await
        .map_err(|e| explain(&client, e))?;

    println!("Removed app '{name}'");
    Ok(())
}

/// List registered apps
pub async fn list() -> Result<()> {
    let client = connect()?;
    let apps = client.list_apps().await.map_err(|e| explain(&client, e))?;

    if apps.is_empty() {
        println!("No applications registered.");
        return Ok(());
    }

    println!("Registered Applications");
    println!("{:-<78}", "");
    println!("{:<20} {:<10} {:<30} PATH", "NAME", "STRATEGY", "PORTS");
    for (name, app) in &apps {
        println!(
            "{:<20} {:<10} {:<30} {}",
            name,
            app.port_strategy,
            summarize_ports(app),
            app.path
        );
    }
    Ok(())
}

/// Show one app and its running instances
pub async fn info(name: String) -> Result<()> {
    let client = connect()?;
    let Some(app) = client.get_app(&name).await.map_err(|e| explain(&client, e))? else {
        bail!("App '{name}' not found");
    };

    println!("Application: {}", app.name);
    println!("  Path: {}", app.path);
    println!("  Command: {}", app.command);
    println!("  Strategy: {}", app.port_strategy);
    println!("  Available ports: {}", summarize_ports(&app));

    let instances = client
        .instances(Some(&name))
        .await
        .map_err(|e| explain(&client, e))?;

    if instances.is_empty() {
        println!("\nNo running instances.");
    } else {
        println!("\nRunning instances:");
        for inst in instances {
            println!("  - {}: port {} (PID {})", inst.instance_id, inst.port, inst.pid);
        }
    }
    Ok(())
}

/// Short, single-line rendering of an app's candidate ports
fn summarize_ports(app: &AppInfo) -> String {
    if app.available_ports.is_empty() {
        return "(default range)".to_string();
    }

    let joined = app
        .available_ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    if joined.len() > 30 {
        format!("{}...", &joined[..27])
    } else {
        joined
    }
}
