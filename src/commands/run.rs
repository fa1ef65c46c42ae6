use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tokio::process::{Child, Command};

use devports::coordinator::CoordinatorClient;
use devports::models::{PortRequest, ReleaseRequest};

use super::{connect, explain};

/// How long a child gets to exit after Ctrl+C before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Parameters for `devports run`
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub name: String,
    pub instance: Option<String>,
    pub no_reload: bool,
}

static PORT_FLAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--port(?:\s+|=)\d+").unwrap());

static RELOAD_FLAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*--reload(\s|$)").unwrap());

/// Point `command` at `port`, replacing an existing `--port N` or appending one
pub fn apply_port(command: &str, port: u16, no_reload: bool) -> String {
    let replacement = format!("--port {port}");
    let mut command = if PORT_FLAG.is_match(command) {
        PORT_FLAG
            .replace_all(command, replacement.as_str())
            .into_owned()
    } else {
        format!("{} {replacement}", command.trim_end())
    };

    if no_reload {
        command = RELOAD_FLAG.replace_all(&command, "$1").into_owned();
    }

    command.trim().to_string()
}

/// Virtualenv activation script inside `app_dir`, if there is one
pub fn venv_activation(app_dir: &Path) -> Option<PathBuf> {
    let script = if cfg!(windows) {
        app_dir.join(".venv").join("Scripts").join("Activate.ps1")
    } else {
        app_dir.join(".venv").join("bin").join("activate")
    };
    script.exists().then_some(script)
}

/// Program and arguments that run `command` through the platform shell
pub fn shell_invocation(command: &str, activation: Option<&Path>) -> (String, Vec<String>) {
    if cfg!(windows) {
        let script = match activation {
            Some(path) => format!("& \"{}\"; {command}", path.display()),
            None => command.to_string(),
        };
        (
            "powershell".to_string(),
            vec!["-NoProfile".to_string(), "-Command".to_string(), script],
        )
    } else {
        let script = match activation {
            Some(path) => format!(". \"{}\" && {command}", path.display()),
            None => command.to_string(),
        };
        ("sh".to_string(), vec!["-c".to_string(), script])
    }
}

/// Allocate a port, run the app on it, and release the port on exit
pub async fn run(params: RunParams) -> Result<()> {
    let RunParams {
        name,
        instance,
        no_reload,
    } = params;

    let client = connect()?;

    let Some(app) = client.get_app(&name).await.map_err(|e| explain(&client, e))? else {
        bail!("App '{name}' not found. Register it first with 'devports add'.");
    };

    let app_dir = PathBuf::from(&app.path);
    if !app_dir.is_dir() {
        bail!("App path does not exist: {}", app_dir.display());
    }

    let mut request = PortRequest::new(&name, std::process::id());
    request.instance_id = instance;
    let allocation = client
        .allocate(&request)
        .await
        .map_err(|e| explain(&client, e))
        .context("Failed to allocate port")?;

    let port = allocation.port;
    let instance_id = allocation.instance_id;
    println!("Starting {name} on port {port} (instance: {instance_id})");

    let command = apply_port(&app.command, port, no_reload);
    let activation = venv_activation(&app_dir);
    let (program, args) = shell_invocation(&command, activation.as_deref());

    println!("Running: {command}");
    println!("Directory: {}", app_dir.display());

    let outcome = supervise(&client, &name, &instance_id, &program, &args, &app_dir).await;

    let release = ReleaseRequest {
        app_name: name.clone(),
        instance_id: Some(instance_id.clone()),
        pid: None,
    };
    match client.release(&release).await {
        Ok(_) => println!("Released port {port}"),
        Err(e) => tracing::warn!(app = %name, instance = %instance_id, "Failed to release port: {}", e),
    }

    let status = outcome?;
    if !status.success() {
        bail!("{name} exited with {status}");
    }
    Ok(())
}

/// Spawn the app, re-announce its pid and wait for it or for Ctrl+C
async fn supervise(
    client: &CoordinatorClient,
    name: &str,
    instance_id: &str,
    program: &str,
    args: &[String],
    app_dir: &Path,
) -> Result<ExitStatus> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(app_dir)
        .spawn()
        .with_context(|| format!("Failed to start {program}"))?;

    if let Some(pid) = child.id() {
        let announce = PortRequest::new(name, pid).with_instance_id(instance_id);
        if let Err(e) = client.allocate(&announce).await {
            tracing::warn!(app = %name, pid, "Failed to update instance pid: {}", e);
        }
    }

    let exited = tokio::select! {
        status = child.wait() => Some(status.context("Failed to wait for app")?),
        _ = tokio::signal::ctrl_c() => None,
    };

    match exited {
        Some(status) => Ok(status),
        None => {
            println!("\nInterrupted. Shutting down...");
            stop(&mut child).await
        }
    }
}

async fn stop(child: &mut Child) -> Result<ExitStatus> {
    // The child usually got the same SIGINT from the terminal
    if let Ok(status) = tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
        return Ok(status?);
    }

    child.start_kill().context("Failed to kill app")?;
    Ok(child.wait().await?)
}
