use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{AddParams, RunParams, ServeParams};

#[derive(Parser)]
#[command(
    name = "devports",
    version,
    about = "Port coordinator and launcher for local development servers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator daemon in the foreground
    Serve {
        /// Address to bind (default: 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: coordinator_port from the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Config file (default: $DEVPORTS_CONFIG or ~/.devports/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Daemon settings file (TOML); otherwise DEVPORTS_* variables are used
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Seconds between dead-instance sweeps
        #[arg(long)]
        sweep_interval: Option<u64>,

        /// Enable CORS
        #[arg(long, default_value = "false")]
        cors: bool,

        /// Disable per-request logging
        #[arg(long, default_value = "false")]
        no_request_log: bool,
    },

    /// Check whether the coordinator is running
    Health,

    /// Register an application
    Add {
        /// Application name
        name: String,

        /// Path to the application directory
        #[arg(short, long)]
        path: String,

        /// Launch command (default: uvicorn app.main:app --reload)
        #[arg(short, long)]
        command: Option<String>,

        /// Dedicated port
        #[arg(short, long, group = "strategy")]
        dedicated: Option<u16>,

        /// Port range, e.g. 8010-8019
        #[arg(short, long, group = "strategy")]
        range: Option<String>,

        /// Port list, e.g. 8010,8015,8020
        #[arg(short = 'l', long, group = "strategy")]
        ports: Option<String>,

        /// Stepped: first port
        #[arg(long, group = "strategy")]
        step_start: Option<u16>,

        /// Stepped: increment
        #[arg(long, default_value = "1")]
        step_size: u16,

        /// Stepped: number of ports
        #[arg(long, default_value = "10")]
        step_count: u16,
    },

    /// Remove an application
    Remove {
        /// Application name
        name: String,
    },

    /// List registered applications
    List,

    /// Show one application and its running instances
    Info {
        /// Application name
        name: String,
    },

    /// Show running instances
    Status,

    /// Remove instances whose process has exited
    Cleanup,

    /// Make the coordinator re-read its config file
    Reload,

    /// Run an application on an allocated port
    Run {
        /// Application name
        name: String,

        /// Instance id, for running several copies side by side
        #[arg(short, long)]
        instance: Option<String>,

        /// Strip --reload from the command
        #[arg(long, default_value = "false")]
        no_reload: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            config,
            settings,
            sweep_interval,
            cors,
            no_request_log,
        } => {
            tracing::info!(
                host = ?host,
                port = ?port,
                config = ?config,
                "Starting serve command"
            );
            commands::serve(ServeParams {
                host,
                port,
                config,
                settings_file: settings,
                sweep_interval,
                enable_cors: cors,
                disable_request_logging: no_request_log,
            })
            .await?;
        }

        Commands::Health => commands::health().await?,

        Commands::Add {
            name,
            path,
            command,
            dedicated,
            range,
            ports,
            step_start,
            step_size,
            step_count,
        } => {
            tracing::debug!(name = %name, path = %path, "Starting add command");
            commands::add(AddParams {
                name,
                path,
                command,
                dedicated,
                range,
                ports,
                step_start,
                step_size,
                step_count,
            })
            .await?;
        }

        Commands::Remove { name } => commands::remove(name).await?,
        Commands::List => commands::list().await?,
        Commands::Info { name } => commands::info(name).await?,
        Commands::Status => commands::status().await?,
        Commands::Cleanup => commands::cleanup().await?,
        Commands::Reload => commands::reload().await?,

        Commands::Run {
            name,
            instance,
            no_reload,
        } => {
            tracing::debug!(name = %name, instance = ?instance, no_reload, "Starting run command");
            commands::run(RunParams {
                name,
                instance,
                no_reload,
            })
            .await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("devports=debug,tower_http=debug,info")
        } else {
            tracing_subscriber::EnvFilter::new("devports=info,warn")
        }
    });

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
