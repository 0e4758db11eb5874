//! Firmware upgrade agent daemon
//!
//! Loads the upgrade configuration, resumes any verification owed from before
//! a restart, then watches the config file and starts an upgrade whenever the
//! desired firmware version changes. Runs until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ua_agent::{GrpcConnector, UpgradeOrchestrator};
use ua_core::config::{self, ConfigManager};
use ua_core::state::FileStateStore;

#[derive(Parser)]
#[command(name = "upgrade-agent")]
#[command(about = "Firmware upgrade agent - drives upgrades through the device control plane")]
#[command(version)]
struct Args {
    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Path of the durable upgrade-state record (overrides the config file)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground {
        "debug"
    } else {
        args.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Upgrade agent starting...");

    let config_path = args.config.unwrap_or_else(config::default_config_path);
    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {:?}", dir))?;
    }

    let manager = Arc::new(
        ConfigManager::load(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?,
    );
    let settings = manager.settings();
    let state_file = args.state_file.unwrap_or(settings.state_file);
    tracing::info!("Using config {:?}, upgrade state {:?}", config_path, state_file);

    let orchestrator = Arc::new(UpgradeOrchestrator::new(
        Arc::new(GrpcConnector::new()),
        Arc::new(FileStateStore::new(state_file)),
        settings.timeouts,
    ));

    if let Some(resumed) = orchestrator
        .initialize(manager.snapshot())
        .await
        .context("Failed to initialize orchestrator")?
    {
        tracing::info!(
            target_version = %resumed.target_version(),
            "Resumed verification in background"
        );
    }

    let on_update = Arc::clone(&orchestrator);
    let watcher = manager
        .start_watcher(move |snapshot| {
            // Workflows run detached; their outcome is reported through logs
            let _ = on_update.update_config(snapshot);
        })
        .context("Failed to start config watcher")?;

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    cancel.cancelled().await;

    watcher.stop().await;
    orchestrator.close();

    tracing::info!("Upgrade agent shutdown complete");
    Ok(())
}
