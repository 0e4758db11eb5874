//! upgrade-ctl
//!
//! Operator tool for the firmware upgrade agent:
//! - Inspect or clear the durable upgrade record
//! - Show the watched config file or set a new desired version
//! - Probe the control plane with read-only diagnostics

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ua_cli::commands;
use ua_cli::output::print_error;

#[derive(Parser)]
#[command(name = "upgrade-ctl")]
#[command(author, version, about = "Firmware upgrade agent control tool")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the agent's configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "CONFIG_PATH",
        default_value = ua_core::config::DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    /// Path of the upgrade state file (overrides the config file)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or clear the durable upgrade record
    State {
        #[command(subcommand)]
        action: StateAction,
    },

    /// Manage the watched configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run read-only diagnostics against the control plane
    Probe {
        /// Control-plane address (overrides the config file)
        #[arg(short, long)]
        target: Option<String>,
        /// Per-call deadline in seconds
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Show the stored upgrade record
    Show {
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the stored upgrade record
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the desired firmware version, triggering an upgrade
    SetVersion {
        /// Version to install
        #[arg(id = "target_version", value_name = "VERSION")]
        version: String,
        /// Wait this many seconds before writing
        #[arg(short, long)]
        delay: Option<u64>,
        /// Only write if the config currently names this version
        #[arg(long)]
        only_if: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match cli.command {
        Commands::State { action } => {
            let state_file = commands::resolve_state_file(&cli.config, cli.state_file.as_ref());
            match action {
                StateAction::Show { json } => commands::state_show(&state_file, json).await,
                StateAction::Clear => commands::state_clear(&state_file).await,
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&cli.config),
            ConfigAction::SetVersion {
                version,
                delay,
                only_if,
            } => {
                commands::config_set_version(&cli.config, &version, delay, only_if.as_deref())
                    .await
            }
        },

        Commands::Probe { target, timeout } => {
            commands::probe_command(&cli.config, target.as_deref(), Duration::from_secs(timeout))
                .await
        }
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
