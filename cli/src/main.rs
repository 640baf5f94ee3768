// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # NAS Controller
//!
//! The `nasd` binary converges mount points, share accounts, share
//! definitions and export configuration on every managed host.
//!
//! ## Commands
//!
//! - `nasd run` - Run every reconciler on its schedule until stopped
//! - `nasd sync [job]` - Run one reconciliation pass and exit
//! - `nasd test-exports FILE` - Validate candidate exports without applying them
//! - `nasd host add|list` - Managed host inventory
//! - `nasd config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use nas_core::domain::controller_config::ControllerConfigManifest;
use nas_orchestrator::commands::{self, ConfigCommand, HostCommand, JobSelector};

/// NAS controller - reconcile file-share state across managed hosts
#[derive(Parser)]
#[command(name = "nasd")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "NAS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true, env = "NAS_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconciliation loops until SIGINT/SIGTERM
    #[command(name = "run")]
    Run,

    /// Run a single reconciliation pass
    #[command(name = "sync")]
    Sync {
        #[arg(value_enum, default_value = "all")]
        job: JobSelector,
    },

    /// Dry-run candidate exports through the export daemon validator
    #[command(name = "test-exports")]
    TestExports {
        /// YAML list of exports
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Managed host inventory
    #[command(name = "host")]
    Host {
        #[command(subcommand)]
        command: HostCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        eprintln!("{}", "No command specified. Use --help for usage.".yellow());
        std::process::exit(1);
    };

    // Config commands report load failures themselves.
    let command = match command {
        Commands::Config { command } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            return commands::config::handle_command(command, cli.config).await;
        }
        other => other,
    };

    let config = ControllerConfigManifest::load_or_default(cli.config)
        .context("Failed to load configuration")?;
    let (level, format) = match config.logging() {
        Some(logging) => (logging.level.clone(), logging.format.clone()),
        None => ("info".to_string(), "text".to_string()),
    };
    init_logging(cli.log_level.as_deref().unwrap_or(&level), &format)?;
    info!(controller = %config.metadata.name, "Configuration loaded");

    match command {
        Commands::Run => commands::run::execute(config).await,
        Commands::Sync { job } => commands::sync::execute(config, job).await,
        Commands::TestExports { file, json } => {
            commands::exports::test_exports(config, file, json).await
        }
        Commands::Host { command } => commands::host::handle_command(command, config).await,
        Commands::Config { command } => commands::config::handle_command(command, None).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
