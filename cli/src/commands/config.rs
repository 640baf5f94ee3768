// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use nas_core::domain::controller_config::ControllerConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./nas-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ControllerConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. NAS_CONFIG_PATH: {}",
            std::env::var("NAS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./nas-config.yaml");
        println!("  4. ~/.nas/config.yaml");
        println!("  5. /etc/nas/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Controller:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Database: {}", config.spec.database.path.display());
    println!();

    let ssh = &config.spec.ssh;
    println!("{}", "Remote shell:".bold());
    println!("  User: {}", ssh.user);
    println!("  Identities: {}", ssh.identity_dir.display());
    println!("  Default port: {}", ssh.default_port);
    println!("  Connect timeout: {:?}", ssh.connect_timeout);
    if let Some(timeout) = ssh.command_timeout {
        println!("  Command timeout: {:?}", timeout);
    }
    println!();

    let services = &config.spec.services;
    println!("{}", "Services:".bold());
    println!("  Mount root: {}", services.mount_root);
    println!("  Share config: {}", services.share_config_path);
    println!("  Export config: {}", services.export_config_path);
    println!("  Export unit: {}", services.export_service_unit);
    println!("  Anonymous account: {}", services.anonymous_account);
    println!();

    let schedule = &config.spec.schedule;
    println!("{}", "Schedule:".bold());
    println!("  mount_points: {}", schedule.mount_points);
    println!("  share_users: {}", schedule.share_users);
    println!("  shares: {}", schedule.shares);
    println!("  exports: {}", schedule.exports);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ControllerConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    let sample = serde_yaml::to_string(&ControllerConfigManifest::default())
        .context("Failed to serialize default configuration")?;

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nas-config.yaml");

        generate(path.clone()).await.unwrap();
        let config = ControllerConfigManifest::from_yaml_file(&path).unwrap();

        config.validate().unwrap();
        assert_eq!(config.spec.schedule.exports, "@every 30s");
        assert_eq!(config.spec.services.mount_root, "/mnt");
    }
}
