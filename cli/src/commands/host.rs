// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Managed host commands
//!
//! Commands: add, list

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use nas_core::domain::controller_config::ControllerConfigManifest;

use crate::controller::Controller;

#[derive(Subcommand)]
pub enum HostCommand {
    /// Check that a host is reachable and record it as managed
    Add {
        /// Network address of the host
        address: String,

        /// Remote shell port (default: spec.ssh.default_port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List managed hosts
    List,
}

pub async fn handle_command(command: HostCommand, config: ControllerConfigManifest) -> Result<()> {
    let controller = Controller::open(config).await?;

    match command {
        HostCommand::Add { address, port } => {
            let host = controller
                .bootstrap()
                .register(&address, port)
                .await
                .with_context(|| format!("Failed to register host {}", address))?;
            println!(
                "{}",
                format!("✓ Host registered: {} ({})", host.address, host.hostname).green()
            );
        }
        HostCommand::List => {
            let hosts = controller
                .repositories
                .hosts
                .list_all()
                .await
                .context("Failed to list hosts")?;
            if hosts.is_empty() {
                println!("{}", "No managed hosts".dimmed());
            }
            for host in hosts {
                let port = host
                    .ssh_port
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "default".to_string());
                println!(
                    "{}  {}  {} {}  {}  {}  port {}",
                    host.address.bold(),
                    host.hostname,
                    host.os,
                    host.os_version,
                    host.arch,
                    host.kernel,
                    port
                );
            }
        }
    }

    Ok(())
}
