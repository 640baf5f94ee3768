// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Host Bootstrap
//!
//! Creates `ManagedHost` records on first contact, filling hostname, OS,
//! architecture and kernel from the host itself. Fact gathering is best
//! effort: a fact that cannot be read is stored empty.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Managed host registration

use std::sync::Arc;
use tracing::{info, warn};

use crate::application::errors::SyncError;
use crate::domain::host::{HostId, ManagedHost, LOCAL_HOST};
use crate::domain::host_command::HostCommand;
use crate::domain::remote::RemoteExecutor;
use crate::domain::repository::{HostRepository, RepositoryError};

pub struct HostBootstrap {
    hosts: Arc<dyn HostRepository>,
    executor: Arc<dyn RemoteExecutor>,
}

impl HostBootstrap {
    pub fn new(hosts: Arc<dyn HostRepository>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { hosts, executor }
    }

    /// Record for the controller host, created if missing.
    pub async fn ensure_local_host(&self) -> Result<ManagedHost, SyncError> {
        self.register(LOCAL_HOST, None).await
    }

    /// Return the record for `address`, probing and creating it on first
    /// contact. Existing records are never modified.
    pub async fn register(&self, address: &str, ssh_port: Option<u16>) -> Result<ManagedHost, SyncError> {
        let id = HostId::new(address);
        if let Some(existing) = self.hosts.find_by_id(&id).await? {
            return Ok(existing);
        }

        let mut host = ManagedHost::new(address);
        host.ssh_port = ssh_port;
        host.hostname = self.fact(address, HostCommand::Hostname).await;
        host.arch = self.fact(address, HostCommand::Arch).await;
        host.kernel = self.fact(address, HostCommand::KernelRelease).await;
        let (os, os_version) = parse_os_release(&self.fact(address, HostCommand::OsRelease).await);
        host.os = os;
        host.os_version = os_version;

        match self.hosts.create(&host).await {
            Ok(created) => {
                info!(host = address, hostname = %created.hostname, os = %created.os, "Managed host registered");
                Ok(created)
            }
            // Registered concurrently; keep the stored record.
            Err(RepositoryError::Conflict(_)) => self
                .hosts
                .find_by_id(&id)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn fact(&self, address: &str, cmd: HostCommand) -> String {
        match self.executor.run(address, &cmd).await {
            Ok(output) => output.trim().to_string(),
            Err(e) => {
                warn!(host = address, command = %cmd, error = %e, "Failed to read host fact");
                String::new()
            }
        }
    }
}

/// `NAME` and `VERSION_ID` from `/etc/os-release` content.
pub fn parse_os_release(content: &str) -> (String, String) {
    let mut name = String::new();
    let mut version = String::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "NAME" => name = value,
            "VERSION_ID" => version = value,
            _ => {}
        }
    }
    (name, version)
}
