// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Remote Execution Gateway
//!
//! [`HostGateway`] implements [`RemoteExecutor`] by dispatching loopback and
//! empty addresses to a local `sh -c` and everything else to the system `ssh`
//! client. Calls are stateless: nothing is pooled between them.
//!
//! Remote-shell ports come from the host store on every call, so hosts
//! registered by another process are reached on their stored port. The
//! in-process table only covers store outages and gateways built without a
//! store.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Local/remote shell execution and file writes

pub mod fake;
pub mod local;
pub mod ssh;

pub use fake::{FakeHostState, FakeHosts};
pub use local::LocalShell;
pub use ssh::SshShell;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::domain::controller_config::SshConfig;
use crate::domain::host::{is_local_address, HostId, ManagedHost};
use crate::domain::remote::{RemoteExecError, RemoteExecutor};
use crate::domain::repository::HostRepository;

/// Locale export plus stdout/stderr merging applied to every command.
pub(crate) fn wrap_command(cmd: &str) -> String {
    format!("export LANG=en_US.UTF-8; {} 2>&1", cmd)
}

/// Stdout followed by stderr; non-zero exit becomes `ExecFailed`.
pub(crate) fn collect_output(output: Output) -> Result<String, RemoteExecError> {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    if output.status.success() {
        Ok(text)
    } else {
        let message = match output.status.code() {
            Some(code) => format!("command exited with status {}", code),
            None => "command terminated by signal".to_string(),
        };
        Err(RemoteExecError::ExecFailed { message, output: text })
    }
}

/// Spawn `process`, stream `input` to its stdin when given, and collect its
/// output. `program` names the process in error messages.
pub(crate) async fn run_process(
    mut process: tokio::process::Command,
    input: Option<&[u8]>,
    limit: Option<Duration>,
    program: &str,
) -> Result<Output, RemoteExecError> {
    process
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let run = async {
        let mut child = process.spawn()?;
        if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(bytes).await?;
            stdin.shutdown().await?;
        }
        child.wait_with_output().await
    };

    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
            RemoteExecError::exec_failed(
                format!("{} timed out after {:?}", program, limit),
                String::new(),
            )
        })?,
        None => run.await,
    };
    result.map_err(|e| {
        RemoteExecError::exec_failed(format!("failed to execute {}: {}", program, e), String::new())
    })
}

pub struct HostGateway {
    local: LocalShell,
    ssh: SshShell,
    default_port: u16,
    ports: RwLock<HashMap<String, u16>>,
    hosts: Option<Arc<dyn HostRepository>>,
}

impl HostGateway {
    pub fn new(local: LocalShell, ssh: SshShell, default_port: u16) -> Self {
        Self {
            local,
            ssh,
            default_port,
            ports: RwLock::new(HashMap::new()),
            hosts: None,
        }
    }

    pub fn from_config(config: &SshConfig) -> Self {
        Self::new(
            LocalShell::new(config.command_timeout),
            SshShell::from_config(config),
            config.default_port,
        )
    }

    /// Resolve ports through `hosts` on every remote call.
    pub fn with_host_store(mut self, hosts: Arc<dyn HostRepository>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    /// Record the remote-shell port of known hosts.
    pub fn register_hosts(&self, hosts: &[ManagedHost]) {
        let mut ports = self.ports.write();
        for host in hosts {
            match host.ssh_port {
                Some(port) => ports.insert(host.address.clone(), port),
                None => ports.remove(&host.address),
            };
        }
    }

    /// Port used to reach `address`: the stored host record first, then the
    /// last known port, then the configured default.
    pub async fn port_for(&self, address: &str) -> u16 {
        if let Some(hosts) = &self.hosts {
            match hosts.find_by_id(&HostId::new(address)).await {
                Ok(Some(host)) => {
                    self.register_hosts(std::slice::from_ref(&host));
                    return host.ssh_port.unwrap_or(self.default_port);
                }
                Ok(None) => {}
                Err(e) => warn!(host = address, error = %e, "Host lookup failed, using last known port"),
            }
        }
        self.cached_port(address)
    }

    fn cached_port(&self, address: &str) -> u16 {
        self.ports
            .read()
            .get(address)
            .copied()
            .unwrap_or(self.default_port)
    }
}

#[async_trait]
impl RemoteExecutor for HostGateway {
    async fn command(&self, host: &str, cmd: &str) -> Result<String, RemoteExecError> {
        if is_local_address(host) {
            self.local.command(cmd).await
        } else {
            let port = self.port_for(host).await;
            self.ssh.command(host, port, cmd).await
        }
    }

    async fn write_file(
        &self,
        host: &str,
        path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), RemoteExecError> {
        if is_local_address(host) {
            self.local.write_file(path, content, mode).await
        } else {
            let port = self.port_for(host).await;
            self.ssh.write_file(host, port, path, content, mode).await
        }
    }
}
