// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Remote shell runner over the system `ssh` client.
//!
//! Each call spawns one non-interactive `ssh` process, so nothing stays open
//! once the call returns. Host keys are accepted on first contact; ssh's own
//! diagnostics are limited to errors so they never mix into command output.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use super::{collect_output, run_process, wrap_command};
use crate::domain::controller_config::SshConfig;
use crate::domain::host_command::HostCommand;
use crate::domain::remote::RemoteExecError;

#[derive(Debug, Clone)]
pub struct SshShell {
    user: String,
    identities: Vec<PathBuf>,
    connect_timeout: Duration,
    command_timeout: Option<Duration>,
}

impl SshShell {
    pub fn new(
        user: impl Into<String>,
        identities: Vec<PathBuf>,
        connect_timeout: Duration,
        command_timeout: Option<Duration>,
    ) -> Self {
        Self {
            user: user.into(),
            identities,
            connect_timeout,
            command_timeout,
        }
    }

    pub fn from_config(config: &SshConfig) -> Self {
        Self::new(
            config.user.clone(),
            discover_identities(&config.identity_dir),
            config.connect_timeout,
            config.command_timeout,
        )
    }

    pub fn identities(&self) -> &[PathBuf] {
        &self.identities
    }

    /// Arguments passed to `ssh`, remote command last.
    pub fn build_args(&self, address: &str, port: u16, cmd: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-p".to_string(),
            port.to_string(),
        ];
        for identity in &self.identities {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().into_owned());
        }
        args.push("-l".to_string());
        args.push(self.user.clone());
        args.push(address.to_string());
        args.push(wrap_command(cmd));
        args
    }

    pub async fn command(&self, address: &str, port: u16, cmd: &str) -> Result<String, RemoteExecError> {
        self.exec(address, port, cmd, None).await
    }

    /// Streams `content` into `cat` on the host, then applies `mode`.
    pub async fn write_file(
        &self,
        address: &str,
        port: u16,
        path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), RemoteExecError> {
        self.exec(address, port, &write_command(path, mode), Some(content))
            .await
            .map(|_| ())
    }

    async fn exec(
        &self,
        address: &str,
        port: u16,
        cmd: &str,
        input: Option<&[u8]>,
    ) -> Result<String, RemoteExecError> {
        debug!(host = address, port, command = cmd, "Running remote command");
        let mut process = tokio::process::Command::new("ssh");
        process.args(self.build_args(address, port, cmd));

        let program = format!("ssh to {}", address);
        let output = run_process(process, input, self.command_timeout, &program).await?;

        collect_output(output).map_err(|e| match e {
            RemoteExecError::ExecFailed { message, output } => RemoteExecError::ExecFailed {
                message: format!("{} on {}", message, address),
                output,
            },
        })
    }
}

/// Remote side of [`SshShell::write_file`]; the content arrives on stdin.
fn write_command(path: &str, mode: u32) -> String {
    let write = HostCommand::WriteStdin {
        path: path.to_string(),
    };
    let chmod = HostCommand::Chmod {
        path: path.to_string(),
        mode,
    };
    format!("{} && {}", write, chmod)
}

/// Private keys named `id_*` in `dir`, sorted.
pub fn discover_identities(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot read ssh identity directory");
            return Vec::new();
        }
    };

    let mut keys: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("id_") && !n.ends_with(".pub"))
                .unwrap_or(false)
        })
        .collect();
    keys.sort();
    keys
}
