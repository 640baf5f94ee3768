// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Remote Execution
//!
//! Contract for running shell commands and writing files on a managed host.
//! Implementations decide between the local shell and a remote shell based on
//! the host address; callers never branch on locality themselves.
//!
//! Failures of any kind (spawn, connect, authenticate, non-zero exit) surface
//! as [`RemoteExecError::ExecFailed`] carrying the merged stdout/stderr text.
//! Callers inspect that text, e.g. for `no such user`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Remote execution interface consumed by every reconciler

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::host_command::HostCommand;

#[derive(Debug, Clone, Error)]
pub enum RemoteExecError {
    #[error("{message}")]
    ExecFailed { message: String, output: String },
}

impl RemoteExecError {
    pub fn exec_failed(message: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ExecFailed {
            message: message.into(),
            output: output.into(),
        }
    }

    /// Merged stdout/stderr captured before the failure.
    pub fn output(&self) -> &str {
        match self {
            Self::ExecFailed { output, .. } => output,
        }
    }

    /// True if either the message or the captured output contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            Self::ExecFailed { message, output } => {
                message.contains(needle) || output.contains(needle)
            }
        }
    }
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `cmd` on `host` and return merged stdout/stderr.
    async fn command(&self, host: &str, cmd: &str) -> Result<String, RemoteExecError>;

    /// Write `content` to `path` on `host` with permission bits `mode`.
    async fn write_file(
        &self,
        host: &str,
        path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), RemoteExecError>;

    /// Release any held resources. Calls after `close` may reconnect.
    async fn close(&self) {}

    async fn run(&self, host: &str, cmd: &HostCommand) -> Result<String, RemoteExecError> {
        self.command(host, &cmd.to_string()).await
    }

    /// Force-unmount `path`; if that succeeded and the directory is now empty,
    /// remove it. Removal problems are logged only.
    async fn umount_dir(&self, host: &str, path: &str) -> Result<(), RemoteExecError> {
        self.run(host, &HostCommand::ForceUmount { path: path.to_string() })
            .await?;

        let count = match self
            .run(host, &HostCommand::CountEntries { path: path.to_string() })
            .await
        {
            Ok(out) => out,
            Err(e) => {
                warn!(host, path, error = %e, "Failed to inspect unmounted directory");
                return Ok(());
            }
        };

        if count.trim() == "0" {
            if let Err(e) = self
                .run(host, &HostCommand::RemoveDir { path: path.to_string() })
                .await
            {
                warn!(host, path, error = %e, output = e.output(), "Failed to remove unmounted directory");
            } else {
                debug!(host, path, "Removed empty mount directory");
            }
        }
        Ok(())
    }
}
