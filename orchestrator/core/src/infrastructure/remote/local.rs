// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Local shell runner used when the target host is the controller itself.

use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use tracing::debug;

use super::{collect_output, run_process, wrap_command};
use crate::domain::remote::RemoteExecError;

#[derive(Debug, Clone, Default)]
pub struct LocalShell {
    timeout: Option<Duration>,
}

impl LocalShell {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn command(&self, cmd: &str) -> Result<String, RemoteExecError> {
        debug!(command = cmd, "Running local command");
        let mut process = tokio::process::Command::new("sh");
        process
            .arg("-c")
            .arg(wrap_command(cmd))
            .env("LANG", "en_US.UTF-8");

        let output = run_process(process, None, self.timeout, "local command").await?;
        collect_output(output)
    }

    pub async fn write_file(&self, path: &str, content: &[u8], mode: u32) -> Result<(), RemoteExecError> {
        tokio::fs::write(path, content).await.map_err(|e| {
            RemoteExecError::exec_failed(format!("failed to write {}: {}", path, e), String::new())
        })?;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| {
                RemoteExecError::exec_failed(
                    format!("failed to set mode {:o} on {}: {}", mode, path, e),
                    String::new(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::host_command::HostCommand;

    #[tokio::test]
    async fn test_merges_stderr() {
        let shell = LocalShell::default();
        let out = shell.command("echo out; echo err >&2").await.unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_exec_failed() {
        let shell = LocalShell::default();
        let err = shell.command("echo 'no such user' >&2; exit 3").await.unwrap_err();
        assert!(err.output().contains("no such user"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let shell = LocalShell::new(Some(Duration::from_millis(100)));
        let err = shell.command("sleep 5").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_os_user_count_matches_exact_name() {
        let shell = LocalShell::default();
        let count = |name: &str| HostCommand::CountOsUser { username: name.into() }.to_string();
        assert_eq!(shell.command(&count("root")).await.unwrap().trim(), "1");
        assert_eq!(shell.command(&count("r..t")).await.unwrap().trim(), "0");
        assert_eq!(shell.command(&count("roo")).await.unwrap().trim(), "0");
    }

    #[tokio::test]
    async fn test_write_file_sets_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smb.conf");
        let path = path.to_str().unwrap();
        let shell = LocalShell::default();
        shell.write_file(path, b"[global]\n", 0o640).await.unwrap();

        let meta = std::fs::metadata(path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "[global]\n");
    }
}
