// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! In-process fake of a fleet of managed hosts.
//!
//! Interprets [`HostCommand`]s against simulated per-host state (files,
//! directories, mounts, OS and share accounts, services) and records every
//! command it receives. Failures can be injected by substring match on the
//! rendered command. Used by the unit and integration tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use crate::domain::host::{is_local_address, LOCAL_HOST};
use crate::domain::host_command::{HostCommand, FILE_EXISTS, PROCESS_NOT_FOUND, RELOAD_SUCCESS};
use crate::domain::remote::{RemoteExecError, RemoteExecutor};

#[derive(Debug, Clone, Default)]
pub struct FakeHostState {
    pub files: BTreeMap<String, String>,
    pub dirs: BTreeSet<String>,
    /// device -> mount path
    pub mounts: BTreeMap<String, String>,
    /// username -> uid
    pub os_users: BTreeMap<String, u32>,
    /// username -> password
    pub share_accounts: BTreeMap<String, String>,
    pub active_services: BTreeSet<String>,
    pub enabled_services: BTreeSet<String>,
    pub export_daemon_running: bool,
    pub share_reloads: usize,
    pub export_reloads: usize,
    /// Output of the export config checker; `None` accepts any file.
    pub export_config_error: Option<String>,
}

impl FakeHostState {
    /// Host with the export daemon up and its unit active and enabled.
    pub fn with_export_service(unit: &str) -> Self {
        let mut state = Self::default();
        state.export_daemon_running = true;
        state.active_services.insert(unit.to_string());
        state.enabled_services.insert(unit.to_string());
        state
    }

    /// Adds an OS account with `uid` for both its uid and gid.
    pub fn with_account(mut self, username: &str, uid: u32) -> Self {
        self.os_users.insert(username.to_string(), uid);
        self
    }

    fn next_uid(&self) -> u32 {
        self.os_users.values().copied().max().unwrap_or(1000) + 1
    }
}

#[derive(Debug, Clone)]
struct FailureRule {
    host: Option<String>,
    pattern: String,
    output: String,
    remaining: Option<usize>,
}

#[derive(Default)]
pub struct FakeHosts {
    hosts: Mutex<HashMap<String, FakeHostState>>,
    log: Mutex<Vec<(String, String)>>,
    failures: Mutex<Vec<FailureRule>>,
    latency: Mutex<Option<Duration>>,
}

fn key(host: &str) -> String {
    if is_local_address(host) {
        LOCAL_HOST.to_string()
    } else {
        host.to_string()
    }
}

fn failed(output: impl Into<String>) -> RemoteExecError {
    RemoteExecError::exec_failed("command exited with status 1", output)
}

impl FakeHosts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the state of `host`.
    pub fn add_host(&self, host: &str, state: FakeHostState) {
        self.hosts.lock().insert(key(host), state);
    }

    /// Snapshot of `host`'s state.
    pub fn state(&self, host: &str) -> FakeHostState {
        self.hosts.lock().get(&key(host)).cloned().unwrap_or_default()
    }

    pub fn update<F: FnOnce(&mut FakeHostState)>(&self, host: &str, f: F) {
        let mut hosts = self.hosts.lock();
        f(hosts.entry(key(host)).or_default());
    }

    /// Every command issued to `host`, in order.
    pub fn commands(&self, host: &str) -> Vec<String> {
        let host = key(host);
        self.log
            .lock()
            .iter()
            .filter(|(h, _)| *h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn all_commands(&self) -> Vec<(String, String)> {
        self.log.lock().clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Commands on `host` containing `needle`.
    pub fn count_matching(&self, host: &str, needle: &str) -> usize {
        self.commands(host).iter().filter(|c| c.contains(needle)).count()
    }

    /// Fail every command on `host` (or any host) that contains `pattern`.
    pub fn fail_when(&self, host: Option<&str>, pattern: &str, output: &str) {
        self.failures.lock().push(FailureRule {
            host: host.map(key),
            pattern: pattern.to_string(),
            output: output.to_string(),
            remaining: None,
        });
    }

    /// Fail only the next matching command.
    pub fn fail_once(&self, host: Option<&str>, pattern: &str, output: &str) {
        self.failures.lock().push(FailureRule {
            host: host.map(key),
            pattern: pattern.to_string(),
            output: output.to_string(),
            remaining: Some(1),
        });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Delay applied before every command.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    async fn enter(&self, host: &str, rendered: String) -> Result<(), RemoteExecError> {
        let latency = *self.latency.lock();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        self.log.lock().push((host.to_string(), rendered.clone()));

        let mut failures = self.failures.lock();
        let hit = failures.iter_mut().position(|rule| {
            rule.host.as_deref().map_or(true, |h| h == host)
                && rendered.contains(&rule.pattern)
                && rule.remaining != Some(0)
        });
        if let Some(index) = hit {
            let rule = &mut failures[index];
            if let Some(left) = rule.remaining.as_mut() {
                *left -= 1;
            }
            return Err(failed(rule.output.clone()));
        }
        Ok(())
    }

    fn apply(&self, host: &str, cmd: &HostCommand) -> Result<String, RemoteExecError> {
        use HostCommand::*;
        let mut hosts = self.hosts.lock();
        let state = hosts.entry(host.to_string()).or_default();

        match cmd {
            ListMounts => Ok(state
                .mounts
                .iter()
                .map(|(dev, path)| format!("{} on {} type ext4 (rw,relatime)\n", dev, path))
                .collect()),
            Mount { device, path } => {
                if !state.dirs.contains(path) {
                    return Err(failed(format!("mount: {}: mount point does not exist.", path)));
                }
                state.mounts.insert(device.clone(), path.clone());
                Ok(String::new())
            }
            ForceUmount { path } => {
                let device = state
                    .mounts
                    .iter()
                    .find(|(_, p)| *p == path)
                    .map(|(d, _)| d.clone());
                match device {
                    Some(device) => {
                        state.mounts.remove(&device);
                        Ok(String::new())
                    }
                    None => Err(failed(format!("umount: {}: not mounted.", path))),
                }
            }
            MakeDir { path } => {
                state.dirs.insert(path.clone());
                Ok(String::new())
            }
            CountEntries { path } => {
                if !state.dirs.contains(path) {
                    return Err(failed(format!("ls: cannot access '{}': No such file or directory", path)));
                }
                let prefix = format!("{}/", path.trim_end_matches('/'));
                let count = state.files.keys().filter(|f| f.starts_with(&prefix)).count()
                    + state.dirs.iter().filter(|d| d.starts_with(&prefix)).count();
                Ok(format!("{}\n", count))
            }
            RemoveDir { path } => {
                if state.dirs.remove(path) {
                    Ok(String::new())
                } else {
                    Err(failed(format!("rmdir: failed to remove '{}': No such file or directory", path)))
                }
            }

            LookupOsUser { username } => match state.os_users.get(username) {
                Some(uid) => Ok(format!("uid={uid}({username}) gid={uid}({username}) groups={uid}({username})\n")),
                None => Err(failed(format!("id: '{}': no such user", username))),
            },
            EnsureOsUser { username } => {
                if !state.os_users.contains_key(username) {
                    let uid = state.next_uid();
                    state.os_users.insert(username.clone(), uid);
                }
                Ok(String::new())
            }
            CountOsUser { username } => {
                Ok(format!("{}\n", u8::from(state.os_users.contains_key(username))))
            }
            DeleteOsUser { username } => {
                if state.os_users.remove(username).is_some() {
                    Ok(String::new())
                } else {
                    Err(failed(format!("userdel: user '{}' does not exist", username)))
                }
            }
            UserUid { username } | UserGid { username } => match state.os_users.get(username) {
                Some(uid) => Ok(format!("{}\n", uid)),
                None => Err(failed(format!("id: '{}': no such user", username))),
            },

            LookupShareAccount { username } => {
                if state.share_accounts.contains_key(username) {
                    Ok(format!("{}:{}:\n", username, state.os_users.get(username).copied().unwrap_or(0)))
                } else {
                    Err(failed("Username not found!"))
                }
            }
            CountShareAccount { username } => {
                Ok(format!("{}\n", u8::from(state.share_accounts.contains_key(username))))
            }
            SetSharePassword { username, password } => {
                if !state.os_users.contains_key(username) {
                    return Err(failed(format!("Failed to add entry for user {}.", username)));
                }
                state.share_accounts.insert(username.clone(), password.clone());
                Ok(format!("Added user {}.\n", username))
            }
            DeleteShareAccount { username } => {
                if state.share_accounts.remove(username).is_some() {
                    Ok(String::new())
                } else {
                    Err(failed(format!("Failed to find entry for user {}.", username)))
                }
            }
            ReloadShareService => {
                state.share_reloads += 1;
                Ok(String::new())
            }

            FileExists { path } => Ok(if state.files.contains_key(path) {
                format!("{}\n", FILE_EXISTS)
            } else {
                "not_found\n".to_string()
            }),
            ReadFile { path } => state
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| failed(format!("cat: {}: No such file or directory", path))),
            // run() has no stdin, so the file ends up empty
            WriteStdin { path } => {
                state.files.insert(path.clone(), String::new());
                Ok(String::new())
            }
            Chmod { path, .. } => {
                if state.files.contains_key(path) {
                    Ok(String::new())
                } else {
                    Err(failed(format!("chmod: cannot access '{}': No such file or directory", path)))
                }
            }
            CopyFile { from, to } => match state.files.get(from).cloned() {
                Some(content) => {
                    state.files.insert(to.clone(), content);
                    Ok(String::new())
                }
                None => Err(failed(format!("cp: cannot stat '{}': No such file or directory", from))),
            },
            MoveFile { from, to } => match state.files.remove(from) {
                Some(content) => {
                    state.files.insert(to.clone(), content);
                    Ok(String::new())
                }
                None => Err(failed(format!("mv: cannot stat '{}': No such file or directory", from))),
            },
            RemoveFile { path } => {
                state.files.remove(path);
                Ok(String::new())
            }
            LatestBackup { path } => {
                let prefix = format!("{}.backup.", path);
                let latest = state
                    .files
                    .keys()
                    .filter_map(|f| {
                        f.strip_prefix(&prefix)
                            .and_then(|ts| ts.parse::<i64>().ok())
                            .map(|ts| (ts, f.clone()))
                    })
                    .max();
                Ok(latest.map(|(_, f)| format!("{}\n", f)).unwrap_or_default())
            }

            ReloadExportService => {
                if state.export_daemon_running {
                    state.export_reloads += 1;
                    Ok(format!("{}\n", RELOAD_SUCCESS))
                } else {
                    Ok(format!("{}\n", PROCESS_NOT_FOUND))
                }
            }
            ValidateExportConfig { path } => {
                if !state.files.contains_key(path) {
                    return Err(failed(format!("Error: config file {} not found", path)));
                }
                match &state.export_config_error {
                    Some(error) => Err(failed(error.clone())),
                    None => Ok(String::new()),
                }
            }
            ServiceActive { unit } => Ok(if state.active_services.contains(unit) {
                "active\n".to_string()
            } else {
                "inactive\n".to_string()
            }),
            ServiceEnabled { unit } => Ok(if state.enabled_services.contains(unit) {
                "enabled\n".to_string()
            } else {
                "disabled\n".to_string()
            }),
            StartService { unit } => {
                state.active_services.insert(unit.clone());
                state.export_daemon_running = true;
                Ok(String::new())
            }
            EnableService { unit } => {
                state.enabled_services.insert(unit.clone());
                Ok(String::new())
            }

            Hostname => Ok(format!("fake-{}\n", host.replace('.', "-"))),
            OsRelease => Ok("NAME=\"Debian GNU/Linux\"\nVERSION_ID=\"12\"\nID=debian\n".to_string()),
            Arch => Ok("x86_64\n".to_string()),
            KernelRelease => Ok("6.1.0-18-amd64\n".to_string()),
        }
    }
}

#[async_trait]
impl RemoteExecutor for FakeHosts {
    async fn command(&self, host: &str, cmd: &str) -> Result<String, RemoteExecError> {
        self.enter(&key(host), cmd.to_string()).await?;
        Ok(String::new())
    }

    async fn write_file(
        &self,
        host: &str,
        path: &str,
        content: &[u8],
        _mode: u32,
    ) -> Result<(), RemoteExecError> {
        let host = key(host);
        self.enter(&host, format!("write_file {}", path)).await?;
        let content = String::from_utf8_lossy(content).into_owned();
        self.hosts
            .lock()
            .entry(host)
            .or_default()
            .files
            .insert(path.to_string(), content);
        Ok(())
    }

    async fn run(&self, host: &str, cmd: &HostCommand) -> Result<String, RemoteExecError> {
        let host = key(host);
        self.enter(&host, cmd.to_string()).await?;
        self.apply(&host, cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mount_and_umount_dir() {
        let fake = FakeHosts::new();
        fake.run("10.0.0.1", &HostCommand::MakeDir { path: "/mnt/a".into() })
            .await
            .unwrap();
        fake.run(
            "10.0.0.1",
            &HostCommand::Mount { device: "/dev/sdb1".into(), path: "/mnt/a".into() },
        )
        .await
        .unwrap();
        let out = fake.run("10.0.0.1", &HostCommand::ListMounts).await.unwrap();
        assert_eq!(out, "/dev/sdb1 on /mnt/a type ext4 (rw,relatime)\n");

        fake.umount_dir("10.0.0.1", "/mnt/a").await.unwrap();
        let state = fake.state("10.0.0.1");
        assert!(state.mounts.is_empty());
        assert!(!state.dirs.contains("/mnt/a"));
        assert_eq!(fake.count_matching("10.0.0.1", "rmdir"), 1);
    }

    #[tokio::test]
    async fn test_umount_failure_skips_rmdir() {
        let fake = FakeHosts::new();
        let err = fake.umount_dir("10.0.0.1", "/mnt/none").await.unwrap_err();
        assert!(err.output().contains("not mounted"));
        assert_eq!(fake.count_matching("10.0.0.1", "rmdir"), 0);
    }

    #[tokio::test]
    async fn test_local_aliases_share_state() {
        let fake = FakeHosts::new();
        fake.write_file("localhost", "/etc/x", b"hello", 0o644).await.unwrap();
        assert_eq!(fake.state("").files.get("/etc/x").map(String::as_str), Some("hello"));
        assert_eq!(fake.commands("127.0.0.1"), vec!["write_file /etc/x".to_string()]);
    }

    #[tokio::test]
    async fn test_fail_once() {
        let fake = FakeHosts::new();
        fake.fail_once(None, "smbcontrol", "smbd not running");
        let err = fake.run("h", &HostCommand::ReloadShareService).await.unwrap_err();
        assert_eq!(err.output(), "smbd not running");
        assert!(fake.run("h", &HostCommand::ReloadShareService).await.is_ok());
        assert_eq!(fake.state("h").share_reloads, 1);
    }

    #[tokio::test]
    async fn test_os_user_lookup_reports_no_such_user() {
        let fake = FakeHosts::new();
        let err = fake
            .run("h", &HostCommand::LookupOsUser { username: "alice".into() })
            .await
            .unwrap_err();
        assert!(err.mentions("no such user"));
    }
}
