// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Host Commands
//!
//! Every shell action the reconcilers issue against a managed host, one
//! variant per logical operation. Arguments are quoted in [`quote`] and
//! nowhere else, so call sites never build shell strings by hand.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Typed remote command builder with single-point escaping

use std::fmt;

/// Single-quote a shell argument. `'` becomes `'\''`; everything else,
/// backslashes included, is literal inside single quotes.
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Lines whose first `:`-separated field equals `username`, compared as a
/// string rather than a pattern.
fn exact_name_filter(username: &str) -> String {
    format!(r#"NAME={} awk -F: '$1 == ENVIRON["NAME"]'"#, quote(username))
}

/// Marker printed by [`HostCommand::FileExists`].
pub const FILE_EXISTS: &str = "exists";
/// Marker printed by [`HostCommand::ReloadExportService`] on success.
pub const RELOAD_SUCCESS: &str = "reload-success";
/// Marker printed by [`HostCommand::ReloadExportService`] when no daemon runs.
pub const PROCESS_NOT_FOUND: &str = "process-not-found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    // mounts
    ListMounts,
    Mount { device: String, path: String },
    ForceUmount { path: String },
    MakeDir { path: String },
    CountEntries { path: String },
    RemoveDir { path: String },

    // OS accounts
    LookupOsUser { username: String },
    EnsureOsUser { username: String },
    CountOsUser { username: String },
    DeleteOsUser { username: String },
    UserUid { username: String },
    UserGid { username: String },

    // share-service accounts
    LookupShareAccount { username: String },
    CountShareAccount { username: String },
    SetSharePassword { username: String, password: String },
    DeleteShareAccount { username: String },
    ReloadShareService,

    // files
    FileExists { path: String },
    ReadFile { path: String },
    /// Replace `path` with whatever arrives on stdin.
    WriteStdin { path: String },
    Chmod { path: String, mode: u32 },
    CopyFile { from: String, to: String },
    MoveFile { from: String, to: String },
    RemoveFile { path: String },
    LatestBackup { path: String },

    // export service
    ReloadExportService,
    ValidateExportConfig { path: String },
    ServiceActive { unit: String },
    ServiceEnabled { unit: String },
    StartService { unit: String },
    EnableService { unit: String },

    // host facts
    Hostname,
    OsRelease,
    Arch,
    KernelRelease,
}

impl HostCommand {
    /// Backup file name for `path` taken at `unix_secs`.
    pub fn backup_path(path: &str, unix_secs: i64) -> String {
        format!("{}.backup.{}", path, unix_secs)
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use HostCommand::*;
        match self {
            ListMounts => write!(f, "mount -l"),
            Mount { device, path } => write!(f, "mount {} {}", quote(device), quote(path)),
            ForceUmount { path } => write!(f, "umount -f {}", quote(path)),
            MakeDir { path } => write!(f, "mkdir -p {}", quote(path)),
            CountEntries { path } => write!(f, "ls -A {} | wc -l", quote(path)),
            RemoveDir { path } => write!(f, "rmdir {}", quote(path)),

            LookupOsUser { username } => write!(f, "id {}", quote(username)),
            EnsureOsUser { username } => {
                let u = quote(username);
                write!(f, "id {u} || useradd -M -s /sbin/nologin {u}")
            }
            CountOsUser { username } => {
                write!(f, "{} /etc/passwd | wc -l", exact_name_filter(username))
            }
            DeleteOsUser { username } => write!(f, "userdel -r {}", quote(username)),
            UserUid { username } => write!(f, "id -u {}", quote(username)),
            UserGid { username } => write!(f, "id -g {}", quote(username)),

            LookupShareAccount { username } => write!(f, "pdbedit -L {}", quote(username)),
            CountShareAccount { username } => {
                write!(f, "pdbedit --list | {} | wc -l", exact_name_filter(username))
            }
            SetSharePassword { username, password } => {
                let p = quote(password);
                write!(f, "printf '%s\\n%s\\n' {p} {p} | smbpasswd -a -s {}", quote(username))
            }
            DeleteShareAccount { username } => {
                write!(f, "pdbedit --delete --user={}", quote(username))
            }
            ReloadShareService => write!(f, "smbcontrol smbd reload-config"),

            FileExists { path } => {
                write!(f, "test -f {} && echo '{}' || echo 'not_found'", quote(path), FILE_EXISTS)
            }
            ReadFile { path } => write!(f, "cat {}", quote(path)),
            WriteStdin { path } => write!(f, "cat > {}", quote(path)),
            Chmod { path, mode } => write!(f, "chmod {:o} {}", mode, quote(path)),
            CopyFile { from, to } => write!(f, "cp {} {}", quote(from), quote(to)),
            MoveFile { from, to } => write!(f, "mv {} {}", quote(from), quote(to)),
            RemoveFile { path } => write!(f, "rm -f {}", quote(path)),
            LatestBackup { path } => {
                write!(f, "ls -t {}.backup.* 2>/dev/null | head -n1", quote(path))
            }

            ReloadExportService => write!(
                f,
                "pid=$(pgrep ganesha.nfsd) && if [ -n \"$pid\" ]; then kill -HUP $pid; echo '{}'; else echo '{}'; fi",
                RELOAD_SUCCESS, PROCESS_NOT_FOUND
            ),
            ValidateExportConfig { path } => write!(f, "ganesha.nfsd -f {} -t", quote(path)),
            ServiceActive { unit } => write!(f, "systemctl is-active {} || true", quote(unit)),
            ServiceEnabled { unit } => write!(f, "systemctl is-enabled {} || true", quote(unit)),
            StartService { unit } => write!(f, "systemctl start {}", quote(unit)),
            EnableService { unit } => write!(f, "systemctl enable {}", quote(unit)),

            Hostname => write!(f, "hostname"),
            OsRelease => write!(f, "cat /etc/os-release"),
            Arch => write!(f, "uname -m"),
            KernelRelease => write!(f, "uname -r"),
        }
    }
}
