// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! File Export
//!
//! NFS-style export definition: a host path published under a pseudo path with
//! per-client-range access rules. The export reconciler only reads enabled
//! records and writes back `last_applied`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Export aggregate, ACL value object and dry-run result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::host::HostId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExportId(pub i64);

impl std::fmt::Display for ExportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Export access mode as written into the service config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    #[serde(rename = "RW")]
    ReadWrite,
    #[serde(rename = "RO")]
    ReadOnly,
    #[serde(rename = "None")]
    NoAccess,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadWrite => "RW",
            Self::ReadOnly => "RO",
            Self::NoAccess => "None",
        }
    }
}

impl Default for AccessType {
    fn default() -> Self {
        Self::NoAccess
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RW" => Ok(Self::ReadWrite),
            "RO" => Ok(Self::ReadOnly),
            "NONE" => Ok(Self::NoAccess),
            other => Err(format!("unknown access type '{}'", other)),
        }
    }
}

/// Client rule embedded in an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfsAcl {
    /// Address, CIDR or `*`.
    pub ip_range: String,
    pub permission: AccessType,
}

impl NfsAcl {
    pub fn new(ip_range: impl Into<String>, permission: AccessType) -> Self {
        Self {
            ip_range: ip_range.into(),
            permission,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Enabled,
    Disabled,
}

impl ExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for ExportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown export status '{}'", other)),
        }
    }
}

/// Outcome of validating a candidate export set with the service's own
/// config checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTestResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub message: String,
}

impl ConfigTestResult {
    pub fn passed() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            message: "Configuration validation passed".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub id: ExportId,
    /// Empty means the controller host.
    pub host_id: HostId,
    pub name: String,
    /// Relative to the mount root.
    pub path: String,
    pub pseudo: String,
    #[serde(default)]
    pub default_access: AccessType,
    #[serde(default)]
    pub acls: Vec<NfsAcl>,
    pub status: ExportStatus,
    #[serde(default)]
    pub last_applied: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_test_result: Option<ConfigTestResult>,
}

impl Export {
    pub fn new(
        host_id: HostId,
        name: impl Into<String>,
        path: impl Into<String>,
        pseudo: impl Into<String>,
        acls: Vec<NfsAcl>,
    ) -> Self {
        Self {
            id: ExportId(0),
            host_id,
            name: name.into(),
            path: path.into(),
            pseudo: pseudo.into(),
            default_access: AccessType::NoAccess,
            acls,
            status: ExportStatus::Enabled,
            last_applied: None,
            last_test_result: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == ExportStatus::Enabled
    }
}
