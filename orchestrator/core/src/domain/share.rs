// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Share
//!
//! Share-service definition: a host path exposed under a pseudo path with a
//! per-user permission list. `init` and `updating` mean the share must be
//! (re)pushed to the service config; `deleting` means it must be dropped from
//! the config and then from the store.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Share aggregate, permission list and status machine

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::host::HostId;
use crate::domain::lifecycle::Lifecycle;

/// Reserved username meaning anonymous access.
pub const EVERYONE: &str = "everyone";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareId(pub i64);

impl std::fmt::Display for ShareId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "rw")]
    ReadWrite,
}

impl Permission {
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    pub username: String,
    pub permission: Permission,
}

impl UserPermission {
    pub fn new(username: impl Into<String>, permission: Permission) -> Self {
        Self {
            username: username.into(),
            permission,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    Init,
    Active,
    Updating,
    Deleting,
}

impl ShareStatus {
    /// Share must be written (again) to the service config.
    pub fn needs_push(&self) -> bool {
        matches!(self, Self::Init | Self::Updating)
    }
}

impl Lifecycle for ShareStatus {
    const ENTITY: &'static str = "share";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Active => "active",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
        }
    }

    fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Active)
                | (Self::Updating, Self::Active)
                | (Self::Active, Self::Updating)
                | (_, Self::Deleting)
        )
    }
}

impl FromStr for ShareStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "active" => Ok(Self::Active),
            "updating" => Ok(Self::Updating),
            "deleting" => Ok(Self::Deleting),
            other => Err(format!("unknown share status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub id: ShareId,
    pub host_id: HostId,
    /// Unique display name.
    pub name: String,
    /// Host directory, relative to the mount root or absolute.
    pub path: String,
    /// Share identifier exposed to clients; unique per host.
    pub pseudo: String,
    /// Ordered as declared.
    pub permissions: Vec<UserPermission>,
    pub status: ShareStatus,
}

impl Share {
    pub fn new(
        host_id: HostId,
        name: impl Into<String>,
        path: impl Into<String>,
        pseudo: impl Into<String>,
        permissions: Vec<UserPermission>,
    ) -> Self {
        Self {
            id: ShareId(0),
            host_id,
            name: name.into(),
            path: path.into(),
            pseudo: pseudo.into(),
            permissions,
            status: ShareStatus::Init,
        }
    }

    /// True when the permission list is exactly one `everyone` entry.
    pub fn is_public(&self) -> bool {
        matches!(self.permissions.as_slice(), [only] if only.username == EVERYONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_serialization() {
        let perms = vec![
            UserPermission::new("alice", Permission::ReadWrite),
            UserPermission::new("bob", Permission::Read),
        ];
        let json = serde_json::to_string(&perms).unwrap();
        assert_eq!(
            json,
            r#"[{"username":"alice","permission":"rw"},{"username":"bob","permission":"r"}]"#
        );
    }

    #[test]
    fn test_public_detection() {
        let public = Share::new(
            HostId::local(),
            "pub",
            "/mnt/pub",
            "/pub",
            vec![UserPermission::new(EVERYONE, Permission::Read)],
        );
        assert!(public.is_public());

        let mixed = Share::new(
            HostId::local(),
            "mixed",
            "/mnt/mixed",
            "/mixed",
            vec![
                UserPermission::new(EVERYONE, Permission::Read),
                UserPermission::new("alice", Permission::ReadWrite),
            ],
        );
        assert!(!mixed.is_public());
    }

    #[test]
    fn test_share_transitions() {
        use ShareStatus::*;
        assert!(Init.transition(Active).is_ok());
        assert!(Updating.transition(Active).is_ok());
        assert!(Active.transition(Updating).is_ok());
        assert!(Active.transition(Deleting).is_ok());
        assert!(Deleting.transition(Active).is_err());
        assert!(Init.needs_push() && Updating.needs_push());
        assert!(!Active.needs_push() && !Deleting.needs_push());
    }
}
