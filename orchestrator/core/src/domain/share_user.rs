// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Share User
//!
//! Share-level user account. Records are created in `init` by the management
//! API; every later transition is made by the account reconciler. A record is
//! removed from the store only after the remote accounts are gone, so no
//! terminal "deleted" status exists.
//!
//! ```text
//! init ──────────► active ◄────────── changing_pwd
//!                    │                     ▲
//!                    └─────────────────────┘
//!        (any) ──────► deleting ──► (row removed)
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Share account aggregate and status machine

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::host::HostId;
use crate::domain::lifecycle::Lifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareUserId(pub i64);

impl std::fmt::Display for ShareUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareUserStatus {
    #[serde(rename = "init")]
    Init,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "changing_pwd")]
    ChangingPassword,
    #[serde(rename = "deleting")]
    Deleting,
}

impl Lifecycle for ShareUserStatus {
    const ENTITY: &'static str = "share user";

    fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Active => "active",
            Self::ChangingPassword => "changing_pwd",
            Self::Deleting => "deleting",
        }
    }

    fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Active)
                | (Self::ChangingPassword, Self::Active)
                | (Self::Active, Self::ChangingPassword)
                | (_, Self::Deleting)
        )
    }
}

impl FromStr for ShareUserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "active" => Ok(Self::Active),
            "changing_pwd" => Ok(Self::ChangingPassword),
            "deleting" => Ok(Self::Deleting),
            other => Err(format!("unknown share user status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareUser {
    pub id: ShareUserId,
    pub host_id: HostId,
    pub username: String,
    /// Plaintext; pushed verbatim to the share service.
    pub password: String,
    pub status: ShareUserStatus,
}

impl ShareUser {
    pub fn new(host_id: HostId, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: ShareUserId(0),
            host_id,
            username: username.into(),
            password: password.into(),
            status: ShareUserStatus::Init,
        }
    }
}
