// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Managed Host
//!
//! A Linux machine whose share/export/mount configuration is converged by the
//! reconcilers. Hosts are created once at first contact and are read-only to
//! every reconciler.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Host identity and locality checks

use serde::{Deserialize, Serialize};

/// Address used for the controller host itself.
pub const LOCAL_HOST: &str = "127.0.0.1";

/// Host identity. In practice this is the host's network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostId(pub String);

impl HostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn local() -> Self {
        Self(LOCAL_HOST.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns true when `address` designates the machine the controller runs on.
pub fn is_local_address(address: &str) -> bool {
    matches!(
        address.trim().to_ascii_lowercase().as_str(),
        "" | "localhost" | "127.0.0.1" | "::1"
    )
}

/// Normalizes an empty host reference to the controller host.
pub fn resolve_address(address: &str) -> &str {
    if address.trim().is_empty() {
        LOCAL_HOST
    } else {
        address
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedHost {
    pub id: HostId,
    pub address: String,
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub arch: String,
    pub kernel: String,
    /// Remote shell port; `None` means the configured default.
    pub ssh_port: Option<u16>,
}

impl ManagedHost {
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            id: HostId(address.clone()),
            address,
            hostname: String::new(),
            os: String::new(),
            os_version: String::new(),
            arch: String::new(),
            kernel: String::new(),
            ssh_port: None,
        }
    }

    pub fn is_local(&self) -> bool {
        is_local_address(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_addresses() {
        assert!(is_local_address(""));
        assert!(is_local_address("localhost"));
        assert!(is_local_address("LOCALHOST"));
        assert!(is_local_address("127.0.0.1"));
        assert!(is_local_address("::1"));
        assert!(!is_local_address("10.0.1.10"));
    }

    #[test]
    fn test_resolve_empty_address() {
        assert_eq!(resolve_address(""), LOCAL_HOST);
        assert_eq!(resolve_address("10.0.0.2"), "10.0.0.2");
    }

    #[test]
    fn test_new_host_uses_address_as_id() {
        let host = ManagedHost::new("10.0.0.7");
        assert_eq!(host.id.as_str(), "10.0.0.7");
        assert!(!host.is_local());
        assert!(ManagedHost::new(LOCAL_HOST).is_local());
    }
}
