// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Mount Point
//!
//! Desired device-to-path bindings and the parsed live mount table of a host.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Desired mount state and live mount table parsing

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::host::HostId;

/// Desired binding of a block device to a directory on one host.
///
/// An empty `path` means the device should not be mounted anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPointSpec {
    /// Filesystem UUID.
    pub uuid: String,
    pub host_id: HostId,
    /// Target device path, e.g. `/dev/sdb1`.
    pub device: String,
    /// Desired mount path.
    pub path: String,
}

impl MountPointSpec {
    pub fn new(
        uuid: impl Into<String>,
        host_id: HostId,
        device: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            host_id,
            device: device.into(),
            path: path.into(),
        }
    }

    /// Desired mount path without surrounding whitespace.
    pub fn target(&self) -> &str {
        self.path.trim()
    }

    /// A spec is actionable when it names a path other than the mount root.
    pub fn is_actionable(&self, mount_root: &str) -> bool {
        let path = self.target();
        !path.is_empty() && path != mount_root.trim()
    }
}

/// One line of `mount -l`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedPoint {
    pub device: String,
    pub path: String,
    pub fs_type: String,
    pub options: Vec<String>,
}

/// Live mount table of a host keyed by device.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    by_device: HashMap<String, MountedPoint>,
}

impl MountTable {
    /// Parses `mount -l` output. Lines look like
    /// `/dev/sdb1 on /mnt/data type ext4 (rw,relatime) [label]`.
    /// A device listed twice keeps its last entry.
    pub fn parse(output: &str) -> Self {
        let mut by_device = HashMap::new();
        for line in output.lines() {
            if let Some(entry) = parse_mount_line(line) {
                by_device.insert(entry.device.clone(), entry);
            }
        }
        Self { by_device }
    }

    pub fn mounted_path(&self, device: &str) -> Option<&str> {
        self.by_device.get(device).map(|m| m.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_device.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_device.is_empty()
    }
}

fn parse_mount_line(line: &str) -> Option<MountedPoint> {
    let (device, rest) = line.trim().split_once(" on ")?;
    let (path, rest) = rest.split_once(" type ")?;
    let mut parts = rest.splitn(2, ' ');
    let fs_type = parts.next()?.to_string();
    let options = parts
        .next()
        .and_then(|s| {
            let start = s.find('(')?;
            let end = s[start..].find(')')? + start;
            Some(
                s[start + 1..end]
                    .split(',')
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            )
        })
        .unwrap_or_default();

    if device.is_empty() || path.is_empty() {
        return None;
    }

    Some(MountedPoint {
        device: device.to_string(),
        path: path.to_string(),
        fs_type,
        options,
    })
}
