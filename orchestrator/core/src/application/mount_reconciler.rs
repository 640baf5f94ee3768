// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Mount Reconciler
//!
//! Converges declared device -> path bindings against the live mount table of
//! each host. There is no status field: a spec with a path means "mounted
//! there", a spec with an empty path (or the bare mount root) is ignored.
//!
//! Specs are applied in declaration order per host. A failing spec is logged
//! and skipped; it never blocks the remaining specs or other hosts.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Mount point convergence

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::errors::SyncError;
use crate::application::reconciler::{HostSync, Reconciler, SyncOutcome};
use crate::domain::host::HostId;
use crate::domain::host_command::HostCommand;
use crate::domain::mount_point::{MountPointSpec, MountTable};
use crate::domain::remote::RemoteExecutor;
use crate::domain::repository::{HostRepository, MountPointRepository};

pub struct MountReconciler {
    hosts: Arc<dyn HostRepository>,
    mount_points: Arc<dyn MountPointRepository>,
    executor: Arc<dyn RemoteExecutor>,
    mount_root: String,
}

impl MountReconciler {
    pub fn new(
        hosts: Arc<dyn HostRepository>,
        mount_points: Arc<dyn MountPointRepository>,
        executor: Arc<dyn RemoteExecutor>,
        mount_root: impl Into<String>,
    ) -> Self {
        Self {
            hosts,
            mount_points,
            executor,
            mount_root: mount_root.into(),
        }
    }

    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let specs = self.mount_points.list_all().await?;

        for (host_id, specs) in group_by_host(specs) {
            let Some(host) = self.hosts.find_by_id(&host_id).await? else {
                warn!(host = %host_id, "Mount points reference an unknown host, skipping");
                continue;
            };

            if let Err(e) = self.sync_host(&host.address, &specs).await {
                error!(host = %host.address, error = %e, output = e.output(), "Mount sync failed");
            }
        }
        Ok(SyncOutcome::Completed)
    }

    /// Converge one host. Only a failure to read the live mount table is
    /// returned; per-spec failures are logged.
    pub async fn sync_host(
        &self,
        address: &str,
        specs: &[MountPointSpec],
    ) -> Result<HostSync, SyncError> {
        let actionable: Vec<&MountPointSpec> = specs
            .iter()
            .filter(|spec| spec.is_actionable(&self.mount_root))
            .collect();
        if actionable.is_empty() {
            return Ok(HostSync::Unchanged);
        }

        let output = self
            .executor
            .run(address, &HostCommand::ListMounts)
            .await
            .map_err(|e| SyncError::remote(address, e))?;
        let table = MountTable::parse(&output);

        let mut changed = false;
        for spec in actionable {
            match self.apply_spec(address, &table, spec).await {
                Ok(true) => changed = true,
                Ok(false) => {}
                Err(e) => {
                    error!(
                        host = address,
                        record = %spec.uuid,
                        device = %spec.device,
                        path = spec.target(),
                        error = %e,
                        output = e.output(),
                        "Failed to converge mount point"
                    );
                }
            }
        }

        Ok(if changed { HostSync::Applied } else { HostSync::Unchanged })
    }

    async fn apply_spec(
        &self,
        address: &str,
        table: &MountTable,
        spec: &MountPointSpec,
    ) -> Result<bool, SyncError> {
        let target = spec.target();
        match table.mounted_path(&spec.device) {
            Some(current) if current == target => {
                debug!(host = address, device = %spec.device, path = target, "Already mounted");
                return Ok(false);
            }
            Some(current) => {
                info!(host = address, device = %spec.device, from = current, to = target, "Moving mount point");
                self.executor
                    .umount_dir(address, current)
                    .await
                    .map_err(|e| SyncError::remote(address, e))?;
            }
            None => {}
        }

        self.executor
            .run(address, &HostCommand::MakeDir { path: target.to_string() })
            .await
            .map_err(|e| SyncError::remote(address, e))?;
        self.executor
            .run(
                address,
                &HostCommand::Mount {
                    device: spec.device.clone(),
                    path: target.to_string(),
                },
            )
            .await
            .map_err(|e| SyncError::remote(address, e))?;

        info!(host = address, device = %spec.device, path = target, "Mounted");
        Ok(true)
    }
}

/// Groups specs by host, keeping both host order and spec order as declared.
fn group_by_host(specs: Vec<MountPointSpec>) -> Vec<(HostId, Vec<MountPointSpec>)> {
    let mut groups: Vec<(HostId, Vec<MountPointSpec>)> = Vec::new();
    for spec in specs {
        match groups.iter_mut().find(|(host, _)| *host == spec.host_id) {
            Some((_, group)) => group.push(spec),
            None => groups.push((spec.host_id.clone(), vec![spec])),
        }
    }
    groups
}

#[async_trait]
impl Reconciler for MountReconciler {
    fn name(&self) -> &'static str {
        "mount_points"
    }

    async fn reconcile(&self) -> Result<SyncOutcome, SyncError> {
        self.sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::host::ManagedHost;
    use crate::infrastructure::remote::{FakeHostState, FakeHosts};
    use crate::infrastructure::repositories::{InMemoryHostRepository, InMemoryMountPointRepository};

    async fn setup() -> (Arc<FakeHosts>, Arc<InMemoryMountPointRepository>, MountReconciler) {
        let hosts = Arc::new(InMemoryHostRepository::new());
        hosts.create(&ManagedHost::new("10.0.0.2")).await.unwrap();
        let fake = Arc::new(FakeHosts::new());
        fake.add_host("10.0.0.2", FakeHostState::default());
        let mounts = Arc::new(InMemoryMountPointRepository::new());
        let reconciler = MountReconciler::new(hosts, mounts.clone(), fake.clone(), "/mnt");
        (fake, mounts, reconciler)
    }

    #[test]
    fn test_group_by_host_keeps_order() {
        let a = HostId::new("10.0.0.2");
        let b = HostId::new("10.0.0.3");
        let groups = group_by_host(vec![
            MountPointSpec::new("1", a.clone(), "/dev/sdb1", "/mnt/1"),
            MountPointSpec::new("2", b.clone(), "/dev/sdb1", "/mnt/2"),
            MountPointSpec::new("3", a.clone(), "/dev/sdc1", "/mnt/3"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, a);
        let uuids: Vec<_> = groups[0].1.iter().map(|s| s.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_moves_device_mounted_elsewhere() {
        let (fake, mounts, reconciler) = setup().await;
        fake.update("10.0.0.2", |s| {
            s.dirs.insert("/mnt/old".to_string());
            s.mounts.insert("/dev/sdb1".to_string(), "/mnt/old".to_string());
        });
        mounts
            .save(&MountPointSpec::new("u1", HostId::new("10.0.0.2"), "/dev/sdb1", "/mnt/new"))
            .await
            .unwrap();

        reconciler.sync().await.unwrap();

        let state = fake.state("10.0.0.2");
        assert_eq!(state.mounts.get("/dev/sdb1").map(String::as_str), Some("/mnt/new"));
        assert!(!state.dirs.contains("/mnt/old"));
        assert_eq!(fake.count_matching("10.0.0.2", "umount -f '/mnt/old'"), 1);
    }

    #[tokio::test]
    async fn test_padded_path_is_trimmed_before_use() {
        let (fake, mounts, reconciler) = setup().await;
        fake.update("10.0.0.2", |s| {
            s.mounts.insert("/dev/sdb1".to_string(), "/mnt/data".to_string());
        });
        let host = HostId::new("10.0.0.2");
        mounts.save(&MountPointSpec::new("u1", host.clone(), "/dev/sdb1", " /mnt/data ")).await.unwrap();
        mounts.save(&MountPointSpec::new("u2", host.clone(), "/dev/sdc1", "/mnt/media\n")).await.unwrap();

        reconciler.sync().await.unwrap();

        let state = fake.state("10.0.0.2");
        assert_eq!(fake.count_matching("10.0.0.2", "umount"), 0);
        assert_eq!(state.mounts.get("/dev/sdb1").map(String::as_str), Some("/mnt/data"));
        assert_eq!(state.mounts.get("/dev/sdc1").map(String::as_str), Some("/mnt/media"));
        assert_eq!(fake.count_matching("10.0.0.2", "mkdir -p '/mnt/media'"), 1);
    }

    #[tokio::test]
    async fn test_failed_unmount_skips_only_that_spec() {
        let (fake, mounts, reconciler) = setup().await;
        fake.update("10.0.0.2", |s| {
            s.mounts.insert("/dev/sdb1".to_string(), "/mnt/busy".to_string());
        });
        fake.fail_when(None, "umount -f '/mnt/busy'", "umount: /mnt/busy: target is busy.");
        let host = HostId::new("10.0.0.2");
        mounts.save(&MountPointSpec::new("u1", host.clone(), "/dev/sdb1", "/mnt/a")).await.unwrap();
        mounts.save(&MountPointSpec::new("u2", host.clone(), "/dev/sdc1", "/mnt/b")).await.unwrap();

        assert_eq!(reconciler.sync().await.unwrap(), SyncOutcome::Completed);

        let state = fake.state("10.0.0.2");
        assert_eq!(state.mounts.get("/dev/sdb1").map(String::as_str), Some("/mnt/busy"));
        assert_eq!(state.mounts.get("/dev/sdc1").map(String::as_str), Some("/mnt/b"));
        assert_eq!(fake.count_matching("10.0.0.2", "mkdir -p '/mnt/a'"), 0);
    }

    #[tokio::test]
    async fn test_non_actionable_specs_issue_no_commands() {
        let (fake, mounts, reconciler) = setup().await;
        let host = HostId::new("10.0.0.2");
        mounts.save(&MountPointSpec::new("u1", host.clone(), "/dev/sdb1", "")).await.unwrap();
        mounts.save(&MountPointSpec::new("u2", host.clone(), "/dev/sdc1", "/mnt")).await.unwrap();

        reconciler.sync().await.unwrap();
        assert!(fake.commands("10.0.0.2").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_host_is_skipped() {
        let (fake, mounts, reconciler) = setup().await;
        mounts
            .save(&MountPointSpec::new("u1", HostId::new("10.9.9.9"), "/dev/sdb1", "/mnt/x"))
            .await
            .unwrap();

        assert_eq!(reconciler.sync().await.unwrap(), SyncOutcome::Completed);
        assert!(fake.all_commands().is_empty());
    }
}
