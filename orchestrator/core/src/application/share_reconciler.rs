// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Share Reconciler
//!
//! Regenerates the share-service config of every host whose shares need a
//! push (`init`, `updating`) or a removal (`deleting`), writes it, and asks
//! the service to reload. Statuses are committed only after write and reload
//! both succeeded; otherwise the next tick retries from the same state.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Share definition convergence

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::application::errors::SyncError;
use crate::application::reconciler::{HostSync, Reconciler, SyncOutcome};
use crate::application::single_flight::SingleFlight;
use crate::domain::host::{resolve_address, ManagedHost};
use crate::domain::host_command::HostCommand;
use crate::domain::lifecycle::Lifecycle;
use crate::domain::repository::{HostRepository, ShareRepository};
use crate::domain::share::{Share, ShareId, ShareStatus};
use crate::domain::remote::RemoteExecutor;
use crate::infrastructure::service_config::ShareConfigRenderer;

const CONFIG_MODE: u32 = 0o644;

pub struct ShareReconciler {
    hosts: Arc<dyn HostRepository>,
    shares: Arc<dyn ShareRepository>,
    executor: Arc<dyn RemoteExecutor>,
    renderer: ShareConfigRenderer,
    config_path: String,
    guard: SingleFlight,
}

impl ShareReconciler {
    pub fn new(
        hosts: Arc<dyn HostRepository>,
        shares: Arc<dyn ShareRepository>,
        executor: Arc<dyn RemoteExecutor>,
        renderer: ShareConfigRenderer,
        config_path: impl Into<String>,
    ) -> Self {
        Self {
            hosts,
            shares,
            executor,
            renderer,
            config_path: config_path.into(),
            guard: SingleFlight::new(),
        }
    }

    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let Some(_running) = self.guard.try_enter() else {
            debug!("Share sync already running, skipping");
            return Ok(SyncOutcome::Busy);
        };

        let hosts = self.hosts.list_all().await?;
        for host in &hosts {
            match self.sync_host(host).await {
                Ok(_) => {}
                Err(e @ SyncError::Store(_)) => return Err(e),
                Err(e) => {
                    error!(host = %host.address, error = %e, output = e.output(), "Share sync failed");
                }
            }
        }
        Ok(SyncOutcome::Completed)
    }

    pub async fn sync_host(&self, host: &ManagedHost) -> Result<HostSync, SyncError> {
        let address = resolve_address(&host.address);
        let shares = self.shares.find_by_host(&host.id).await?;

        let push: Vec<&Share> = shares.iter().filter(|s| s.status.needs_push()).collect();
        let remove: Vec<ShareId> = shares
            .iter()
            .filter(|s| s.status == ShareStatus::Deleting)
            .map(|s| s.id)
            .collect();
        if push.is_empty() && remove.is_empty() {
            return Ok(HostSync::Unchanged);
        }

        for share in &push {
            share.status.transition(ShareStatus::Active)?;
        }

        let kept: Vec<Share> = shares
            .iter()
            .filter(|s| s.status != ShareStatus::Deleting)
            .cloned()
            .collect();
        let content = self
            .renderer
            .render(&kept)
            .map_err(|e| SyncError::render(address, e))?;

        self.executor
            .write_file(address, &self.config_path, content.as_bytes(), CONFIG_MODE)
            .await
            .map_err(|e| SyncError::remote(address, e))?;
        self.executor
            .run(address, &HostCommand::ReloadShareService)
            .await
            .map_err(|source| SyncError::Reload {
                host: address.to_string(),
                source,
            })?;

        let push_ids: Vec<ShareId> = push.iter().map(|s| s.id).collect();
        let activated = self
            .shares
            .update_status(&push_ids, &[ShareStatus::Init, ShareStatus::Updating], ShareStatus::Active)
            .await?;
        let deleted = self.shares.delete_in_status(&remove, ShareStatus::Deleting).await?;

        info!(
            host = address,
            shares = kept.len(),
            activated,
            deleted,
            "Share config applied"
        );
        Ok(HostSync::Applied)
    }
}

#[async_trait]
impl Reconciler for ShareReconciler {
    fn name(&self) -> &'static str {
        "shares"
    }

    async fn reconcile(&self) -> Result<SyncOutcome, SyncError> {
        self.sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::host::HostId;
    use crate::domain::share::{Permission, UserPermission};
    use crate::infrastructure::remote::{FakeHostState, FakeHosts};
    use crate::infrastructure::repositories::{InMemoryHostRepository, InMemoryShareRepository};

    const HOST: &str = "10.0.0.2";
    const SMB_CONF: &str = "/etc/samba/smb.conf";

    async fn setup() -> (Arc<FakeHosts>, Arc<InMemoryShareRepository>, ShareReconciler) {
        let hosts = Arc::new(InMemoryHostRepository::new());
        hosts.create(&ManagedHost::new(HOST)).await.unwrap();
        let fake = Arc::new(FakeHosts::new());
        fake.add_host(HOST, FakeHostState::default());
        let shares = Arc::new(InMemoryShareRepository::new());
        let reconciler = ShareReconciler::new(
            hosts,
            shares.clone(),
            fake.clone(),
            ShareConfigRenderer::new().unwrap(),
            SMB_CONF,
        );
        (fake, shares, reconciler)
    }

    fn team_share() -> Share {
        Share::new(
            HostId::new(HOST),
            "team",
            "/mnt/team",
            "/team",
            vec![UserPermission::new("alice", Permission::ReadWrite)],
        )
    }

    #[tokio::test]
    async fn test_push_then_noop() {
        let (fake, shares, reconciler) = setup().await;
        let share = shares.create(&team_share()).await.unwrap();

        reconciler.sync().await.unwrap();
        assert_eq!(
            shares.find_by_id(share.id).await.unwrap().unwrap().status,
            ShareStatus::Active
        );
        assert_eq!(fake.state(HOST).share_reloads, 1);
        assert!(fake.state(HOST).files[SMB_CONF].contains("[/team]"));

        fake.clear_log();
        reconciler.sync().await.unwrap();
        assert!(fake.commands(HOST).is_empty());
    }

    #[tokio::test]
    async fn test_reload_failure_leaves_statuses() {
        let (fake, shares, reconciler) = setup().await;
        let share = shares.create(&team_share()).await.unwrap();
        fake.fail_when(Some(HOST), "smbcontrol", "Can't find pid for destination 'smbd'");

        reconciler.sync().await.unwrap();

        assert_eq!(
            shares.find_by_id(share.id).await.unwrap().unwrap().status,
            ShareStatus::Init
        );
    }

    #[tokio::test]
    async fn test_deleting_share_is_dropped_from_config_and_store() {
        let (fake, shares, reconciler) = setup().await;
        let share = shares.create(&team_share()).await.unwrap();
        reconciler.sync().await.unwrap();
        shares
            .update_status(&[share.id], &[ShareStatus::Active], ShareStatus::Deleting)
            .await
            .unwrap();

        reconciler.sync().await.unwrap();

        assert!(shares.find_by_id(share.id).await.unwrap().is_none());
        assert!(!fake.state(HOST).files[SMB_CONF].contains("[/team]"));
        assert_eq!(fake.state(HOST).share_reloads, 2);
    }

    #[tokio::test]
    async fn test_invalid_share_aborts_host_without_write() {
        let (fake, shares, reconciler) = setup().await;
        let mut broken = team_share();
        broken.permissions.clear();
        let broken = shares.create(&broken).await.unwrap();

        reconciler.sync().await.unwrap();

        assert_eq!(fake.count_matching(HOST, "write_file"), 0);
        assert_eq!(
            shares.find_by_id(broken.id).await.unwrap().unwrap().status,
            ShareStatus::Init
        );
    }
}
