// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end reconciliation behaviour against in-memory stores and fake hosts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nas_core::application::{
    AccountReconciler, ExportReconciler, ExportSettings, HostSync, MountReconciler,
    ShareReconciler, SyncError, SyncOutcome,
};
use nas_core::domain::export::{AccessType, Export, ExportId, NfsAcl};
use nas_core::domain::host::{HostId, ManagedHost};
use nas_core::domain::host_command::HostCommand;
use nas_core::domain::mount_point::MountPointSpec;
use nas_core::domain::repository::{
    ExportRepository, HostRepository, MountPointRepository, RepositoryError, ShareRepository,
    ShareUserRepository,
};
use nas_core::domain::share::{Permission, Share, ShareId, ShareStatus, UserPermission, EVERYONE};
use nas_core::domain::share_user::{ShareUser, ShareUserStatus};
use nas_core::infrastructure::remote::{FakeHostState, FakeHosts};
use nas_core::infrastructure::repositories::{
    InMemoryExportRepository, InMemoryHostRepository, InMemoryMountPointRepository,
    InMemoryShareRepository, InMemoryShareUserRepository,
};
use nas_core::infrastructure::service_config::{checksum, AnonymousIds, ExportConfigRenderer, ShareConfigRenderer};

const NAS: &str = "10.0.0.2";
const GANESHA_CONF: &str = "/etc/ganesha/ganesha.conf";
const ANONYMOUS: &str = "flute";

async fn mount_setup() -> (Arc<FakeHosts>, Arc<InMemoryMountPointRepository>, MountReconciler) {
    let hosts = Arc::new(InMemoryHostRepository::new());
    hosts.create(&ManagedHost::new(NAS)).await.unwrap();
    let fake = Arc::new(FakeHosts::new());
    fake.add_host(NAS, FakeHostState::default());
    let specs = Arc::new(InMemoryMountPointRepository::new());
    let reconciler = MountReconciler::new(hosts, specs.clone(), fake.clone(), "/mnt");
    (fake, specs, reconciler)
}

fn export_setup() -> (Arc<FakeHosts>, Arc<InMemoryExportRepository>, ExportReconciler) {
    let fake = Arc::new(FakeHosts::new());
    fake.add_host(NAS, FakeHostState::with_export_service("nfs-ganesha").with_account(ANONYMOUS, 499));
    let exports = Arc::new(InMemoryExportRepository::new());
    let reconciler = ExportReconciler::new(
        exports.clone(),
        fake.clone(),
        ExportConfigRenderer::new("/mnt").unwrap(),
        ExportSettings::default(),
    );
    (fake, exports, reconciler)
}

fn media_export() -> Export {
    Export::new(
        HostId::new(NAS),
        "media",
        "media",
        "/media",
        vec![
            NfsAcl::new("10.0.0.0/24", AccessType::ReadWrite),
            NfsAcl::new("192.168.1.0/24", AccessType::ReadOnly),
        ],
    )
}

#[tokio::test]
async fn test_mount_convergence_issues_exactly_one_mount() {
    let (fake, specs, reconciler) = mount_setup().await;
    specs
        .save(&MountPointSpec::new("uuid-1", HostId::new(NAS), "/dev/sdb1", "/mnt/data"))
        .await
        .unwrap();

    reconciler.sync().await.unwrap();

    let mounts: Vec<String> = fake
        .commands(NAS)
        .into_iter()
        .filter(|c| c.starts_with("mount '"))
        .collect();
    assert_eq!(mounts, vec!["mount '/dev/sdb1' '/mnt/data'".to_string()]);
    assert_eq!(fake.count_matching(NAS, "mkdir -p '/mnt/data'"), 1);
    assert_eq!(
        fake.state(NAS).mounts.get("/dev/sdb1").map(String::as_str),
        Some("/mnt/data")
    );
}

#[tokio::test]
async fn test_mount_second_pass_is_idempotent() {
    let (fake, specs, reconciler) = mount_setup().await;
    let host = HostId::new(NAS);
    specs.save(&MountPointSpec::new("uuid-1", host.clone(), "/dev/sdb1", "/mnt/data")).await.unwrap();
    specs.save(&MountPointSpec::new("uuid-2", host.clone(), "/dev/sdc1", "/mnt/backup")).await.unwrap();

    reconciler.sync().await.unwrap();
    fake.clear_log();
    reconciler.sync().await.unwrap();

    let commands = fake.commands(NAS);
    assert_eq!(commands, vec![HostCommand::ListMounts.to_string()]);
}

#[tokio::test]
async fn test_mount_failure_on_one_host_does_not_block_another() {
    let hosts = Arc::new(InMemoryHostRepository::new());
    hosts.create(&ManagedHost::new("10.0.0.2")).await.unwrap();
    hosts.create(&ManagedHost::new("10.0.0.3")).await.unwrap();
    let fake = Arc::new(FakeHosts::new());
    fake.fail_when(Some("10.0.0.2"), "mount -l", "ssh: connect to host 10.0.0.2 port 22: No route to host");
    let specs = Arc::new(InMemoryMountPointRepository::new());
    specs
        .save(&MountPointSpec::new("a", HostId::new("10.0.0.2"), "/dev/sdb1", "/mnt/a"))
        .await
        .unwrap();
    specs
        .save(&MountPointSpec::new("b", HostId::new("10.0.0.3"), "/dev/sdb1", "/mnt/b"))
        .await
        .unwrap();
    let reconciler = MountReconciler::new(hosts, specs, fake.clone(), "/mnt");

    assert_eq!(reconciler.sync().await.unwrap(), SyncOutcome::Completed);
    assert_eq!(
        fake.state("10.0.0.3").mounts.get("/dev/sdb1").map(String::as_str),
        Some("/mnt/b")
    );
}

#[tokio::test]
async fn test_export_checksum_skips_unchanged_config() {
    let (fake, exports, reconciler) = export_setup();
    exports.create(&media_export()).await.unwrap();

    let enabled = exports.find_enabled().await.unwrap();
    let first = reconciler.render_config(&enabled, AnonymousIds::default()).unwrap();
    let second = reconciler.render_config(&enabled, AnonymousIds::default()).unwrap();
    assert_eq!(checksum(first.as_bytes()), checksum(second.as_bytes()));

    reconciler.sync().await.unwrap();
    assert_eq!(fake.state(NAS).export_reloads, 1);
    fake.clear_log();

    reconciler.sync().await.unwrap();
    assert_eq!(fake.count_matching(NAS, "write_file"), 0);
    assert_eq!(fake.count_matching(NAS, "pgrep"), 0);
    assert_eq!(fake.state(NAS).export_reloads, 1);

    let result = reconciler.sync_host(NAS, &enabled).await.unwrap();
    assert_eq!(result, HostSync::Unchanged);
}

#[tokio::test]
async fn test_export_reload_failure_restores_latest_backup() {
    let (fake, exports, reconciler) = export_setup();
    let previous = "# previous config\n".to_string();
    fake.update(NAS, |s| {
        s.files.insert(GANESHA_CONF.to_string(), previous.clone());
    });
    fake.fail_once(Some(NAS), "pgrep", "kill: (4242) - No such process");
    let export = exports.create(&media_export()).await.unwrap();
    let enabled = exports.find_enabled().await.unwrap();

    let err = reconciler.sync_host(NAS, &enabled).await.unwrap_err();

    assert!(matches!(err, SyncError::Reload { .. }), "{}", err);
    assert_eq!(fake.state(NAS).files[GANESHA_CONF], previous);
    assert_eq!(fake.count_matching(NAS, "pgrep"), 2);
    assert_eq!(fake.count_matching(NAS, "mv "), 1);
    assert!(exports.find_by_id(export.id).await.unwrap().unwrap().last_applied.is_none());
}

#[tokio::test]
async fn test_export_rollback_failure_reports_both_errors() {
    let (fake, exports, reconciler) = export_setup();
    fake.update(NAS, |s| {
        s.files.insert(GANESHA_CONF.to_string(), "# previous\n".to_string());
        s.export_daemon_running = false;
    });
    exports.create(&media_export()).await.unwrap();
    let enabled = exports.find_enabled().await.unwrap();

    let err = reconciler.sync_host(NAS, &enabled).await.unwrap_err();

    match err {
        SyncError::Rollback { reload, rollback, .. } => {
            assert!(reload.output().contains("process-not-found"));
            assert!(rollback.output().contains("process-not-found"));
        }
        other => panic!("expected rollback failure, got {}", other),
    }
    assert_eq!(fake.state(NAS).files[GANESHA_CONF], "# previous\n");
}

/// Counts every store call so a skipped pass can be shown to touch nothing.
struct CountingExports {
    inner: InMemoryExportRepository,
    calls: AtomicUsize,
}

#[async_trait]
impl ExportRepository for CountingExports {
    async fn find_enabled(&self) -> Result<Vec<Export>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_enabled().await
    }

    async fn find_by_id(&self, id: ExportId) -> Result<Option<Export>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn create(&self, export: &Export) -> Result<Export, RepositoryError> {
        self.inner.create(export).await
    }

    async fn update_last_applied(&self, id: ExportId, at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_last_applied(id, at).await
    }
}

#[tokio::test]
async fn test_concurrent_export_pass_is_skipped() {
    let fake = Arc::new(FakeHosts::new());
    fake.add_host(NAS, FakeHostState::with_export_service("nfs-ganesha").with_account(ANONYMOUS, 499));
    fake.set_latency(Some(Duration::from_millis(20)));
    let store = Arc::new(CountingExports {
        inner: InMemoryExportRepository::new(),
        calls: AtomicUsize::new(0),
    });
    store.create(&media_export()).await.unwrap();
    let reconciler = ExportReconciler::new(
        store.clone(),
        fake.clone(),
        ExportConfigRenderer::new("/mnt").unwrap(),
        ExportSettings::default(),
    );

    let (first, second) = tokio::join!(reconciler.sync(), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let calls_before = store.calls.load(Ordering::SeqCst);
        let outcome = reconciler.sync().await;
        (outcome, calls_before, store.calls.load(Ordering::SeqCst))
    });

    assert_eq!(first.unwrap(), SyncOutcome::Completed);
    let (outcome, calls_before, calls_after) = second;
    assert_eq!(outcome.unwrap(), SyncOutcome::Busy);
    assert_eq!(calls_before, calls_after);
    assert_eq!(fake.state(NAS).export_reloads, 1);
}

/// Share store that counts reads and writes.
struct CountingShares {
    inner: InMemoryShareRepository,
    calls: AtomicUsize,
}

#[async_trait]
impl ShareRepository for CountingShares {
    async fn find_by_host(&self, host: &HostId) -> Result<Vec<Share>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_host(host).await
    }

    async fn find_by_id(&self, id: ShareId) -> Result<Option<Share>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn create(&self, share: &Share) -> Result<Share, RepositoryError> {
        self.inner.create(share).await
    }

    async fn update_status(
        &self,
        ids: &[ShareId],
        from: &[ShareStatus],
        to: ShareStatus,
    ) -> Result<u64, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_status(ids, from, to).await
    }

    async fn delete_in_status(&self, ids: &[ShareId], status: ShareStatus) -> Result<u64, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_in_status(ids, status).await
    }
}

#[tokio::test]
async fn test_concurrent_share_pass_is_skipped() {
    let fake = Arc::new(FakeHosts::new());
    fake.add_host(NAS, FakeHostState::default());
    fake.set_latency(Some(Duration::from_millis(20)));
    let hosts = Arc::new(InMemoryHostRepository::new());
    hosts.create(&ManagedHost::new(NAS)).await.unwrap();
    let shares = Arc::new(CountingShares {
        inner: InMemoryShareRepository::new(),
        calls: AtomicUsize::new(0),
    });
    let share = shares
        .create(&Share::new(
            HostId::new(NAS),
            "team",
            "/mnt/team",
            "/team",
            vec![UserPermission::new("alice", Permission::ReadWrite)],
        ))
        .await
        .unwrap();
    let reconciler = ShareReconciler::new(
        hosts.clone(),
        shares.clone(),
        fake.clone(),
        ShareConfigRenderer::new().unwrap(),
        "/etc/samba/smb.conf",
    );

    let (first, second) = tokio::join!(reconciler.sync(), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let calls_before = shares.calls.load(Ordering::SeqCst);
        let commands_before = fake.all_commands().len();
        let outcome = reconciler.sync().await;
        (
            outcome,
            calls_before == shares.calls.load(Ordering::SeqCst),
            commands_before == fake.all_commands().len(),
        )
    });

    assert_eq!(first.unwrap(), SyncOutcome::Completed);
    let (outcome, store_untouched, hosts_untouched) = second;
    assert_eq!(outcome.unwrap(), SyncOutcome::Busy);
    assert!(store_untouched);
    assert!(hosts_untouched);
    assert_eq!(fake.state(NAS).share_reloads, 1);
    let stored = shares.inner.find_by_id(share.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ShareStatus::Active);
}

#[tokio::test]
async fn test_concurrent_account_pass_is_skipped() {
    let fake = Arc::new(FakeHosts::new());
    fake.set_latency(Some(Duration::from_millis(20)));
    let users = Arc::new(InMemoryShareUserRepository::new());
    users.create(&ShareUser::new(HostId::new(NAS), "alice", "pw")).await.unwrap();
    let reconciler = AccountReconciler::new(users.clone(), fake.clone());

    let (first, second) = tokio::join!(reconciler.sync(), reconciler.sync());

    assert_eq!(first.unwrap(), SyncOutcome::Completed);
    assert_eq!(second.unwrap(), SyncOutcome::Busy);
    assert_eq!(fake.count_matching(NAS, "useradd"), 1);
}

#[test]
fn test_share_acl_mapping() {
    let renderer = ShareConfigRenderer::new().unwrap();

    let public = Share::new(
        HostId::new(NAS),
        "public",
        "/mnt/public",
        "/public",
        vec![UserPermission::new(EVERYONE, Permission::ReadWrite)],
    );
    let conf = renderer.render(&[public]).unwrap();
    assert!(conf.contains("guest ok = yes"));
    assert!(conf.contains("read only = no"));
    assert!(!conf.contains("valid users"));

    let private = Share::new(
        HostId::new(NAS),
        "team",
        "/mnt/team",
        "/team",
        vec![
            UserPermission::new("alice", Permission::ReadWrite),
            UserPermission::new("bob", Permission::Read),
        ],
    );
    let conf = renderer.render(&[private]).unwrap();
    assert!(conf.contains("guest ok = no"));
    assert!(conf.contains("valid users = alice bob"));
    assert!(conf.contains("write list = alice"));
}

#[tokio::test]
async fn test_account_init_becomes_active_after_both_creations() {
    let fake = Arc::new(FakeHosts::new());
    fake.add_host(NAS, FakeHostState::default());
    let users = Arc::new(InMemoryShareUserRepository::new());
    let user = users.create(&ShareUser::new(HostId::new(NAS), "alice", "s3cret")).await.unwrap();
    let reconciler = AccountReconciler::new(users.clone(), fake.clone());

    reconciler.sync().await.unwrap();

    let stored = users.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ShareUserStatus::Active);
    let state = fake.state(NAS);
    assert!(state.os_users.contains_key("alice"));
    assert_eq!(state.share_accounts.get("alice").map(String::as_str), Some("s3cret"));
}

#[tokio::test]
async fn test_account_stays_init_when_share_account_creation_fails() {
    let fake = Arc::new(FakeHosts::new());
    fake.add_host(NAS, FakeHostState::default());
    fake.fail_when(Some(NAS), "smbpasswd", "Failed to add entry for user alice.");
    let users = Arc::new(InMemoryShareUserRepository::new());
    let user = users.create(&ShareUser::new(HostId::new(NAS), "alice", "s3cret")).await.unwrap();
    let reconciler = AccountReconciler::new(users.clone(), fake.clone());

    reconciler.sync().await.unwrap();

    let stored = users.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ShareUserStatus::Init);
    assert!(fake.state(NAS).os_users.contains_key("alice"));

    fake.clear_failures();
    reconciler.sync().await.unwrap();
    assert_eq!(
        users.find_by_id(user.id).await.unwrap().unwrap().status,
        ShareUserStatus::Active
    );
}
