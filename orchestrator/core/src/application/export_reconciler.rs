// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Export Reconciler
//!
//! Converges enabled export records into each host's export-service config.
//!
//! Per host:
//! 1. Render the config for the host's enabled exports.
//! 2. Compare its checksum with the file on the host; equal means done.
//! 3. Back up the current file (best effort), write the new one, reload.
//! 4. On reload failure restore the latest backup and reload again. A failed
//!    rollback is reported together with the original reload failure.
//! 5. Stamp `last_applied` on every exported record.
//!
//! Also exposes a side-effect free dry run ([`ExportReconciler::test_config`])
//! that validates a candidate export set with the service's own checker.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Export definition convergence, backup and rollback

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::errors::SyncError;
use crate::application::reconciler::{HostSync, Reconciler, SyncOutcome};
use crate::application::single_flight::SingleFlight;
use crate::domain::controller_config::ServicesConfig;
use crate::domain::export::{ConfigTestResult, Export};
use crate::domain::host::{resolve_address, LOCAL_HOST};
use crate::domain::host_command::{HostCommand, FILE_EXISTS, RELOAD_SUCCESS};
use crate::domain::remote::{RemoteExecError, RemoteExecutor};
use crate::domain::repository::ExportRepository;
use crate::infrastructure::service_config::{checksum, AnonymousIds, ExportConfigRenderer, RenderError};

const CONFIG_MODE: u32 = 0o644;

/// Host-side locations and names the reconciler works with.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub config_path: String,
    pub service_unit: String,
    pub anonymous_account: String,
}

impl ExportSettings {
    pub fn from_services(services: &ServicesConfig) -> Self {
        Self {
            config_path: services.export_config_path.clone(),
            service_unit: services.export_service_unit.clone(),
            anonymous_account: services.anonymous_account.clone(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_services(&ServicesConfig::default())
    }
}

/// Export service state as reported by the init system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Starting,
    Stopping,
    Unknown,
}

impl ServiceStatus {
    /// Maps `systemctl is-active` output.
    pub fn from_status_output(output: &str) -> Self {
        match output.trim() {
            "active" => Self::Running,
            "inactive" => Self::Stopped,
            "activating" => Self::Starting,
            "deactivating" => Self::Stopping,
            _ => Self::Unknown,
        }
    }
}

pub struct ExportReconciler {
    exports: Arc<dyn ExportRepository>,
    executor: Arc<dyn RemoteExecutor>,
    renderer: ExportConfigRenderer,
    settings: ExportSettings,
    guard: SingleFlight,
}

impl ExportReconciler {
    pub fn new(
        exports: Arc<dyn ExportRepository>,
        executor: Arc<dyn RemoteExecutor>,
        renderer: ExportConfigRenderer,
        settings: ExportSettings,
    ) -> Self {
        Self {
            exports,
            executor,
            renderer,
            settings,
            guard: SingleFlight::new(),
        }
    }

    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let Some(_running) = self.guard.try_enter() else {
            debug!("Export sync already running, skipping");
            return Ok(SyncOutcome::Busy);
        };

        let exports = self.exports.find_enabled().await?;
        if exports.is_empty() {
            debug!("No enabled exports");
            return Ok(SyncOutcome::Completed);
        }

        for (address, group) in group_by_address(exports) {
            self.ensure_service(&address).await;

            match self.sync_host(&address, &group).await {
                Ok(HostSync::Unchanged) => {
                    debug!(host = %address, exports = group.len(), "Export config unchanged");
                }
                Ok(HostSync::Applied) => {}
                Err(e) => {
                    error!(host = %address, error = %e, output = e.output(), "Export sync failed");
                }
            }
        }
        Ok(SyncOutcome::Completed)
    }

    /// Converge one host to `exports`, which must all belong to it.
    pub async fn sync_host(&self, address: &str, exports: &[Export]) -> Result<HostSync, SyncError> {
        let content = self.render_for_host(address, exports).await?;
        let desired = checksum(content.as_bytes());

        let current = self.current_checksum(address).await?;
        if current.as_deref() == Some(desired.as_str()) {
            return Ok(HostSync::Unchanged);
        }

        if current.is_some() {
            self.backup(address).await;
        }

        self.executor
            .write_file(address, &self.settings.config_path, content.as_bytes(), CONFIG_MODE)
            .await
            .map_err(|e| SyncError::remote(address, e))?;

        if let Err(reload) = self.reload(address).await {
            warn!(host = address, error = %reload, output = reload.output(), "Export reload failed, rolling back");
            return Err(match self.rollback(address).await {
                Ok(()) => SyncError::Reload {
                    host: address.to_string(),
                    source: reload,
                },
                Err(rollback) => SyncError::Rollback {
                    host: address.to_string(),
                    reload,
                    rollback,
                },
            });
        }

        let applied_at = Utc::now();
        for export in exports {
            if let Err(e) = self.exports.update_last_applied(export.id, applied_at).await {
                warn!(host = address, export_id = %export.id, error = %e, "Failed to record last applied time");
            }
        }

        info!(host = address, exports = exports.len(), checksum = %desired, "Export config applied");
        Ok(HostSync::Applied)
    }

    /// Pure rendering of `exports` with the given anonymous ids.
    pub fn render_config(&self, exports: &[Export], ids: AnonymousIds) -> Result<String, RenderError> {
        self.renderer.render(exports, ids)
    }

    /// Render the config `address` should carry for `exports`.
    pub async fn render_for_host(&self, address: &str, exports: &[Export]) -> Result<String, SyncError> {
        let ids = self.anonymous_ids(address).await?;
        self.render_config(exports, ids)
            .map_err(|e| SyncError::render(address, e))
    }

    /// Validate a candidate export set on the controller host without
    /// touching the live config.
    pub async fn test_config(&self, candidates: &[Export]) -> ConfigTestResult {
        let enabled: Vec<Export> = candidates.iter().filter(|e| e.is_enabled()).cloned().collect();

        let content = match self.render_for_host(LOCAL_HOST, &enabled).await {
            Ok(content) => content,
            Err(e @ SyncError::Render { .. }) => {
                return ConfigTestResult::failed("Template compilation failed", e.to_string())
            }
            Err(e) => {
                return ConfigTestResult::failed("Failed to resolve anonymous account", e.to_string())
            }
        };

        let path = format!(
            "/tmp/ganesha_test_{}.conf",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        if let Err(e) = self
            .executor
            .write_file(LOCAL_HOST, &path, content.as_bytes(), 0o600)
            .await
        {
            return ConfigTestResult::failed("Failed to create temporary config file", e.to_string());
        }

        let result = match self
            .executor
            .run(LOCAL_HOST, &HostCommand::ValidateExportConfig { path: path.clone() })
            .await
        {
            Ok(_) => ConfigTestResult::passed(),
            Err(e) => {
                let detail = if e.output().trim().is_empty() {
                    e.to_string()
                } else {
                    e.output().trim().to_string()
                };
                ConfigTestResult::failed("Configuration validation failed", detail)
            }
        };

        if let Err(e) = self
            .executor
            .run(LOCAL_HOST, &HostCommand::RemoveFile { path: path.clone() })
            .await
        {
            warn!(path = %path, error = %e, "Failed to remove temporary config file");
        }
        result
    }

    pub async fn service_status(&self, address: &str) -> ServiceStatus {
        let check = HostCommand::ServiceActive {
            unit: self.settings.service_unit.clone(),
        };
        match self.executor.run(address, &check).await {
            Ok(output) => ServiceStatus::from_status_output(&output),
            Err(e) => {
                debug!(host = address, error = %e, "Service status check failed");
                ServiceStatus::Unknown
            }
        }
    }

    /// Start and enable the export service. Failures are warnings only.
    async fn ensure_service(&self, address: &str) {
        let unit = self.settings.service_unit.clone();

        let status = self.service_status(address).await;
        if status != ServiceStatus::Running {
            info!(host = address, unit = %unit, status = ?status, "Starting export service");
            if let Err(e) = self
                .executor
                .run(address, &HostCommand::StartService { unit: unit.clone() })
                .await
            {
                warn!(host = address, unit = %unit, error = %e, output = e.output(), "Failed to start export service");
            }
        }

        let enabled = self
            .executor
            .run(address, &HostCommand::ServiceEnabled { unit: unit.clone() })
            .await
            .map(|out| out.trim() == "enabled")
            .unwrap_or(false);
        if !enabled {
            if let Err(e) = self
                .executor
                .run(address, &HostCommand::EnableService { unit: unit.clone() })
                .await
            {
                warn!(host = address, unit = %unit, error = %e, output = e.output(), "Failed to enable export service");
            }
        }
    }

    /// Uid/gid of the anonymous account on `address`. Unresolvable ids fail
    /// the host instead of rendering root squash targets.
    async fn anonymous_ids(&self, address: &str) -> Result<AnonymousIds, SyncError> {
        let username = self.settings.anonymous_account.clone();
        let uid = self
            .resolve_id(address, HostCommand::UserUid { username: username.clone() })
            .await?;
        let gid = self
            .resolve_id(address, HostCommand::UserGid { username })
            .await?;
        Ok(AnonymousIds { uid, gid })
    }

    async fn resolve_id(&self, address: &str, cmd: HostCommand) -> Result<u32, SyncError> {
        let output = self
            .executor
            .run(address, &cmd)
            .await
            .map_err(|e| SyncError::remote(address, e))?;
        output.trim().parse().map_err(|_| {
            SyncError::remote(
                address,
                RemoteExecError::exec_failed(
                    format!("unexpected output from `{}`", cmd),
                    output.clone(),
                ),
            )
        })
    }

    async fn current_checksum(&self, address: &str) -> Result<Option<String>, SyncError> {
        let path = self.settings.config_path.clone();
        let exists = self
            .executor
            .run(address, &HostCommand::FileExists { path: path.clone() })
            .await
            .map_err(|e| SyncError::remote(address, e))?;
        if exists.trim() != FILE_EXISTS {
            return Ok(None);
        }

        let current = self
            .executor
            .run(address, &HostCommand::ReadFile { path })
            .await
            .map_err(|e| SyncError::remote(address, e))?;
        Ok(Some(checksum(current.as_bytes())))
    }

    async fn backup(&self, address: &str) {
        let from = self.settings.config_path.clone();
        let to = HostCommand::backup_path(&from, Utc::now().timestamp());
        match self
            .executor
            .run(address, &HostCommand::CopyFile { from, to: to.clone() })
            .await
        {
            Ok(_) => debug!(host = address, backup = %to, "Backed up export config"),
            Err(e) => warn!(host = address, error = %e, output = e.output(), "Export config backup failed"),
        }
    }

    async fn reload(&self, address: &str) -> Result<(), RemoteExecError> {
        let output = self
            .executor
            .run(address, &HostCommand::ReloadExportService)
            .await?;
        if output.contains(RELOAD_SUCCESS) {
            Ok(())
        } else {
            Err(RemoteExecError::exec_failed("export service reload failed", output))
        }
    }

    async fn rollback(&self, address: &str) -> Result<(), RemoteExecError> {
        let path = self.settings.config_path.clone();
        let latest = self
            .executor
            .run(address, &HostCommand::LatestBackup { path: path.clone() })
            .await?;
        let backup = latest.trim();
        if backup.is_empty() {
            return Err(RemoteExecError::exec_failed(
                format!("no backup found for {}", path),
                latest.clone(),
            ));
        }

        self.executor
            .run(
                address,
                &HostCommand::MoveFile {
                    from: backup.to_string(),
                    to: path,
                },
            )
            .await?;
        self.reload(address).await?;

        info!(host = address, backup, "Export config rolled back");
        Ok(())
    }
}

/// Groups exports by host address; an empty host means the controller host.
fn group_by_address(exports: Vec<Export>) -> Vec<(String, Vec<Export>)> {
    let mut groups: Vec<(String, Vec<Export>)> = Vec::new();
    for export in exports {
        let address = resolve_address(export.host_id.as_str()).to_string();
        match groups.iter_mut().find(|(a, _)| *a == address) {
            Some((_, group)) => group.push(export),
            None => groups.push((address, vec![export])),
        }
    }
    groups
}

#[async_trait]
impl Reconciler for ExportReconciler {
    fn name(&self) -> &'static str {
        "exports"
    }

    async fn reconcile(&self) -> Result<SyncOutcome, SyncError> {
        self.sync().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::export::{AccessType, ExportStatus, NfsAcl};
    use crate::domain::host::HostId;
    use crate::infrastructure::remote::{FakeHostState, FakeHosts};
    use crate::infrastructure::repositories::InMemoryExportRepository;

    const CONF: &str = "/etc/ganesha/ganesha.conf";

    fn setup() -> (Arc<FakeHosts>, Arc<InMemoryExportRepository>, ExportReconciler) {
        let fake = Arc::new(FakeHosts::new());
        let exports = Arc::new(InMemoryExportRepository::new());
        let reconciler = ExportReconciler::new(
            exports.clone(),
            fake.clone(),
            ExportConfigRenderer::new("/mnt").unwrap(),
            ExportSettings::default(),
        );
        (fake, exports, reconciler)
    }

    /// Give `host` the anonymous account so ids resolve.
    fn seed_anonymous(fake: &FakeHosts, host: &str) {
        fake.update(host, |s| {
            s.os_users.insert(ExportSettings::default().anonymous_account, 499);
        });
    }

    fn media(host: &str) -> Export {
        Export::new(
            HostId::new(host),
            "media",
            "media",
            "/media",
            vec![NfsAcl::new("10.0.0.0/24", AccessType::ReadWrite)],
        )
    }

    #[test]
    fn test_service_status_mapping() {
        assert_eq!(ServiceStatus::from_status_output("active\n"), ServiceStatus::Running);
        assert_eq!(ServiceStatus::from_status_output("inactive"), ServiceStatus::Stopped);
        assert_eq!(ServiceStatus::from_status_output("activating"), ServiceStatus::Starting);
        assert_eq!(ServiceStatus::from_status_output("deactivating"), ServiceStatus::Stopping);
        assert_eq!(ServiceStatus::from_status_output("failed"), ServiceStatus::Unknown);
    }

    #[test]
    fn test_empty_host_groups_with_local() {
        let groups = group_by_address(vec![media(""), media("127.0.0.1"), media("10.0.0.2")]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, LOCAL_HOST);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_first_apply_without_existing_file() {
        let (fake, exports, reconciler) = setup();
        seed_anonymous(&fake, "10.0.0.2");
        let export = exports.create(&media("10.0.0.2")).await.unwrap();

        reconciler.sync().await.unwrap();

        let state = fake.state("10.0.0.2");
        assert!(state.files[CONF].contains("Path = /mnt/media;"));
        assert!(state.files[CONF].contains("Anonymous_Uid = 499;"));
        assert_eq!(state.export_reloads, 1);
        assert_eq!(fake.count_matching("10.0.0.2", "cp "), 0);
        assert!(exports.find_by_id(export.id).await.unwrap().unwrap().last_applied.is_some());
    }

    #[tokio::test]
    async fn test_stopped_service_is_started_and_enabled() {
        let (fake, exports, reconciler) = setup();
        seed_anonymous(&fake, "10.0.0.2");
        exports.create(&media("10.0.0.2")).await.unwrap();

        reconciler.sync().await.unwrap();

        let state = fake.state("10.0.0.2");
        assert!(state.active_services.contains("nfs-ganesha"));
        assert!(state.enabled_services.contains("nfs-ganesha"));
    }

    #[tokio::test]
    async fn test_anonymous_account_ids_are_rendered() {
        let (fake, exports, reconciler) = setup();
        fake.update("10.0.0.2", |s| {
            s.os_users.insert(ExportSettings::default().anonymous_account, 1500);
        });
        exports.create(&media("10.0.0.2")).await.unwrap();

        reconciler.sync().await.unwrap();

        let conf = &fake.state("10.0.0.2").files[CONF];
        assert!(conf.contains("Anonymous_Uid = 1500;"));
        assert!(conf.contains("Anonymous_Gid = 1500;"));
    }

    #[tokio::test]
    async fn test_disabled_exports_are_ignored() {
        let (fake, exports, reconciler) = setup();
        let mut off = media("10.0.0.2");
        off.status = ExportStatus::Disabled;
        exports.create(&off).await.unwrap();

        reconciler.sync().await.unwrap();
        assert!(fake.all_commands().is_empty());
    }

    #[tokio::test]
    async fn test_config_dry_run() {
        let (fake, _exports, reconciler) = setup();
        fake.add_host(LOCAL_HOST, FakeHostState::default());
        seed_anonymous(&fake, LOCAL_HOST);

        let result = reconciler.test_config(&[media("")]).await;
        assert!(result.valid, "{:?}", result);
        assert_eq!(result.message, "Configuration validation passed");
        assert!(fake.state(LOCAL_HOST).files.is_empty());
        assert!(!fake.state(LOCAL_HOST).files.contains_key(CONF));

        fake.update(LOCAL_HOST, |s| {
            s.export_config_error = Some("Config File (/tmp/x): 1 errors".to_string());
        });
        let result = reconciler.test_config(&[media("")]).await;
        assert!(!result.valid);
        assert_eq!(result.message, "Configuration validation failed");
        assert_eq!(result.errors, vec!["Config File (/tmp/x): 1 errors".to_string()]);
    }

    #[tokio::test]
    async fn test_config_dry_run_render_failure() {
        let (fake, _exports, reconciler) = setup();
        seed_anonymous(&fake, LOCAL_HOST);
        let mut broken = media("");
        broken.pseudo = String::new();

        let result = reconciler.test_config(&[broken]).await;
        assert!(!result.valid);
        assert_eq!(result.message, "Template compilation failed");
    }

    #[tokio::test]
    async fn test_unresolvable_anonymous_account_skips_host() {
        let (fake, exports, reconciler) = setup();
        seed_anonymous(&fake, "10.0.0.2");
        fake.update("10.0.0.2", |s| {
            s.files.insert(CONF.to_string(), "EXPORT { Export_Id = 1; }\n".to_string());
        });
        fake.fail_once(Some("10.0.0.2"), "id -u", "ssh: connect to host 10.0.0.2 port 22: Connection timed out");
        let export = exports.create(&media("10.0.0.2")).await.unwrap();

        let group = exports.find_enabled().await.unwrap();
        let err = reconciler.sync_host("10.0.0.2", &group).await.unwrap_err();

        assert!(matches!(err, SyncError::Remote { .. }));
        assert_eq!(fake.count_matching("10.0.0.2", "write_file"), 0);
        assert_eq!(fake.count_matching("10.0.0.2", "pgrep"), 0);
        assert_eq!(fake.state("10.0.0.2").files[CONF], "EXPORT { Export_Id = 1; }\n");
        assert!(exports.find_by_id(export.id).await.unwrap().unwrap().last_applied.is_none());
    }

    #[tokio::test]
    async fn test_missing_anonymous_account_skips_host() {
        let (fake, exports, reconciler) = setup();
        exports.create(&media("10.0.0.2")).await.unwrap();

        reconciler.sync().await.unwrap();

        assert_eq!(fake.count_matching("10.0.0.2", "write_file"), 0);
        assert!(!fake.state("10.0.0.2").files.contains_key(CONF));
    }

    #[tokio::test]
    async fn test_config_dry_run_reports_missing_anonymous_account() {
        let (_fake, _exports, reconciler) = setup();

        let result = reconciler.test_config(&[media("")]).await;
        assert!(!result.valid);
        assert_eq!(result.message, "Failed to resolve anonymous account");
    }
}
