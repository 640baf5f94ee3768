// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! In-process controller
//!
//! Builds the store, the host gateway and the four reconcilers from a
//! [`ControllerConfigManifest`]. Both the daemon and the one-shot commands
//! go through here.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use nas_core::{
    application::{
        create_repositories, AccountReconciler, ExportReconciler, ExportSettings,
        HostBootstrap, MountReconciler, Reconciler, Repositories, Scheduler, ShareReconciler,
    },
    domain::{
        controller_config::ControllerConfigManifest,
        repository::{SqliteConfig, StorageBackend},
    },
    infrastructure::{ExportConfigRenderer, HostGateway, ShareConfigRenderer},
};

pub const JOB_MOUNT_POINTS: &str = "mount_points";
pub const JOB_SHARE_USERS: &str = "share_users";
pub const JOB_SHARES: &str = "shares";
pub const JOB_EXPORTS: &str = "exports";

pub struct Controller {
    pub config: ControllerConfigManifest,
    pub repositories: Repositories,
    pub gateway: Arc<HostGateway>,
    pub mounts: Arc<MountReconciler>,
    pub accounts: Arc<AccountReconciler>,
    pub shares: Arc<ShareReconciler>,
    pub exports: Arc<ExportReconciler>,
}

impl Controller {
    pub async fn open(config: ControllerConfigManifest) -> Result<Self> {
        config
            .validate()
            .context("Configuration validation failed")?;

        let backend = StorageBackend::Sqlite(SqliteConfig {
            path: config.spec.database.path.clone(),
        });
        let repositories = create_repositories(&backend)
            .await
            .context("Failed to open the desired-state store")?;

        let gateway = Arc::new(
            HostGateway::from_config(&config.spec.ssh).with_host_store(repositories.hosts.clone()),
        );
        let hosts = repositories
            .hosts
            .list_all()
            .await
            .context("Failed to load managed hosts")?;
        gateway.register_hosts(&hosts);
        info!(hosts = hosts.len(), "Managed hosts loaded");

        let services = &config.spec.services;
        let mounts = Arc::new(MountReconciler::new(
            repositories.hosts.clone(),
            repositories.mount_points.clone(),
            gateway.clone(),
            services.mount_root.clone(),
        ));
        let accounts = Arc::new(AccountReconciler::new(
            repositories.share_users.clone(),
            gateway.clone(),
        ));
        let shares = Arc::new(ShareReconciler::new(
            repositories.hosts.clone(),
            repositories.shares.clone(),
            gateway.clone(),
            ShareConfigRenderer::new().context("Failed to compile share template")?,
            services.share_config_path.clone(),
        ));
        let exports = Arc::new(ExportReconciler::new(
            repositories.exports.clone(),
            gateway.clone(),
            ExportConfigRenderer::new(services.mount_root.clone())
                .context("Failed to compile export template")?,
            ExportSettings::from_services(services),
        ));

        Ok(Self {
            config,
            repositories,
            gateway,
            mounts,
            accounts,
            shares,
            exports,
        })
    }

    pub fn bootstrap(&self) -> HostBootstrap {
        HostBootstrap::new(self.repositories.hosts.clone(), self.gateway.clone())
    }

    /// Reconcilers in the order a full pass runs them.
    pub fn reconcilers(&self) -> Vec<(&'static str, Arc<dyn Reconciler>)> {
        vec![
            (JOB_MOUNT_POINTS, self.mounts.clone() as Arc<dyn Reconciler>),
            (JOB_SHARE_USERS, self.accounts.clone() as Arc<dyn Reconciler>),
            (JOB_SHARES, self.shares.clone() as Arc<dyn Reconciler>),
            (JOB_EXPORTS, self.exports.clone() as Arc<dyn Reconciler>),
        ]
    }

    /// Scheduler with every job registered at its configured cadence.
    pub fn scheduler(&self) -> Result<Scheduler> {
        let schedule = &self.config.spec.schedule;
        let scheduler = Scheduler::new();
        for (name, reconciler) in self.reconcilers() {
            let expr = match name {
                JOB_MOUNT_POINTS => &schedule.mount_points,
                JOB_SHARE_USERS => &schedule.share_users,
                JOB_SHARES => &schedule.shares,
                _ => &schedule.exports,
            };
            scheduler
                .add_job(name, expr, reconciler)
                .with_context(|| format!("Failed to register job '{}'", name))?;
        }
        Ok(scheduler)
    }
}
