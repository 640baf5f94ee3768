// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod errors;
pub mod reconciler;
pub mod single_flight;

pub mod account_reconciler;
pub mod export_reconciler;
pub mod mount_reconciler;
pub mod share_reconciler;

pub mod host_bootstrap;
pub mod repository_factory;
pub mod scheduler;

// Re-export the reconcilers for convenience
pub use account_reconciler::AccountReconciler;
pub use errors::SyncError;
pub use export_reconciler::{ExportReconciler, ExportSettings, ServiceStatus};
pub use host_bootstrap::HostBootstrap;
pub use mount_reconciler::MountReconciler;
pub use reconciler::{HostSync, Reconciler, SyncOutcome};
pub use repository_factory::{create_repositories, Repositories};
pub use scheduler::{JobInfo, Scheduler, SchedulerError};
pub use share_reconciler::ShareReconciler;
