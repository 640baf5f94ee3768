// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! One-shot reconciliation pass

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;

use nas_core::application::SyncOutcome;
use nas_core::domain::controller_config::ControllerConfigManifest;

use crate::controller::{Controller, JOB_EXPORTS, JOB_MOUNT_POINTS, JOB_SHARES, JOB_SHARE_USERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobSelector {
    All,
    MountPoints,
    ShareUsers,
    Shares,
    Exports,
}

impl JobSelector {
    pub fn matches(self, job: &str) -> bool {
        match self {
            Self::All => true,
            Self::MountPoints => job == JOB_MOUNT_POINTS,
            Self::ShareUsers => job == JOB_SHARE_USERS,
            Self::Shares => job == JOB_SHARES,
            Self::Exports => job == JOB_EXPORTS,
        }
    }
}

pub async fn execute(config: ControllerConfigManifest, selector: JobSelector) -> Result<()> {
    let controller = Controller::open(config).await?;

    let mut failed = 0usize;
    for (job, reconciler) in controller.reconcilers() {
        if !selector.matches(job) {
            continue;
        }

        match reconciler.reconcile().await {
            Ok(SyncOutcome::Completed) => println!("{} {}", "✓".green(), job),
            Ok(SyncOutcome::Busy) => {
                println!("{} {} (another pass in progress)", "-".yellow(), job)
            }
            Err(e) => {
                failed += 1;
                println!("{} {}: {}", "✗".red(), job, e);
                if let Some(output) = e.output() {
                    println!("    {}", output.trim().dimmed());
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} reconciliation pass(es) failed", failed);
    }
    Ok(())
}
