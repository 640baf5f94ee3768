// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Long-running controller: every reconciler on its own timer until
//! SIGINT/SIGTERM.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use nas_core::domain::controller_config::ControllerConfigManifest;

use crate::controller::Controller;

pub async fn execute(config: ControllerConfigManifest) -> Result<()> {
    let controller = Controller::open(config).await?;

    // The controller host is always managed; a failed reachability check only delays it.
    match controller.bootstrap().ensure_local_host().await {
        Ok(host) => controller.gateway.register_hosts(&[host]),
        Err(e) => warn!(error = %e, "Failed to register the controller host"),
    }

    let scheduler = controller
        .scheduler()
        .context("Failed to build the job scheduler")?;
    for job in scheduler.list_jobs() {
        info!(job = %job.name, schedule = %job.schedule, "Reconciliation job configured");
    }

    scheduler.start();
    info!("NAS controller running");

    shutdown_signal().await;

    info!("Shutdown signal received, stopping reconciliation jobs");
    scheduler.stop();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
