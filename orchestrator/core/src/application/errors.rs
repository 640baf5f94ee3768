// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Sync Errors
//!
//! Failures surfaced by a reconciliation pass. Store errors abort the pass;
//! every other variant is scoped to one host or record and is logged by the
//! reconciler before it moves on.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Error taxonomy shared by the reconcilers

use thiserror::Error;

use crate::domain::lifecycle::TransitionError;
use crate::domain::remote::RemoteExecError;
use crate::domain::repository::RepositoryError;
use crate::infrastructure::service_config::RenderError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("remote command failed on {host}: {source}")]
    Remote {
        host: String,
        #[source]
        source: RemoteExecError,
    },

    #[error("failed to render config for {host}: {source}")]
    Render {
        host: String,
        #[source]
        source: RenderError,
    },

    #[error("service reload failed on {host}: {source}")]
    Reload {
        host: String,
        #[source]
        source: RemoteExecError,
    },

    /// Rollback after a failed reload also failed.
    #[error("service reload failed on {host}: {reload}; rollback failed: {rollback}")]
    Rollback {
        host: String,
        reload: RemoteExecError,
        rollback: RemoteExecError,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl SyncError {
    pub fn remote(host: &str, source: RemoteExecError) -> Self {
        Self::Remote {
            host: host.to_string(),
            source,
        }
    }

    pub fn render(host: &str, source: RenderError) -> Self {
        Self::Render {
            host: host.to_string(),
            source,
        }
    }

    /// Captured command output, when the failure came from a host.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Remote { source, .. } | Self::Reload { source, .. } => Some(source.output()),
            Self::Rollback { rollback, .. } => Some(rollback.output()),
            _ => None,
        }
    }
}
