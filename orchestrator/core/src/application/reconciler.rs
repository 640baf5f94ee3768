// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Reconciler
//!
//! Zero-argument entry point every reconciler exposes, so the scheduler (or a
//! manual "sync now" trigger) can drive any of them the same way.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Reconciler contract and pass outcome

use async_trait::async_trait;

use crate::application::errors::SyncError;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pass ran to the end. Per-host and per-record failures were logged.
    Completed,
    /// Another pass of the same reconciler was still running.
    Busy,
}

/// Result of converging a single host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSync {
    /// Live state already matched; nothing was written or reloaded.
    Unchanged,
    Applied,
}

#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Job name used for scheduling and logs.
    fn name(&self) -> &'static str;

    /// Run one pass. Only store failures are returned as errors.
    async fn reconcile(&self) -> Result<SyncOutcome, SyncError>;
}
