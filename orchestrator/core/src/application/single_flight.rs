// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Single-flight guard owned by a reconciler instance.
//!
//! `try_enter` never waits: while a pass holds the guard, a second caller gets
//! `None` and is expected to return without touching the store or any host.

use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct SingleFlight {
    lock: Mutex<()>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_enter(&self) -> Option<MutexGuard<'_, ()>> {
        self.lock.try_lock().ok()
    }

    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
