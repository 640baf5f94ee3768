// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lifecycle
//!
//! Common contract for the closed status enumerations carried by reconciled
//! records. Each status type owns its own transition table; reconcilers go
//! through [`Lifecycle::transition`] so a write the table does not allow is
//! rejected instead of persisted.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Status transition validation

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {entity} status transition: {from} -> {to}")]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

pub trait Lifecycle: Copy + PartialEq + std::fmt::Debug {
    /// Name of the entity kind, used in errors and logs.
    const ENTITY: &'static str;

    /// Stored representation of the status.
    fn as_str(&self) -> &'static str;

    fn can_transition_to(&self, next: Self) -> bool;

    fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                entity: Self::ENTITY,
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}
