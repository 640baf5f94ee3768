// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the NAS controller CLI

pub mod config;
pub mod exports;
pub mod host;
pub mod run;
pub mod sync;

pub use self::config::ConfigCommand;
pub use self::host::HostCommand;
pub use self::sync::JobSelector;
