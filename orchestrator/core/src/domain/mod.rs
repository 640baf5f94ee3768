// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Desired-state entities, their status machines and the contracts the
//! reconcilers depend on (repositories, remote execution).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Entities, value objects and interfaces

pub mod controller_config;
pub mod export;
pub mod host;
pub mod host_command;
pub mod lifecycle;
pub mod mount_point;
pub mod remote;
pub mod repository;
pub mod schedule;
pub mod share;
pub mod share_user;
