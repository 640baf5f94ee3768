// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Reconciliation control plane for file-share exports, share accounts and
//! block-device mount points across managed hosts.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, reconcilers and their infrastructure

pub mod domain;
pub mod application;
pub mod infrastructure;
