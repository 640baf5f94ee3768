// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod remote;
pub mod repositories;
pub mod service_config;

pub use remote::{FakeHosts, HostGateway};
pub use service_config::{checksum, ExportConfigRenderer, ShareConfigRenderer};
