// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on storage backend
//! configuration, so the domain layer only ever sees the traits.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wires repository implementations for the selected backend

use anyhow::Result;
use std::sync::Arc;

use crate::domain::repository::{
    ExportRepository, HostRepository, MountPointRepository, ShareRepository, ShareUserRepository,
    StorageBackend,
};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryExportRepository, InMemoryHostRepository, InMemoryMountPointRepository,
    InMemoryShareRepository, InMemoryShareUserRepository, SqliteExportRepository,
    SqliteHostRepository, SqliteMountPointRepository, SqliteShareRepository,
    SqliteShareUserRepository,
};

/// One repository per aggregate, all backed by the same store.
#[derive(Clone)]
pub struct Repositories {
    pub hosts: Arc<dyn HostRepository>,
    pub mount_points: Arc<dyn MountPointRepository>,
    pub share_users: Arc<dyn ShareUserRepository>,
    pub shares: Arc<dyn ShareRepository>,
    pub exports: Arc<dyn ExportRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            hosts: Arc::new(InMemoryHostRepository::new()),
            mount_points: Arc::new(InMemoryMountPointRepository::new()),
            share_users: Arc::new(InMemoryShareUserRepository::new()),
            shares: Arc::new(InMemoryShareRepository::new()),
            exports: Arc::new(InMemoryExportRepository::new()),
        }
    }

    pub fn sqlite(db: &Database) -> Self {
        let pool = db.get_pool().clone();
        Self {
            hosts: Arc::new(SqliteHostRepository::new(pool.clone())),
            mount_points: Arc::new(SqliteMountPointRepository::new(pool.clone())),
            share_users: Arc::new(SqliteShareUserRepository::new(pool.clone())),
            shares: Arc::new(SqliteShareRepository::new(pool.clone())),
            exports: Arc::new(SqliteExportRepository::new(pool)),
        }
    }
}

/// Creates the repositories for the configured backend, opening the database
/// when one is needed.
pub async fn create_repositories(backend: &StorageBackend) -> Result<Repositories> {
    match backend {
        StorageBackend::InMemory => Ok(Repositories::in_memory()),
        StorageBackend::Sqlite(config) => {
            let db = Database::connect(&config.path).await?;
            Ok(Repositories::sqlite(&db))
        }
    }
}
