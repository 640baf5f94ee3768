// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root: one repository per
//! aggregate, interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `HostRepository` | `ManagedHost` | `InMemoryHostRepository`, `SqliteHostRepository` |
//! | `MountPointRepository` | `MountPointSpec` | `InMemoryMountPointRepository`, `SqliteMountPointRepository` |
//! | `ShareUserRepository` | `ShareUser` | `InMemoryShareUserRepository`, `SqliteShareUserRepository` |
//! | `ShareRepository` | `Share` | `InMemoryShareRepository`, `SqliteShareRepository` |
//! | `ExportRepository` | `Export` | `InMemoryExportRepository`, `SqliteExportRepository` |
//!
//! Reconcilers only use filtered reads, conditional bulk updates scoped to the
//! record ids they just processed, conditional deletes, and create. Updates and
//! deletes return the number of affected rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::export::{Export, ExportId};
use crate::domain::host::{HostId, ManagedHost};
use crate::domain::mount_point::MountPointSpec;
use crate::domain::share::{Share, ShareId, ShareStatus};
use crate::domain::share_user::{ShareUser, ShareUserId, ShareUserStatus};

/// Storage backend selected at controller startup.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    Sqlite(SqliteConfig),
}

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub path: std::path::PathBuf,
}

#[async_trait]
pub trait HostRepository: Send + Sync {
    async fn find_by_id(&self, id: &HostId) -> Result<Option<ManagedHost>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<ManagedHost>, RepositoryError>;

    /// Insert a new host. Fails if the id already exists.
    async fn create(&self, host: &ManagedHost) -> Result<ManagedHost, RepositoryError>;
}

#[async_trait]
pub trait MountPointRepository: Send + Sync {
    /// All specs, in declaration order.
    async fn list_all(&self) -> Result<Vec<MountPointSpec>, RepositoryError>;

    async fn find_by_host(&self, host: &HostId) -> Result<Vec<MountPointSpec>, RepositoryError>;

    /// Create or replace the spec identified by `(uuid, host)`.
    async fn save(&self, spec: &MountPointSpec) -> Result<(), RepositoryError>;

    async fn delete(&self, uuid: &str, host: &HostId) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ShareUserRepository: Send + Sync {
    /// All users, ordered by id.
    async fn list_all(&self) -> Result<Vec<ShareUser>, RepositoryError>;

    async fn find_by_id(&self, id: ShareUserId) -> Result<Option<ShareUser>, RepositoryError>;

    /// Assigns the id. Usernames are globally unique.
    async fn create(&self, user: &ShareUser) -> Result<ShareUser, RepositoryError>;

    /// Move `ids` to `to`, touching only rows whose current status is in `from`.
    async fn update_status(
        &self,
        ids: &[ShareUserId],
        from: &[ShareUserStatus],
        to: ShareUserStatus,
    ) -> Result<u64, RepositoryError>;

    /// Management-side password change; moves the user to `changing_pwd`.
    async fn set_password(&self, id: ShareUserId, password: &str) -> Result<u64, RepositoryError>;

    /// Delete `id` only while it is still in `status`.
    async fn delete(&self, id: ShareUserId, status: ShareUserStatus) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ShareRepository: Send + Sync {
    /// Shares of one host, ordered by id.
    async fn find_by_host(&self, host: &HostId) -> Result<Vec<Share>, RepositoryError>;

    async fn find_by_id(&self, id: ShareId) -> Result<Option<Share>, RepositoryError>;

    /// Assigns the id. Name and `(host, pseudo)` are unique.
    async fn create(&self, share: &Share) -> Result<Share, RepositoryError>;

    async fn update_status(
        &self,
        ids: &[ShareId],
        from: &[ShareStatus],
        to: ShareStatus,
    ) -> Result<u64, RepositoryError>;

    /// Delete the given ids, limited to rows still in `status`.
    async fn delete_in_status(&self, ids: &[ShareId], status: ShareStatus) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ExportRepository: Send + Sync {
    /// Enabled exports across all hosts, ordered by id.
    async fn find_enabled(&self) -> Result<Vec<Export>, RepositoryError>;

    async fn find_by_id(&self, id: ExportId) -> Result<Option<Export>, RepositoryError>;

    /// Assigns the id. `(host, pseudo)` is unique.
    async fn create(&self, export: &Export) -> Result<Export, RepositoryError>;

    async fn update_last_applied(&self, id: ExportId, at: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
