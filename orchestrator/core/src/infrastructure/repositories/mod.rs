// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve desired-state records
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## SQLite Repositories
//!
//! Backed by a single SQLite file through `sqlx`:
//! - **SqliteHostRepository**
//! - **SqliteMountPointRepository**
//! - **SqliteShareUserRepository**
//! - **SqliteShareRepository**
//! - **SqliteExportRepository**
//!
//! ## In-Memory Repositories
//!
//! Lock-guarded maps for tests and development. Conditional updates and
//! deletes honour the same status filters as the SQL implementations.

pub mod sqlite_export;
pub mod sqlite_host;
pub mod sqlite_mount_point;
pub mod sqlite_share;
pub mod sqlite_share_user;

pub use sqlite_export::SqliteExportRepository;
pub use sqlite_host::SqliteHostRepository;
pub use sqlite_mount_point::SqliteMountPointRepository;
pub use sqlite_share::SqliteShareRepository;
pub use sqlite_share_user::SqliteShareUserRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::export::{Export, ExportId};
use crate::domain::host::{HostId, ManagedHost};
use crate::domain::mount_point::MountPointSpec;
use crate::domain::repository::{
    ExportRepository, HostRepository, MountPointRepository, RepositoryError, ShareRepository,
    ShareUserRepository,
};
use crate::domain::share::{Share, ShareId, ShareStatus};
use crate::domain::share_user::{ShareUser, ShareUserId, ShareUserStatus};

/// Rows keyed by id plus the next id to hand out.
struct Table<K, V> {
    rows: BTreeMap<K, V>,
    next_id: i64,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<K, V> Table<K, V> {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Clone, Default)]
pub struct InMemoryHostRepository {
    hosts: Arc<RwLock<BTreeMap<HostId, ManagedHost>>>,
}

impl InMemoryHostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HostRepository for InMemoryHostRepository {
    async fn find_by_id(&self, id: &HostId) -> Result<Option<ManagedHost>, RepositoryError> {
        Ok(self.hosts.read().get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ManagedHost>, RepositoryError> {
        Ok(self.hosts.read().values().cloned().collect())
    }

    async fn create(&self, host: &ManagedHost) -> Result<ManagedHost, RepositoryError> {
        let mut hosts = self.hosts.write();
        if hosts.contains_key(&host.id) {
            return Err(RepositoryError::Conflict(format!("host {} already exists", host.id)));
        }
        hosts.insert(host.id.clone(), host.clone());
        Ok(host.clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryMountPointRepository {
    specs: Arc<RwLock<Vec<MountPointSpec>>>,
}

impl InMemoryMountPointRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MountPointRepository for InMemoryMountPointRepository {
    async fn list_all(&self) -> Result<Vec<MountPointSpec>, RepositoryError> {
        Ok(self.specs.read().clone())
    }

    async fn find_by_host(&self, host: &HostId) -> Result<Vec<MountPointSpec>, RepositoryError> {
        Ok(self
            .specs
            .read()
            .iter()
            .filter(|s| &s.host_id == host)
            .cloned()
            .collect())
    }

    async fn save(&self, spec: &MountPointSpec) -> Result<(), RepositoryError> {
        let mut specs = self.specs.write();
        match specs
            .iter_mut()
            .find(|s| s.uuid == spec.uuid && s.host_id == spec.host_id)
        {
            Some(existing) => *existing = spec.clone(),
            None => specs.push(spec.clone()),
        }
        Ok(())
    }

    async fn delete(&self, uuid: &str, host: &HostId) -> Result<u64, RepositoryError> {
        let mut specs = self.specs.write();
        let before = specs.len();
        specs.retain(|s| !(s.uuid == uuid && &s.host_id == host));
        Ok((before - specs.len()) as u64)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryShareUserRepository {
    users: Arc<RwLock<Table<ShareUserId, ShareUser>>>,
}

impl InMemoryShareUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShareUserRepository for InMemoryShareUserRepository {
    async fn list_all(&self) -> Result<Vec<ShareUser>, RepositoryError> {
        Ok(self.users.read().rows.values().cloned().collect())
    }

    async fn find_by_id(&self, id: ShareUserId) -> Result<Option<ShareUser>, RepositoryError> {
        Ok(self.users.read().rows.get(&id).cloned())
    }

    async fn create(&self, user: &ShareUser) -> Result<ShareUser, RepositoryError> {
        let mut users = self.users.write();
        if users.rows.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict(format!(
                "share user '{}' already exists",
                user.username
            )));
        }
        let mut created = user.clone();
        created.id = ShareUserId(users.allocate());
        users.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_status(
        &self,
        ids: &[ShareUserId],
        from: &[ShareUserStatus],
        to: ShareUserStatus,
    ) -> Result<u64, RepositoryError> {
        let mut users = self.users.write();
        let mut affected = 0;
        for id in ids {
            if let Some(user) = users.rows.get_mut(id) {
                if from.contains(&user.status) {
                    user.status = to;
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn set_password(&self, id: ShareUserId, password: &str) -> Result<u64, RepositoryError> {
        let mut users = self.users.write();
        match users.rows.get_mut(&id) {
            Some(user) if user.status != ShareUserStatus::Deleting => {
                user.password = password.to_string();
                user.status = ShareUserStatus::ChangingPassword;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete(&self, id: ShareUserId, status: ShareUserStatus) -> Result<u64, RepositoryError> {
        let mut users = self.users.write();
        match users.rows.get(&id) {
            Some(user) if user.status == status => {
                users.rows.remove(&id);
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryShareRepository {
    shares: Arc<RwLock<Table<ShareId, Share>>>,
}

impl InMemoryShareRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShareRepository for InMemoryShareRepository {
    async fn find_by_host(&self, host: &HostId) -> Result<Vec<Share>, RepositoryError> {
        Ok(self
            .shares
            .read()
            .rows
            .values()
            .filter(|s| &s.host_id == host)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ShareId) -> Result<Option<Share>, RepositoryError> {
        Ok(self.shares.read().rows.get(&id).cloned())
    }

    async fn create(&self, share: &Share) -> Result<Share, RepositoryError> {
        let mut shares = self.shares.write();
        if shares.rows.values().any(|s| s.name == share.name) {
            return Err(RepositoryError::Conflict(format!("share name '{}' already exists", share.name)));
        }
        if shares
            .rows
            .values()
            .any(|s| s.host_id == share.host_id && s.pseudo == share.pseudo)
        {
            return Err(RepositoryError::Conflict(format!(
                "share pseudo path '{}' already exists on {}",
                share.pseudo, share.host_id
            )));
        }
        let mut created = share.clone();
        created.id = ShareId(shares.allocate());
        shares.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_status(
        &self,
        ids: &[ShareId],
        from: &[ShareStatus],
        to: ShareStatus,
    ) -> Result<u64, RepositoryError> {
        let mut shares = self.shares.write();
        let mut affected = 0;
        for id in ids {
            if let Some(share) = shares.rows.get_mut(id) {
                if from.contains(&share.status) {
                    share.status = to;
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn delete_in_status(&self, ids: &[ShareId], status: ShareStatus) -> Result<u64, RepositoryError> {
        let mut shares = self.shares.write();
        let mut affected = 0;
        for id in ids {
            if shares.rows.get(id).map(|s| s.status) == Some(status) {
                shares.rows.remove(id);
                affected += 1;
            }
        }
        Ok(affected)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryExportRepository {
    exports: Arc<RwLock<Table<ExportId, Export>>>,
}

impl InMemoryExportRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExportRepository for InMemoryExportRepository {
    async fn find_enabled(&self) -> Result<Vec<Export>, RepositoryError> {
        Ok(self
            .exports
            .read()
            .rows
            .values()
            .filter(|e| e.is_enabled())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ExportId) -> Result<Option<Export>, RepositoryError> {
        Ok(self.exports.read().rows.get(&id).cloned())
    }

    async fn create(&self, export: &Export) -> Result<Export, RepositoryError> {
        let mut exports = self.exports.write();
        if exports
            .rows
            .values()
            .any(|e| e.host_id == export.host_id && e.pseudo == export.pseudo)
        {
            return Err(RepositoryError::Conflict(format!(
                "export pseudo path '{}' already exists on {}",
                export.pseudo, export.host_id
            )));
        }
        let mut created = export.clone();
        created.id = ExportId(exports.allocate());
        exports.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_last_applied(&self, id: ExportId, at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut exports = self.exports.write();
        match exports.rows.get_mut(&id) {
            Some(export) => {
                export.last_applied = Some(at);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
