// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! SQLite Mount Point
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `MountPointRepository` over SQLite

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::domain::host::HostId;
use crate::domain::mount_point::MountPointSpec;
use crate::domain::repository::{MountPointRepository, RepositoryError};

pub struct SqliteMountPointRepository {
    pool: SqlitePool,
}

impl SqliteMountPointRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MountPointRepository for SqliteMountPointRepository {
    async fn list_all(&self) -> Result<Vec<MountPointSpec>, RepositoryError> {
        let rows = sqlx::query("SELECT uuid, host_id, device, path FROM mount_points ORDER BY seq")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(parse_mount_point_row).collect()
    }

    async fn find_by_host(&self, host: &HostId) -> Result<Vec<MountPointSpec>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT uuid, host_id, device, path FROM mount_points WHERE host_id = ? ORDER BY seq",
        )
        .bind(host.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_mount_point_row).collect()
    }

    async fn save(&self, spec: &MountPointSpec) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO mount_points (uuid, host_id, device, path)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (uuid, host_id) DO UPDATE SET
                device = excluded.device,
                path = excluded.path
            "#,
        )
        .bind(&spec.uuid)
        .bind(spec.host_id.as_str())
        .bind(&spec.device)
        .bind(&spec.path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, uuid: &str, host: &HostId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM mount_points WHERE uuid = ? AND host_id = ?")
            .bind(uuid)
            .bind(host.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn parse_mount_point_row(row: SqliteRow) -> Result<MountPointSpec, RepositoryError> {
    Ok(MountPointSpec {
        uuid: row.try_get("uuid")?,
        host_id: HostId(row.try_get("host_id")?),
        device: row.try_get("device")?,
        path: row.try_get("path")?,
    })
}
