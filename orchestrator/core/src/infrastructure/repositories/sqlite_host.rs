// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! SQLite Host
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `HostRepository` over SQLite

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::domain::host::{HostId, ManagedHost};
use crate::domain::repository::{HostRepository, RepositoryError};

pub struct SqliteHostRepository {
    pool: SqlitePool,
}

impl SqliteHostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HostRepository for SqliteHostRepository {
    async fn find_by_id(&self, id: &HostId) -> Result<Option<ManagedHost>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, address, hostname, os, os_version, arch, kernel, ssh_port
            FROM hosts
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(parse_host_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<ManagedHost>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, address, hostname, os, os_version, arch, kernel, ssh_port
            FROM hosts
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_host_row).collect()
    }

    async fn create(&self, host: &ManagedHost) -> Result<ManagedHost, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO hosts (id, address, hostname, os, os_version, arch, kernel, ssh_port)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(host.id.as_str())
        .bind(&host.address)
        .bind(&host.hostname)
        .bind(&host.os)
        .bind(&host.os_version)
        .bind(&host.arch)
        .bind(&host.kernel)
        .bind(host.ssh_port.map(i64::from))
        .execute(&self.pool)
        .await?;

        Ok(host.clone())
    }
}

fn parse_host_row(row: SqliteRow) -> Result<ManagedHost, RepositoryError> {
    let port: Option<i64> = row.try_get("ssh_port")?;
    let ssh_port = port
        .map(u16::try_from)
        .transpose()
        .map_err(|e| RepositoryError::Serialization(format!("invalid ssh_port: {}", e)))?;

    Ok(ManagedHost {
        id: HostId(row.try_get("id")?),
        address: row.try_get("address")?,
        hostname: row.try_get("hostname")?,
        os: row.try_get("os")?,
        os_version: row.try_get("os_version")?,
        arch: row.try_get("arch")?,
        kernel: row.try_get("kernel")?,
        ssh_port,
    })
}
