// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! SQLite Share
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `ShareRepository` over SQLite

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::domain::host::HostId;
use crate::domain::lifecycle::Lifecycle;
use crate::domain::repository::{RepositoryError, ShareRepository};
use crate::domain::share::{Share, ShareId, ShareStatus, UserPermission};
use crate::infrastructure::db::push_in_list;

pub struct SqliteShareRepository {
    pool: SqlitePool,
}

impl SqliteShareRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShareRepository for SqliteShareRepository {
    async fn find_by_host(&self, host: &HostId) -> Result<Vec<Share>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, host_id, name, path, pseudo, permissions, status
            FROM shares
            WHERE host_id = ?
            ORDER BY id
            "#,
        )
        .bind(host.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_share_row).collect()
    }

    async fn find_by_id(&self, id: ShareId) -> Result<Option<Share>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, host_id, name, path, pseudo, permissions, status
            FROM shares
            WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(parse_share_row).transpose()
    }

    async fn create(&self, share: &Share) -> Result<Share, RepositoryError> {
        let permissions = serde_json::to_string(&share.permissions)?;
        let result = sqlx::query(
            r#"
            INSERT INTO shares (host_id, name, path, pseudo, permissions, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(share.host_id.as_str())
        .bind(&share.name)
        .bind(&share.path)
        .bind(&share.pseudo)
        .bind(permissions)
        .bind(share.status.as_str())
        .execute(&self.pool)
        .await?;

        let mut created = share.clone();
        created.id = ShareId(result.last_insert_rowid());
        Ok(created)
    }

    async fn update_status(
        &self,
        ids: &[ShareId],
        from: &[ShareStatus],
        to: ShareStatus,
    ) -> Result<u64, RepositoryError> {
        if ids.is_empty() || from.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE shares SET status = ");
        qb.push_bind(to.as_str().to_string());
        qb.push(" WHERE ");
        push_in_list(&mut qb, "id", &ids);
        qb.push(" AND ");
        push_in_list(&mut qb, "status", &from);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_in_status(&self, ids: &[ShareId], status: ShareStatus) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM shares WHERE ");
        push_in_list(&mut qb, "id", &ids);
        qb.push(" AND status = ");
        qb.push_bind(status.as_str().to_string());

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn parse_share_row(row: SqliteRow) -> Result<Share, RepositoryError> {
    let permissions: String = row.try_get("permissions")?;
    let permissions: Vec<UserPermission> = serde_json::from_str(&permissions)?;
    let status: String = row.try_get("status")?;

    Ok(Share {
        id: ShareId(row.try_get("id")?),
        host_id: HostId(row.try_get("host_id")?),
        name: row.try_get("name")?,
        path: row.try_get("path")?,
        pseudo: row.try_get("pseudo")?,
        permissions,
        status: status.parse().map_err(RepositoryError::Serialization)?,
    })
}
