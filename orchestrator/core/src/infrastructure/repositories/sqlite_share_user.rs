// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! SQLite Share User
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `ShareUserRepository` over SQLite

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::domain::host::HostId;
use crate::domain::lifecycle::Lifecycle;
use crate::domain::repository::{RepositoryError, ShareUserRepository};
use crate::domain::share_user::{ShareUser, ShareUserId, ShareUserStatus};
use crate::infrastructure::db::push_in_list;

pub struct SqliteShareUserRepository {
    pool: SqlitePool,
}

impl SqliteShareUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShareUserRepository for SqliteShareUserRepository {
    async fn list_all(&self) -> Result<Vec<ShareUser>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, host_id, username, password, status FROM share_users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_share_user_row).collect()
    }

    async fn find_by_id(&self, id: ShareUserId) -> Result<Option<ShareUser>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, host_id, username, password, status FROM share_users WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(parse_share_user_row).transpose()
    }

    async fn create(&self, user: &ShareUser) -> Result<ShareUser, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO share_users (host_id, username, password, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user.host_id.as_str())
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.status.as_str())
        .execute(&self.pool)
        .await?;

        let mut created = user.clone();
        created.id = ShareUserId(result.last_insert_rowid());
        Ok(created)
    }

    async fn update_status(
        &self,
        ids: &[ShareUserId],
        from: &[ShareUserStatus],
        to: ShareUserStatus,
    ) -> Result<u64, RepositoryError> {
        if ids.is_empty() || from.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE share_users SET status = ");
        qb.push_bind(to.as_str().to_string());
        qb.push(" WHERE ");
        push_in_list(&mut qb, "id", &ids);
        qb.push(" AND ");
        push_in_list(&mut qb, "status", &from);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn set_password(&self, id: ShareUserId, password: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE share_users SET password = ?, status = ?
            WHERE id = ? AND status != ?
            "#,
        )
        .bind(password)
        .bind(ShareUserStatus::ChangingPassword.as_str())
        .bind(id.0)
        .bind(ShareUserStatus::Deleting.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: ShareUserId, status: ShareUserStatus) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM share_users WHERE id = ? AND status = ?")
            .bind(id.0)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn parse_share_user_row(row: SqliteRow) -> Result<ShareUser, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(ShareUser {
        id: ShareUserId(row.try_get("id")?),
        host_id: HostId(row.try_get("host_id")?),
        username: row.try_get("username")?,
        password: row.try_get("password")?,
        status: status.parse().map_err(RepositoryError::Serialization)?,
    })
}
