// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! SQLite Export
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `ExportRepository` over SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::domain::export::{ConfigTestResult, Export, ExportId, ExportStatus, NfsAcl};
use crate::domain::host::HostId;
use crate::domain::repository::{ExportRepository, RepositoryError};

pub struct SqliteExportRepository {
    pool: SqlitePool,
}

impl SqliteExportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const EXPORT_COLUMNS: &str =
    "id, host_id, name, path, pseudo, default_access, acls, status, last_applied, last_test_result";

#[async_trait]
impl ExportRepository for SqliteExportRepository {
    async fn find_enabled(&self) -> Result<Vec<Export>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM exports WHERE status = ? ORDER BY id",
            EXPORT_COLUMNS
        ))
        .bind(ExportStatus::Enabled.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parse_export_row).collect()
    }

    async fn find_by_id(&self, id: ExportId) -> Result<Option<Export>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM exports WHERE id = ?", EXPORT_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(parse_export_row).transpose()
    }

    async fn create(&self, export: &Export) -> Result<Export, RepositoryError> {
        let acls = serde_json::to_string(&export.acls)?;
        let test_result = export
            .last_test_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO exports (
                host_id, name, path, pseudo, default_access, acls,
                status, last_applied, last_test_result
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(export.host_id.as_str())
        .bind(&export.name)
        .bind(&export.path)
        .bind(&export.pseudo)
        .bind(export.default_access.as_str())
        .bind(acls)
        .bind(export.status.as_str())
        .bind(export.last_applied)
        .bind(test_result)
        .execute(&self.pool)
        .await?;

        let mut created = export.clone();
        created.id = ExportId(result.last_insert_rowid());
        Ok(created)
    }

    async fn update_last_applied(&self, id: ExportId, at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE exports SET last_applied = ? WHERE id = ?")
            .bind(at)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn parse_export_row(row: SqliteRow) -> Result<Export, RepositoryError> {
    let acls: String = row.try_get("acls")?;
    let acls: Vec<NfsAcl> = serde_json::from_str(&acls)?;
    let default_access: String = row.try_get("default_access")?;
    let status: String = row.try_get("status")?;
    let last_test_result: Option<String> = row.try_get("last_test_result")?;
    let last_test_result = last_test_result
        .map(|s| serde_json::from_str::<ConfigTestResult>(&s))
        .transpose()?;

    Ok(Export {
        id: ExportId(row.try_get("id")?),
        host_id: HostId(row.try_get("host_id")?),
        name: row.try_get("name")?,
        path: row.try_get("path")?,
        pseudo: row.try_get("pseudo")?,
        default_access: default_access.parse().map_err(RepositoryError::Serialization)?,
        acls,
        status: status.parse().map_err(RepositoryError::Serialization)?,
        last_applied: row.try_get("last_applied")?,
        last_test_result,
    })
}
