// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # SQLite Connection Pool
//!
//! Wraps `sqlx::sqlite::SqlitePool` in a thin `Database` newtype that is
//! injected into all SQLite repository implementations. The schema is
//! bootstrapped on connect; list-valued columns hold JSON text.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::path::Path;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS hosts (
        id          TEXT PRIMARY KEY,
        address     TEXT NOT NULL,
        hostname    TEXT NOT NULL DEFAULT '',
        os          TEXT NOT NULL DEFAULT '',
        os_version  TEXT NOT NULL DEFAULT '',
        arch        TEXT NOT NULL DEFAULT '',
        kernel      TEXT NOT NULL DEFAULT '',
        ssh_port    INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mount_points (
        seq         INTEGER PRIMARY KEY AUTOINCREMENT,
        uuid        TEXT NOT NULL,
        host_id     TEXT NOT NULL,
        device      TEXT NOT NULL,
        path        TEXT NOT NULL DEFAULT '',
        UNIQUE (uuid, host_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS share_users (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        host_id     TEXT NOT NULL,
        username    TEXT NOT NULL UNIQUE,
        password    TEXT NOT NULL,
        status      TEXT NOT NULL DEFAULT 'init'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shares (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        host_id     TEXT NOT NULL,
        name        TEXT NOT NULL UNIQUE,
        path        TEXT NOT NULL,
        pseudo      TEXT NOT NULL,
        permissions TEXT NOT NULL DEFAULT '[]',
        status      TEXT NOT NULL DEFAULT 'init',
        UNIQUE (host_id, pseudo)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS exports (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        host_id          TEXT NOT NULL,
        name             TEXT NOT NULL,
        path             TEXT NOT NULL,
        pseudo           TEXT NOT NULL,
        default_access   TEXT NOT NULL DEFAULT 'None',
        acls             TEXT NOT NULL DEFAULT '[]',
        status           TEXT NOT NULL DEFAULT 'enabled',
        last_applied     TEXT,
        last_test_result TEXT,
        UNIQUE (host_id, pseudo)
    )
    "#,
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite file at `path` and bootstrap the schema.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {:?}", path))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to bootstrap database schema")?;
        }
        Ok(())
    }

    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Appends `column IN (?, ?, ...)` binding every value.
pub(crate) fn push_in_list<'args, T>(qb: &mut QueryBuilder<'args, Sqlite>, column: &str, values: &[T])
where
    T: 'args + Clone + sqlx::Encode<'args, Sqlite> + sqlx::Type<Sqlite>,
{
    qb.push(column);
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}
