// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is
//! injected into the PostgreSQL repositories and the scheduler lock, and owns
//! the embedded schema migrations.

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL `undefined_table`
const UNDEFINED_TABLE: &str = "42P01";

/// Applied vs. available migration counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: usize,
    pub available: usize,
    /// `(version, description)` of migrations not yet applied
    pub pending: Vec<(i64, String)>,
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        let applied = match sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM _sqlx_migrations WHERE success",
        )
        .fetch_one(&self.pool)
        .await
        {
            Ok(count) => usize::try_from(count).unwrap_or(0),
            // Table is absent until the first migration run
            Err(e) if is_undefined_table(&e) => 0,
            Err(e) => return Err(e).context("Failed to read applied migrations"),
        };

        let available = MIGRATOR.iter().count();
        let pending = MIGRATOR
            .iter()
            .skip(applied)
            .map(|m| (m.version, m.description.to_string()))
            .collect();

        Ok(MigrationStatus {
            applied,
            available,
            pending,
        })
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .context("Failed to apply migrations")?;
        Ok(())
    }
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNDEFINED_TABLE))
}
