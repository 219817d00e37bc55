// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Scheduler Lock
//!
//! Cluster-wide mutual exclusion for scheduler cycles using a
//! transaction-scoped advisory lock (`pg_try_advisory_xact_lock`).
//!
//! Acquisition opens a transaction and tries the lock without waiting. The
//! transaction stays open for the whole cycle and the lock is released when it
//! ends, whether by `release` (commit), by drop (rollback) or by the session
//! dying. A replica that crashes mid-cycle therefore never leaves the lock held.
//!
//! The open transaction occupies one pool connection for the cycle, so the
//! pool needs at least `MIN_SCHEDULER_CONNECTIONS` to let the cycle's own
//! queries through. `MonitorServiceConfig::validate` enforces that.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;
use tracing::debug;

use crate::domain::repository::{HeldLock, RepositoryError, SchedulerLock};

pub struct PostgresSchedulerLock {
    pool: PgPool,
    key: i64,
}

impl PostgresSchedulerLock {
    pub fn new(pool: PgPool, key: i64) -> Self {
        Self { pool, key }
    }
}

struct AdvisoryLockGuard {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl HeldLock for AdvisoryLockGuard {
    async fn release(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl SchedulerLock for PostgresSchedulerLock {
    async fn try_acquire(&self) -> Result<Option<Box<dyn HeldLock>>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
            .bind(self.key)
            .fetch_one(&mut *tx)
            .await?;

        if !acquired {
            debug!(lock_key = self.key, "Scheduler lock held by another instance");
            tx.rollback().await?;
            return Ok(None);
        }

        Ok(Some(Box::new(AdvisoryLockGuard { tx })))
    }
}
