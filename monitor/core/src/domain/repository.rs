// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the monitor aggregate, following the DDD
//! Repository pattern: interfaces live in the domain layer and are implemented
//! in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `MonitorRepository` | `Monitor` | `InMemoryMonitorStore`, `PostgresMonitorRepository` |
//! | `MonitorRunRepository` | `MonitorRun` | `InMemoryMonitorStore`, `PostgresMonitorRunRepository` |
//! | `SchedulerLock` | n/a | `InMemorySchedulerLock`, `PostgresSchedulerLock` |
//!
//! ## Schedule ownership
//!
//! `next_run_time` is never part of a full-row write. It changes only through
//! the conditional schedule operations, so a definition edit racing a
//! scheduler cycle cannot restore a stale due time, and a stop racing a
//! trigger cannot be undone by the trigger's advance.
//!
//! ## Backends
//!
//! The PostgreSQL implementations are used in production; the in-memory store
//! backs tests and local development. Both honour the cascade from a monitor to
//! its runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::monitor::{Monitor, MonitorId};
use crate::domain::monitor_run::{InFlightRun, MonitorRun, MonitorRunId, RunStatus};

/// Optional narrowing of a monitor listing within one organization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorFilter {
    pub project_name: Option<String>,
    pub agent_name: Option<String>,
}

impl MonitorFilter {
    pub fn matches(&self, monitor: &Monitor) -> bool {
        self.project_name
            .as_ref()
            .is_none_or(|project| &monitor.project_name == project)
            && self
                .agent_name
                .as_ref()
                .is_none_or(|agent| &monitor.agent_name == agent)
    }
}

/// Repository interface for Monitor aggregates
#[async_trait]
pub trait MonitorRepository: Send + Sync {
    /// Insert a new monitor. Fails with `Conflict` if the name is taken in the org.
    async fn create(&self, monitor: &Monitor) -> Result<(), RepositoryError>;

    /// Overwrite the user-editable fields of an existing monitor (display
    /// name, evaluators, sampling rate, interval). `next_run_time` is left as
    /// stored.
    async fn update_definition(&self, monitor: &Monitor) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: MonitorId) -> Result<Option<Monitor>, RepositoryError>;

    async fn find_by_name(&self, org_name: &str, name: &str) -> Result<Option<Monitor>, RepositoryError>;

    /// List monitors of an organization, newest first
    async fn list(&self, org_name: &str, filter: &MonitorFilter) -> Result<Vec<Monitor>, RepositoryError>;

    /// Future monitors whose `next_run_time` is at or before `now`
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Monitor>, RepositoryError>;

    /// Move the schedule of a still-active monitor forward.
    ///
    /// Returns `false` without writing when the monitor is stopped or gone.
    async fn advance_next_run_time(
        &self,
        id: MonitorId,
        next_run_time: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Clear `next_run_time`. Returns `false` if it was already cleared or the
    /// monitor is gone.
    async fn suspend_schedule(&self, id: MonitorId) -> Result<bool, RepositoryError>;

    /// Set `next_run_time` on a stopped monitor. Returns `false` if the
    /// monitor is already active or gone.
    async fn resume_schedule(
        &self,
        id: MonitorId,
        next_run_time: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Delete a monitor and, by cascade, all of its runs
    async fn delete(&self, id: MonitorId) -> Result<(), RepositoryError>;
}

/// Repository interface for MonitorRun entities
#[async_trait]
pub trait MonitorRunRepository: Send + Sync {
    async fn create(&self, run: &MonitorRun) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: MonitorRunId) -> Result<Option<MonitorRun>, RepositoryError>;

    /// Most recently created run of a monitor
    async fn find_latest(&self, monitor_id: MonitorId) -> Result<Option<MonitorRun>, RepositoryError>;

    /// Runs of a monitor, newest first
    async fn list_by_monitor(
        &self,
        monitor_id: MonitorId,
        limit: Option<usize>,
    ) -> Result<Vec<MonitorRun>, RepositoryError>;

    /// Runs still Pending or Running, oldest first
    async fn find_in_flight(&self) -> Result<Vec<InFlightRun>, RepositoryError>;

    async fn update_status(
        &self,
        id: MonitorRunId,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError>;
}

/// Cluster-wide mutual exclusion for the scheduler cycle.
///
/// Acquisition never blocks: `Ok(None)` means another instance holds the lock
/// and the caller should skip its cycle.
#[async_trait]
pub trait SchedulerLock: Send + Sync {
    async fn try_acquire(&self) -> Result<Option<Box<dyn HeldLock>>, RepositoryError>;
}

/// A lock held for the duration of one scheduler cycle.
///
/// Dropping the guard without calling `release` also frees the lock.
#[async_trait]
pub trait HeldLock: Send {
    async fn release(self: Box<Self>) -> Result<(), RepositoryError>;
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

/// PostgreSQL `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                RepositoryError::Conflict(db_err.message().to_string())
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
