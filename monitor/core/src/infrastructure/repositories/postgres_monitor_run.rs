// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Monitor Run Repository
//!
//! Run history for monitors, stored in `monitor_runs`. The evaluator list is
//! kept as a JSONB snapshot so reruns replay exactly what the original run
//! evaluated.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::monitor::{Evaluator, MonitorId};
use crate::domain::monitor_run::{InFlightRun, MonitorRun, MonitorRunId, RunStatus};
use crate::domain::repository::{MonitorRunRepository, RepositoryError};

const RUN_COLUMNS: &str = r#"
    r.id, r.monitor_id, r.job_name, r.trace_start, r.trace_end,
    r.evaluators, r.status, r.error_message, r.created_at, r.updated_at
"#;

pub struct PostgresMonitorRunRepository {
    pool: PgPool,
}

impl PostgresMonitorRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn run_from_row(row: &PgRow) -> Result<MonitorRun, RepositoryError> {
    let status_str: String = row.get("status");
    let status = RunStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Serialization(format!("unknown run status '{}'", status_str))
    })?;
    let evaluators_json: serde_json::Value = row.get("evaluators");
    let evaluators: Vec<Evaluator> = serde_json::from_value(evaluators_json)?;

    Ok(MonitorRun {
        id: MonitorRunId(row.get("id")),
        monitor_id: MonitorId(row.get("monitor_id")),
        job_name: row.get("job_name"),
        trace_start: row.get("trace_start"),
        trace_end: row.get("trace_end"),
        evaluators,
        status,
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl MonitorRunRepository for PostgresMonitorRunRepository {
    async fn create(&self, run: &MonitorRun) -> Result<(), RepositoryError> {
        let evaluators_json = serde_json::to_value(&run.evaluators)?;

        sqlx::query(
            r#"
            INSERT INTO monitor_runs (
                id, monitor_id, job_name, trace_start, trace_end,
                evaluators, status, error_message, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(run.id.0)
        .bind(run.monitor_id.0)
        .bind(&run.job_name)
        .bind(run.trace_start)
        .bind(run.trace_end)
        .bind(evaluators_json)
        .bind(run.status.as_str())
        .bind(run.error_message.as_deref())
        .bind(run.created_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: MonitorRunId) -> Result<Option<MonitorRun>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM monitor_runs r WHERE r.id = $1", RUN_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(run_from_row).transpose()
    }

    async fn find_latest(&self, monitor_id: MonitorId) -> Result<Option<MonitorRun>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM monitor_runs r WHERE r.monitor_id = $1 ORDER BY r.created_at DESC LIMIT 1",
            RUN_COLUMNS
        ))
        .bind(monitor_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(run_from_row).transpose()
    }

    async fn list_by_monitor(
        &self,
        monitor_id: MonitorId,
        limit: Option<usize>,
    ) -> Result<Vec<MonitorRun>, RepositoryError> {
        // LIMIT NULL means no limit
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let rows = sqlx::query(&format!(
            "SELECT {} FROM monitor_runs r WHERE r.monitor_id = $1 ORDER BY r.created_at DESC LIMIT $2",
            RUN_COLUMNS
        ))
        .bind(monitor_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_from_row).collect()
    }

    async fn find_in_flight(&self) -> Result<Vec<InFlightRun>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}, m.org_name
            FROM monitor_runs r
            JOIN monitors m ON m.id = r.monitor_id
            WHERE r.status IN ('pending', 'running')
            ORDER BY r.created_at ASC
            "#,
            RUN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(InFlightRun {
                    run: run_from_row(row)?,
                    org_name: row.get("org_name"),
                })
            })
            .collect()
    }

    async fn update_status(
        &self,
        id: MonitorRunId,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE monitor_runs SET status = $2, error_message = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.0)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("monitor run {}", id)));
        }
        Ok(())
    }
}
