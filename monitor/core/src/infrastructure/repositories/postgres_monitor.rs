// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Monitor Repository
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist monitor definitions and their schedule state
//! - **Integration:** Domain MonitorRepository → PostgreSQL `monitors` table
//!
//! # Schema
//!
//! - Identity and targeting columns (name unique per `org_name`)
//! - Evaluators as JSONB (`[{identifier, displayName, config}]`)
//! - `interval_minutes` / `next_run_time` for future monitors,
//!   `trace_start` / `trace_end` for past monitors
//!
//! Deleting a row cascades to `monitor_runs` through the foreign key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::monitor::{Evaluator, Monitor, MonitorId, MonitorType};
use crate::domain::repository::{MonitorFilter, MonitorRepository, RepositoryError};

const MONITOR_COLUMNS: &str = r#"
    id, name, display_name, monitor_type, org_name, project_name,
    agent_name, agent_id, environment_name, environment_id,
    evaluators, sampling_rate, interval_minutes, next_run_time,
    trace_start, trace_end, created_at, updated_at
"#;

pub struct PostgresMonitorRepository {
    pool: PgPool,
}

impl PostgresMonitorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn monitor_from_row(row: &PgRow) -> Result<Monitor, RepositoryError> {
    let monitor_type_str: String = row.get("monitor_type");
    let monitor_type = MonitorType::parse(&monitor_type_str).ok_or_else(|| {
        RepositoryError::Serialization(format!("unknown monitor type '{}'", monitor_type_str))
    })?;
    let evaluators_json: serde_json::Value = row.get("evaluators");
    let evaluators: Vec<Evaluator> = serde_json::from_value(evaluators_json)?;

    Ok(Monitor {
        id: MonitorId(row.get("id")),
        name: row.get("name"),
        display_name: row.get("display_name"),
        monitor_type,
        org_name: row.get("org_name"),
        project_name: row.get("project_name"),
        agent_name: row.get("agent_name"),
        agent_id: row.get("agent_id"),
        environment_name: row.get("environment_name"),
        environment_id: row.get("environment_id"),
        evaluators,
        sampling_rate: row.get("sampling_rate"),
        interval_minutes: row.get("interval_minutes"),
        next_run_time: row.get("next_run_time"),
        trace_start: row.get("trace_start"),
        trace_end: row.get("trace_end"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl MonitorRepository for PostgresMonitorRepository {
    async fn create(&self, monitor: &Monitor) -> Result<(), RepositoryError> {
        let evaluators_json = serde_json::to_value(&monitor.evaluators)?;

        sqlx::query(
            r#"
            INSERT INTO monitors (
                id, name, display_name, monitor_type, org_name, project_name,
                agent_name, agent_id, environment_name, environment_id,
                evaluators, sampling_rate, interval_minutes, next_run_time,
                trace_start, trace_end, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(monitor.id.0)
        .bind(&monitor.name)
        .bind(&monitor.display_name)
        .bind(monitor.monitor_type.as_str())
        .bind(&monitor.org_name)
        .bind(&monitor.project_name)
        .bind(&monitor.agent_name)
        .bind(&monitor.agent_id)
        .bind(&monitor.environment_name)
        .bind(&monitor.environment_id)
        .bind(evaluators_json)
        .bind(monitor.sampling_rate)
        .bind(monitor.interval_minutes)
        .bind(monitor.next_run_time)
        .bind(monitor.trace_start)
        .bind(monitor.trace_end)
        .bind(monitor.created_at)
        .bind(monitor.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_definition(&self, monitor: &Monitor) -> Result<(), RepositoryError> {
        let evaluators_json = serde_json::to_value(&monitor.evaluators)?;

        let result = sqlx::query(
            r#"
            UPDATE monitors SET
                display_name = $2,
                evaluators = $3,
                sampling_rate = $4,
                interval_minutes = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(monitor.id.0)
        .bind(&monitor.display_name)
        .bind(evaluators_json)
        .bind(monitor.sampling_rate)
        .bind(monitor.interval_minutes)
        .bind(monitor.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("monitor {}", monitor.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: MonitorId) -> Result<Option<Monitor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM monitors WHERE id = $1", MONITOR_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(monitor_from_row).transpose()
    }

    async fn find_by_name(&self, org_name: &str, name: &str) -> Result<Option<Monitor>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM monitors WHERE org_name = $1 AND name = $2",
            MONITOR_COLUMNS
        ))
        .bind(org_name)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(monitor_from_row).transpose()
    }

    async fn list(&self, org_name: &str, filter: &MonitorFilter) -> Result<Vec<Monitor>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM monitors
            WHERE org_name = $1
              AND ($2::TEXT IS NULL OR project_name = $2)
              AND ($3::TEXT IS NULL OR agent_name = $3)
            ORDER BY created_at DESC
            "#,
            MONITOR_COLUMNS
        ))
        .bind(org_name)
        .bind(filter.project_name.as_deref())
        .bind(filter.agent_name.as_deref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(monitor_from_row).collect()
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Monitor>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM monitors
            WHERE monitor_type = 'future'
              AND next_run_time IS NOT NULL
              AND next_run_time <= $1
            ORDER BY next_run_time ASC
            "#,
            MONITOR_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(monitor_from_row).collect()
    }

    async fn advance_next_run_time(
        &self,
        id: MonitorId,
        next_run_time: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE monitors SET next_run_time = $2, updated_at = NOW()
            WHERE id = $1 AND next_run_time IS NOT NULL
            "#,
        )
        .bind(id.0)
        .bind(next_run_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn suspend_schedule(&self, id: MonitorId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE monitors SET next_run_time = NULL, updated_at = NOW()
            WHERE id = $1 AND monitor_type = 'future' AND next_run_time IS NOT NULL
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn resume_schedule(
        &self,
        id: MonitorId,
        next_run_time: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE monitors SET next_run_time = $2, updated_at = NOW()
            WHERE id = $1 AND monitor_type = 'future' AND next_run_time IS NULL
            "#,
        )
        .bind(id.0)
        .bind(next_run_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: MonitorId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM monitors WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
