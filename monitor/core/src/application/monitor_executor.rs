// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Monitor Executor
//!
//! Application service that turns a monitor plus a trace window into a
//! submitted workflow run and a persisted `MonitorRun`.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Submit evaluation jobs and record them
//! - **Collaborators:**
//!   - Domain: Monitor, MonitorRun
//!   - Infrastructure: WorkloadExecutor, MonitorRepository, MonitorRunRepository
//!
//! # Compensation
//!
//! The workflow run is submitted before the run row is written. If the write
//! fails, the submitted workflow run is deleted again (best effort) so that no
//! external job exists without a local record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::monitor::{Evaluator, Monitor, MonitorError, MonitorId};
use crate::domain::monitor_run::{MonitorRun, MonitorRunId};
use crate::domain::repository::{MonitorRepository, MonitorRunRepository};
use crate::domain::workload::{WorkflowRunSpec, WorkloadExecutor, WorkloadRef};

/// Upper bound for workflow run names (DNS label)
const MAX_JOB_NAME_LEN: usize = 63;
const JOB_NAME_SUFFIX_LEN: usize = 8;

#[async_trait]
pub trait MonitorExecutor: Send + Sync {
    /// Submit one evaluation run of `monitor` over `[start_time, end_time]`.
    ///
    /// # Errors
    ///
    /// - Validation: `evaluators` is empty
    /// - Workload: the workflow plane rejected or could not receive the job
    /// - Repository: the run could not be recorded (the job is deleted again)
    async fn execute_monitor_run(
        &self,
        org_name: &str,
        monitor: &Monitor,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        evaluators: &[Evaluator],
    ) -> Result<MonitorRun, MonitorError>;

    /// Advance the schedule after a successful run.
    ///
    /// Returns `false` when the monitor was stopped or deleted since it was
    /// picked up; the stored schedule is then left alone.
    async fn update_next_run_time(
        &self,
        monitor_id: MonitorId,
        next_run_time: DateTime<Utc>,
    ) -> Result<bool, MonitorError>;
}

/// Workflow run name for a monitor execution: `{monitor-name}-{8 hex of run id}`
pub fn generate_job_name(monitor_name: &str, run_id: MonitorRunId) -> String {
    let suffix = run_id.0.simple().to_string();
    let max_prefix = MAX_JOB_NAME_LEN - JOB_NAME_SUFFIX_LEN - 1;
    let prefix: String = monitor_name.chars().take(max_prefix).collect();
    format!(
        "{}-{}",
        prefix.trim_end_matches('-'),
        &suffix[..JOB_NAME_SUFFIX_LEN]
    )
}

/// Standard implementation of MonitorExecutor
pub struct StandardMonitorExecutor {
    workload: Arc<dyn WorkloadExecutor>,
    monitor_repository: Arc<dyn MonitorRepository>,
    run_repository: Arc<dyn MonitorRunRepository>,
    workflow_template: String,
}

impl StandardMonitorExecutor {
    pub fn new(
        workload: Arc<dyn WorkloadExecutor>,
        monitor_repository: Arc<dyn MonitorRepository>,
        run_repository: Arc<dyn MonitorRunRepository>,
        workflow_template: impl Into<String>,
    ) -> Self {
        Self {
            workload,
            monitor_repository,
            run_repository,
            workflow_template: workflow_template.into(),
        }
    }
}

#[async_trait]
impl MonitorExecutor for StandardMonitorExecutor {
    async fn execute_monitor_run(
        &self,
        org_name: &str,
        monitor: &Monitor,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        evaluators: &[Evaluator],
    ) -> Result<MonitorRun, MonitorError> {
        let run_id = MonitorRunId::new();
        let job_name = generate_job_name(&monitor.name, run_id);

        if evaluators.is_empty() {
            return Err(MonitorError::Validation(format!(
                "monitor '{}' has no evaluators to run",
                monitor.name
            )));
        }

        let spec = WorkflowRunSpec::for_monitor(
            &job_name,
            org_name,
            &self.workflow_template,
            monitor,
            run_id,
            start_time,
            end_time,
            evaluators,
        )
        .map_err(|e| MonitorError::Validation(format!("failed to encode evaluators: {}", e)))?;

        debug!(
            monitor = %monitor.name,
            job_name = %job_name,
            trace_start = %start_time,
            trace_end = %end_time,
            "Submitting monitor workflow run"
        );

        let workload_ref = self.workload.submit(&spec).await?;

        let run = MonitorRun::pending(
            run_id,
            monitor.id,
            job_name.clone(),
            start_time,
            end_time,
            evaluators.to_vec(),
        );

        if let Err(e) = self.run_repository.create(&run).await {
            error!(
                monitor = %monitor.name,
                job_name = %job_name,
                error = %e,
                "Failed to record monitor run, deleting submitted workflow run"
            );
            compensate(self.workload.as_ref(), &workload_ref).await;
            return Err(e.into());
        }

        metrics::counter!("monitor_runs_submitted_total").increment(1);
        info!(
            monitor = %monitor.name,
            run_id = %run.id,
            job_name = %job_name,
            "Monitor run submitted"
        );

        Ok(run)
    }

    async fn update_next_run_time(
        &self,
        monitor_id: MonitorId,
        next_run_time: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        let advanced = self
            .monitor_repository
            .advance_next_run_time(monitor_id, next_run_time)
            .await?;
        Ok(advanced)
    }
}

async fn compensate(workload: &dyn WorkloadExecutor, workload_ref: &WorkloadRef) {
    if let Err(e) = workload.delete(workload_ref).await {
        warn!(
            job_name = %workload_ref.name,
            namespace = %workload_ref.namespace,
            error = %e,
            "Failed to delete orphaned workflow run"
        );
    }
}
