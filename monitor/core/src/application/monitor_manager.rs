// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Monitor Manager
//!
//! Application service behind the monitor API: CRUD, stop/start lifecycle,
//! run history, reruns and run logs. All operations are scoped to an
//! organization and address monitors by name.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Validate and apply monitor commands, enrich reads
//! - **Collaborators:**
//!   - Domain: Monitor, MonitorRun, run status interpreter
//!   - Application: MonitorExecutor
//!   - Infrastructure: repositories, WorkloadExecutor, AgentDirectory, RunLogProvider
//!
//! # Read-time status
//!
//! Reads refresh a latest run that is still Pending or Running from the
//! workflow plane. The refreshed status is returned but never written back;
//! the scheduler's reconciliation owns persisted transitions.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::monitor_executor::MonitorExecutor;
use crate::domain::monitor::{
    validate_display_name, validate_evaluators, validate_interval, validate_name,
    validate_sampling_rate, validate_trace_window, Evaluator, Monitor, MonitorError, MonitorId,
    MonitorStatus, MonitorType, DEFAULT_INTERVAL_MINUTES, DEFAULT_SAMPLING_RATE,
};
use crate::domain::monitor_run::{MonitorRun, MonitorRunId, RunStatus};
use crate::domain::repository::{MonitorFilter, MonitorRepository, MonitorRunRepository, RepositoryError};
use crate::domain::run_status::{interpret_run_status, run_error_message};
use crate::domain::workload::{
    AgentDirectory, LogLine, RunLogProvider, WorkloadError, WorkloadExecutor, WorkloadRef,
    WORKFLOW_RUN_KIND,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMonitorRequest {
    pub name: String,
    pub display_name: String,
    pub monitor_type: MonitorType,
    pub project_name: String,
    pub agent_name: String,
    pub environment_name: String,
    pub evaluators: Vec<Evaluator>,
    #[serde(default)]
    pub sampling_rate: Option<f64>,
    /// Future monitors only; defaults to 60
    #[serde(default)]
    pub interval_minutes: Option<i32>,
    /// Past monitors only
    #[serde(default)]
    pub trace_start: Option<DateTime<Utc>>,
    /// Past monitors only
    #[serde(default)]
    pub trace_end: Option<DateTime<Utc>>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMonitorRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub evaluators: Option<Vec<Evaluator>>,
    #[serde(default)]
    pub sampling_rate: Option<f64>,
    #[serde(default)]
    pub interval_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorRunView {
    pub id: MonitorRunId,
    pub monitor_id: MonitorId,
    pub job_name: String,
    pub trace_start: DateTime<Utc>,
    pub trace_end: DateTime<Utc>,
    pub evaluators: Vec<Evaluator>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MonitorRun> for MonitorRunView {
    fn from(run: MonitorRun) -> Self {
        Self {
            id: run.id,
            monitor_id: run.monitor_id,
            job_name: run.job_name,
            trace_start: run.trace_start,
            trace_end: run.trace_end,
            evaluators: run.evaluators,
            status: run.status,
            error_message: run.error_message,
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorView {
    #[serde(flatten)]
    pub monitor: Monitor,
    pub status: MonitorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_run: Option<MonitorRunView>,
}

#[async_trait]
pub trait MonitorManager: Send + Sync {
    /// Create a monitor.
    ///
    /// Past monitors are executed immediately over their fixed window; if
    /// that submission fails the monitor is removed again and the error is
    /// returned. Future monitors become due right away.
    ///
    /// # Errors
    ///
    /// - Validation: malformed fields or type/field mismatch
    /// - AlreadyExists: name taken in the organization
    /// - Workload: agent/environment lookup or Past submission failed
    async fn create_monitor(
        &self,
        org_name: &str,
        request: CreateMonitorRequest,
    ) -> Result<MonitorView, MonitorError>;

    async fn get_monitor(&self, org_name: &str, name: &str) -> Result<MonitorView, MonitorError>;

    async fn list_monitors(
        &self,
        org_name: &str,
        filter: &MonitorFilter,
    ) -> Result<Vec<MonitorView>, MonitorError>;

    async fn update_monitor(
        &self,
        org_name: &str,
        name: &str,
        request: UpdateMonitorRequest,
    ) -> Result<MonitorView, MonitorError>;

    /// Delete a monitor with its runs. External workflow runs are cleaned up
    /// best effort.
    async fn delete_monitor(&self, org_name: &str, name: &str) -> Result<(), MonitorError>;

    async fn stop_monitor(&self, org_name: &str, name: &str) -> Result<MonitorView, MonitorError>;

    async fn start_monitor(&self, org_name: &str, name: &str) -> Result<MonitorView, MonitorError>;

    /// Run history, newest first
    async fn list_monitor_runs(
        &self,
        org_name: &str,
        name: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MonitorRunView>, MonitorError>;

    /// Execute again with the stored window and evaluator snapshot of `run_id`
    async fn rerun_monitor(
        &self,
        org_name: &str,
        name: &str,
        run_id: MonitorRunId,
    ) -> Result<MonitorRunView, MonitorError>;

    async fn get_run_logs(
        &self,
        org_name: &str,
        name: &str,
        run_id: MonitorRunId,
    ) -> Result<Vec<LogLine>, MonitorError>;
}

/// Standard implementation of MonitorManager
pub struct StandardMonitorManager {
    monitor_repository: Arc<dyn MonitorRepository>,
    run_repository: Arc<dyn MonitorRunRepository>,
    executor: Arc<dyn MonitorExecutor>,
    workload: Arc<dyn WorkloadExecutor>,
    agent_directory: Arc<dyn AgentDirectory>,
    log_provider: Arc<dyn RunLogProvider>,
}

impl StandardMonitorManager {
    pub fn new(
        monitor_repository: Arc<dyn MonitorRepository>,
        run_repository: Arc<dyn MonitorRunRepository>,
        executor: Arc<dyn MonitorExecutor>,
        workload: Arc<dyn WorkloadExecutor>,
        agent_directory: Arc<dyn AgentDirectory>,
        log_provider: Arc<dyn RunLogProvider>,
    ) -> Self {
        Self {
            monitor_repository,
            run_repository,
            executor,
            workload,
            agent_directory,
            log_provider,
        }
    }

    async fn load_monitor(&self, org_name: &str, name: &str) -> Result<Monitor, MonitorError> {
        self.monitor_repository
            .find_by_name(org_name, name)
            .await?
            .ok_or_else(|| MonitorError::MonitorNotFound(format!("{}/{}", org_name, name)))
    }

    async fn load_run(&self, monitor: &Monitor, run_id: MonitorRunId) -> Result<MonitorRun, MonitorError> {
        match self.run_repository.find_by_id(run_id).await? {
            Some(run) if run.monitor_id == monitor.id => Ok(run),
            _ => Err(MonitorError::RunNotFound(format!(
                "run {} of monitor '{}'",
                run_id, monitor.name
            ))),
        }
    }

    /// Overlay the live workflow status on a non-terminal run.
    async fn refresh_run(&self, org_name: &str, mut run: MonitorRun) -> MonitorRun {
        if run.status.is_terminal() {
            return run;
        }

        match self
            .workload
            .get_resource(org_name, WORKFLOW_RUN_KIND, &run.job_name)
            .await
        {
            Ok(resource) => {
                let status = interpret_run_status(&resource);
                run.apply_status(status, &run_error_message(&resource));
            }
            Err(e) => {
                debug!(
                    job_name = %run.job_name,
                    error = %e,
                    "Could not refresh run status, using stored value"
                );
            }
        }
        run
    }

    async fn to_view(&self, monitor: Monitor) -> Result<MonitorView, MonitorError> {
        let latest = match self.run_repository.find_latest(monitor.id).await? {
            Some(run) => Some(self.refresh_run(&monitor.org_name, run).await),
            None => None,
        };
        let status = monitor.status(latest.as_ref().map(|r| r.status));

        Ok(MonitorView {
            monitor,
            status,
            latest_run: latest.map(MonitorRunView::from),
        })
    }

    fn validate_create(request: &CreateMonitorRequest, now: DateTime<Utc>) -> Result<(), MonitorError> {
        validate_name(&request.name)?;
        validate_display_name(&request.display_name)?;
        validate_evaluators(&request.evaluators)?;
        if let Some(rate) = request.sampling_rate {
            validate_sampling_rate(rate)?;
        }

        match request.monitor_type {
            MonitorType::Future => {
                if request.trace_start.is_some() || request.trace_end.is_some() {
                    return Err(MonitorError::Validation(
                        "trace start/end times only apply to past monitors".to_string(),
                    ));
                }
                if let Some(interval) = request.interval_minutes {
                    validate_interval(interval)?;
                }
            }
            MonitorType::Past => {
                if request.interval_minutes.is_some() {
                    return Err(MonitorError::Validation(
                        "interval only applies to future monitors".to_string(),
                    ));
                }
                match (request.trace_start, request.trace_end) {
                    (Some(start), Some(end)) => validate_trace_window(start, end, now)?,
                    _ => {
                        return Err(MonitorError::Validation(
                            "past monitors require trace start and end times".to_string(),
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    async fn discard_monitor(&self, monitor: &Monitor) {
        if let Err(e) = self.monitor_repository.delete(monitor.id).await {
            error!(
                monitor = %monitor.name,
                org = %monitor.org_name,
                error = %e,
                "Failed to remove monitor after failed initial run"
            );
        }
    }
}

#[async_trait]
impl MonitorManager for StandardMonitorManager {
    async fn create_monitor(
        &self,
        org_name: &str,
        mut request: CreateMonitorRequest,
    ) -> Result<MonitorView, MonitorError> {
        let now = Utc::now();
        // Whole seconds, matching what the workflow plane receives
        request.trace_start = request.trace_start.map(|t| t.trunc_subsecs(0));
        request.trace_end = request.trace_end.map(|t| t.trunc_subsecs(0));
        Self::validate_create(&request, now)?;

        if self
            .monitor_repository
            .find_by_name(org_name, &request.name)
            .await?
            .is_some()
        {
            return Err(MonitorError::AlreadyExists(format!("{}/{}", org_name, request.name)));
        }

        let agent_id = self
            .agent_directory
            .resolve_agent_id(org_name, &request.project_name, &request.agent_name)
            .await?;
        let environment_id = self
            .agent_directory
            .resolve_environment_id(org_name, &request.environment_name)
            .await?;

        let is_future = request.monitor_type == MonitorType::Future;
        let monitor = Monitor {
            id: MonitorId::new(),
            name: request.name,
            display_name: request.display_name,
            monitor_type: request.monitor_type,
            org_name: org_name.to_string(),
            project_name: request.project_name,
            agent_name: request.agent_name,
            agent_id,
            environment_name: request.environment_name,
            environment_id,
            evaluators: request.evaluators,
            sampling_rate: request.sampling_rate.unwrap_or(DEFAULT_SAMPLING_RATE),
            interval_minutes: is_future
                .then(|| request.interval_minutes.unwrap_or(DEFAULT_INTERVAL_MINUTES)),
            next_run_time: is_future.then_some(now),
            trace_start: request.trace_start,
            trace_end: request.trace_end,
            created_at: now,
            updated_at: now,
        };

        self.monitor_repository
            .create(&monitor)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    MonitorError::AlreadyExists(format!("{}/{}", org_name, monitor.name))
                }
                other => MonitorError::Repository(other),
            })?;

        info!(
            monitor = %monitor.name,
            org = %org_name,
            monitor_type = monitor.monitor_type.as_str(),
            "Monitor created"
        );

        if let (Some(start), Some(end)) = (monitor.trace_start, monitor.trace_end) {
            let run = match self
                .executor
                .execute_monitor_run(org_name, &monitor, start, end, &monitor.evaluators)
                .await
            {
                Ok(run) => run,
                Err(e) => {
                    warn!(
                        monitor = %monitor.name,
                        org = %org_name,
                        error = %e,
                        "Initial run of past monitor failed, removing monitor"
                    );
                    self.discard_monitor(&monitor).await;
                    return Err(e);
                }
            };

            let status = monitor.status(Some(run.status));
            return Ok(MonitorView {
                monitor,
                status,
                latest_run: Some(run.into()),
            });
        }

        let status = monitor.status(None);
        Ok(MonitorView {
            monitor,
            status,
            latest_run: None,
        })
    }

    async fn get_monitor(&self, org_name: &str, name: &str) -> Result<MonitorView, MonitorError> {
        let monitor = self.load_monitor(org_name, name).await?;
        self.to_view(monitor).await
    }

    async fn list_monitors(
        &self,
        org_name: &str,
        filter: &MonitorFilter,
    ) -> Result<Vec<MonitorView>, MonitorError> {
        let monitors = self.monitor_repository.list(org_name, filter).await?;
        let mut views = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            views.push(self.to_view(monitor).await?);
        }
        Ok(views)
    }

    async fn update_monitor(
        &self,
        org_name: &str,
        name: &str,
        request: UpdateMonitorRequest,
    ) -> Result<MonitorView, MonitorError> {
        let mut monitor = self.load_monitor(org_name, name).await?;

        if let Some(display_name) = request.display_name {
            validate_display_name(&display_name)?;
            monitor.display_name = display_name;
        }
        if let Some(evaluators) = request.evaluators {
            validate_evaluators(&evaluators)?;
            monitor.evaluators = evaluators;
        }
        if let Some(rate) = request.sampling_rate {
            validate_sampling_rate(rate)?;
            monitor.sampling_rate = rate;
        }
        if let Some(interval) = request.interval_minutes {
            if !monitor.is_future() {
                return Err(MonitorError::Validation(
                    "interval only applies to future monitors".to_string(),
                ));
            }
            validate_interval(interval)?;
            monitor.interval_minutes = Some(interval);
        }
        monitor.updated_at = Utc::now();

        self.monitor_repository.update_definition(&monitor).await?;
        info!(monitor = %monitor.name, org = %org_name, "Monitor updated");

        // Schedule may have moved since the load
        let monitor = self.load_monitor(org_name, name).await?;

        self.to_view(monitor).await
    }

    async fn delete_monitor(&self, org_name: &str, name: &str) -> Result<(), MonitorError> {
        let monitor = self.load_monitor(org_name, name).await?;
        let runs = self.run_repository.list_by_monitor(monitor.id, None).await?;

        self.monitor_repository.delete(monitor.id).await?;
        info!(
            monitor = %monitor.name,
            org = %org_name,
            runs = runs.len(),
            "Monitor deleted"
        );

        for run in runs {
            let workload = WorkloadRef::workflow_run(org_name, &run.job_name);
            match self.workload.delete(&workload).await {
                Ok(()) | Err(WorkloadError::NotFound(_)) => {}
                Err(e) => warn!(
                    job_name = %run.job_name,
                    error = %e,
                    "Failed to delete workflow run of deleted monitor"
                ),
            }
        }
        Ok(())
    }

    async fn stop_monitor(&self, org_name: &str, name: &str) -> Result<MonitorView, MonitorError> {
        let mut monitor = self.load_monitor(org_name, name).await?;
        monitor.suspend(Utc::now())?;
        if !self.monitor_repository.suspend_schedule(monitor.id).await? {
            // Stopped or deleted by a concurrent request
            self.load_monitor(org_name, name).await?;
            return Err(MonitorError::InvalidState(format!(
                "monitor '{}' is already stopped",
                name
            )));
        }
        info!(monitor = %monitor.name, org = %org_name, "Monitor stopped");
        self.to_view(monitor).await
    }

    async fn start_monitor(&self, org_name: &str, name: &str) -> Result<MonitorView, MonitorError> {
        let mut monitor = self.load_monitor(org_name, name).await?;
        monitor.resume(Utc::now())?;
        let next_run_time = monitor.next_run_time.unwrap_or_else(Utc::now);
        if !self.monitor_repository.resume_schedule(monitor.id, next_run_time).await? {
            self.load_monitor(org_name, name).await?;
            return Err(MonitorError::InvalidState(format!(
                "monitor '{}' is already active",
                name
            )));
        }
        info!(monitor = %monitor.name, org = %org_name, "Monitor started");
        self.to_view(monitor).await
    }

    async fn list_monitor_runs(
        &self,
        org_name: &str,
        name: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MonitorRunView>, MonitorError> {
        let monitor = self.load_monitor(org_name, name).await?;
        let runs = self.run_repository.list_by_monitor(monitor.id, limit).await?;

        let mut views = Vec::with_capacity(runs.len());
        for run in runs {
            views.push(self.refresh_run(org_name, run).await.into());
        }
        Ok(views)
    }

    async fn rerun_monitor(
        &self,
        org_name: &str,
        name: &str,
        run_id: MonitorRunId,
    ) -> Result<MonitorRunView, MonitorError> {
        let monitor = self.load_monitor(org_name, name).await?;
        let previous = self.load_run(&monitor, run_id).await?;

        let run = self
            .executor
            .execute_monitor_run(
                org_name,
                &monitor,
                previous.trace_start,
                previous.trace_end,
                &previous.evaluators,
            )
            .await?;

        info!(
            monitor = %monitor.name,
            source_run = %previous.id,
            run_id = %run.id,
            "Monitor run resubmitted"
        );
        Ok(run.into())
    }

    async fn get_run_logs(
        &self,
        org_name: &str,
        name: &str,
        run_id: MonitorRunId,
    ) -> Result<Vec<LogLine>, MonitorError> {
        let monitor = self.load_monitor(org_name, name).await?;
        let run = self.load_run(&monitor, run_id).await?;
        Ok(self.log_provider.get_run_logs(org_name, &run.job_name).await?)
    }
}
