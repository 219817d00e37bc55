// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Workflow Plane Contracts
//!
//! Ports to the external systems the engine delegates to:
//!
//! - [`WorkloadExecutor`]: accepts evaluation job specs, deletes them and
//!   exposes the resulting workflow run resources (condition reports).
//! - [`AgentDirectory`]: resolves agent and environment names to stable ids.
//! - [`RunLogProvider`]: streams back the logs of a finished workflow run.
//!
//! The engine treats the workflow plane's own scheduling as opaque; it only
//! submits specs and reads status back.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::monitor::{Evaluator, Monitor};
use crate::domain::monitor_run::MonitorRunId;

/// Resource kind of the workflow runs created for monitor executions
pub const WORKFLOW_RUN_KIND: &str = "WorkflowRun";

/// Parameters handed to the evaluation workflow template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorJobParameters {
    pub monitor_id: String,
    pub monitor_name: String,
    pub monitor_display_name: String,
    pub agent_id: String,
    pub environment_id: String,
    /// JSON encoded `[{identifier, displayName, config}]`
    pub evaluators: String,
    pub sampling_rate: f64,
    /// RFC 3339, UTC
    pub trace_start: String,
    /// RFC 3339, UTC
    pub trace_end: String,
    /// Lets the workflow publish results against this run
    pub run_id: String,
}

/// A workflow run submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunSpec {
    pub name: String,
    pub namespace: String,
    pub workflow_template: String,
    pub parameters: MonitorJobParameters,
}

impl WorkflowRunSpec {
    #[allow(clippy::too_many_arguments)]
    pub fn for_monitor(
        job_name: &str,
        namespace: &str,
        workflow_template: &str,
        monitor: &Monitor,
        run_id: MonitorRunId,
        trace_start: DateTime<Utc>,
        trace_end: DateTime<Utc>,
        evaluators: &[Evaluator],
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name: job_name.to_string(),
            namespace: namespace.to_string(),
            workflow_template: workflow_template.to_string(),
            parameters: MonitorJobParameters {
                monitor_id: monitor.id.to_string(),
                monitor_name: monitor.name.clone(),
                monitor_display_name: monitor.display_name.clone(),
                agent_id: monitor.agent_id.clone(),
                environment_id: monitor.environment_id.clone(),
                evaluators: serde_json::to_string(evaluators)?,
                sampling_rate: monitor.sampling_rate,
                trace_start: format_timestamp(trace_start),
                trace_end: format_timestamp(trace_end),
                run_id: run_id.to_string(),
            },
        })
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Handle to a submitted workflow run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadRef {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn workflow_run(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: WORKFLOW_RUN_KIND.to_string(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(alias = "log")]
    pub message: String,
}

#[async_trait]
pub trait WorkloadExecutor: Send + Sync {
    async fn submit(&self, spec: &WorkflowRunSpec) -> Result<WorkloadRef, WorkloadError>;

    async fn delete(&self, workload: &WorkloadRef) -> Result<(), WorkloadError>;

    /// Raw resource document, including its `status.conditions`
    async fn get_resource(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<serde_json::Value, WorkloadError>;
}

#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn resolve_agent_id(
        &self,
        org_name: &str,
        project_name: &str,
        agent_name: &str,
    ) -> Result<String, WorkloadError>;

    async fn resolve_environment_id(
        &self,
        org_name: &str,
        environment_name: &str,
    ) -> Result<String, WorkloadError>;
}

#[async_trait]
pub trait RunLogProvider: Send + Sync {
    async fn get_run_logs(&self, namespace: &str, job_name: &str) -> Result<Vec<LogLine>, WorkloadError>;
}

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for WorkloadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WorkloadError::InvalidResponse(err.to_string())
        } else {
            WorkloadError::Transport(err.to_string())
        }
    }
}
