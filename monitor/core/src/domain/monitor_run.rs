// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Monitor Run
//!
//! One execution attempt of a monitor. A run freezes the trace window and the
//! evaluator list at creation time so that history and reruns stay
//! reproducible after the owning monitor is edited.
//!
//! Runs start `Pending`; only the scheduler's reconciliation step moves them
//! forward, based on the condition report of the external workflow run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::monitor::{Evaluator, MonitorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorRunId(pub Uuid);

impl MonitorRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MonitorRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRun {
    pub id: MonitorRunId,
    pub monitor_id: MonitorId,
    /// Name of the external workflow run backing this attempt
    pub job_name: String,
    pub trace_start: DateTime<Utc>,
    pub trace_end: DateTime<Utc>,
    /// Evaluator snapshot taken when the run was created
    pub evaluators: Vec<Evaluator>,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitorRun {
    pub fn pending(
        id: MonitorRunId,
        monitor_id: MonitorId,
        job_name: String,
        trace_start: DateTime<Utc>,
        trace_end: DateTime<Utc>,
        evaluators: Vec<Evaluator>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            monitor_id,
            job_name,
            trace_start,
            trace_end,
            evaluators,
            status: RunStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an observed status. Returns `true` when the status changed.
    ///
    /// The error message is only kept for failed runs.
    pub fn apply_status(&mut self, status: RunStatus, message: &str) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.error_message = if status == RunStatus::Failed && !message.is_empty() {
            Some(message.to_string())
        } else {
            None
        };
        self.updated_at = Utc::now();
        true
    }
}

/// A non-terminal run together with the organization namespace its workflow
/// run lives in.
#[derive(Debug, Clone)]
pub struct InFlightRun {
    pub run: MonitorRun,
    pub org_name: String,
}
