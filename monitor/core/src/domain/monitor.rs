// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Monitor Aggregate
//!
//! A monitor is an evaluation job definition bound to one agent in one
//! environment. It comes in two flavours:
//!
//! | Type | Scheduling state | Window |
//! |------|------------------|--------|
//! | `Future` | `interval_minutes` + `next_run_time` | computed per run by the scheduler |
//! | `Past` | none | fixed `trace_start..trace_end`, evaluated once at creation |
//!
//! A `Future` monitor with `next_run_time == None` is suspended. The monitor
//! is the aggregate root for its runs: deleting it cascades to every
//! [`MonitorRun`](crate::domain::monitor_run::MonitorRun) it owns.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::monitor_run::RunStatus;
use crate::domain::repository::RepositoryError;
use crate::domain::time_window::TimeWindowError;
use crate::domain::workload::WorkloadError;

/// Smallest interval a recurring monitor may be scheduled with.
pub const MIN_INTERVAL_MINUTES: i32 = 5;

/// Interval applied to `Future` monitors created without one.
pub const DEFAULT_INTERVAL_MINUTES: i32 = 60;

pub const DEFAULT_SAMPLING_RATE: f64 = 1.0;

static MONITOR_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{1,48}[a-z0-9]$").expect("valid monitor name regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorId(pub Uuid);

impl MonitorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorType {
    /// Recurring evaluation driven by an interval
    Future,
    /// One-shot evaluation over an already elapsed window
    Past,
}

impl MonitorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorType::Future => "future",
            MonitorType::Past => "past",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "future" => Some(MonitorType::Future),
            "past" => Some(MonitorType::Past),
            _ => None,
        }
    }
}

/// A scoring/check unit applied to sampled traces during a run.
///
/// The configuration is opaque to this service; it is forwarded verbatim to
/// the evaluation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluator {
    pub identifier: String,
    pub display_name: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl Evaluator {
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            config: serde_json::Map::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// Derived, read-time status of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Active,
    Suspended,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub name: String,
    pub display_name: String,
    pub monitor_type: MonitorType,
    pub org_name: String,
    pub project_name: String,
    pub agent_name: String,
    pub agent_id: String,
    pub environment_name: String,
    pub environment_id: String,
    pub evaluators: Vec<Evaluator>,
    pub sampling_rate: f64,
    pub interval_minutes: Option<i32>,
    pub next_run_time: Option<DateTime<Utc>>,
    pub trace_start: Option<DateTime<Utc>>,
    pub trace_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Monitor {
    pub fn is_future(&self) -> bool {
        self.monitor_type == MonitorType::Future
    }

    /// A suspended monitor is a `Future` monitor with no next run scheduled.
    pub fn is_suspended(&self) -> bool {
        self.is_future() && self.next_run_time.is_none()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_future() && self.next_run_time.is_some_and(|t| t <= now)
    }

    /// Derive the externally visible status.
    ///
    /// Future monitors are Active or Suspended depending on their schedule.
    /// Past monitors mirror the outcome of their (single) latest run.
    pub fn status(&self, latest_run: Option<RunStatus>) -> MonitorStatus {
        match self.monitor_type {
            MonitorType::Future => {
                if self.next_run_time.is_some() {
                    MonitorStatus::Active
                } else {
                    MonitorStatus::Suspended
                }
            }
            MonitorType::Past => match latest_run {
                Some(RunStatus::Failed) => MonitorStatus::Failed,
                Some(RunStatus::Pending | RunStatus::Running | RunStatus::Succeeded) => {
                    MonitorStatus::Active
                }
                None => MonitorStatus::Unknown,
            },
        }
    }

    pub fn suspend(&mut self, now: DateTime<Utc>) -> Result<(), MonitorError> {
        self.ensure_future("stop")?;
        if self.next_run_time.is_none() {
            return Err(MonitorError::InvalidState(format!(
                "monitor '{}' is already stopped",
                self.name
            )));
        }
        self.next_run_time = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), MonitorError> {
        self.ensure_future("start")?;
        if self.next_run_time.is_some() {
            return Err(MonitorError::InvalidState(format!(
                "monitor '{}' is already active",
                self.name
            )));
        }
        self.next_run_time = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_future(&self, operation: &str) -> Result<(), MonitorError> {
        if self.is_future() {
            Ok(())
        } else {
            Err(MonitorError::InvalidState(format!(
                "cannot {} monitor '{}': only future monitors support stop and start",
                operation, self.name
            )))
        }
    }
}

pub fn validate_name(name: &str) -> Result<(), MonitorError> {
    if MONITOR_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(MonitorError::Validation(format!(
            "invalid monitor name '{}': must be 3-50 lowercase alphanumeric characters or '-', \
             starting with a letter and ending with a letter or digit",
            name
        )))
    }
}

pub fn validate_display_name(display_name: &str) -> Result<(), MonitorError> {
    if display_name.trim().is_empty() {
        return Err(MonitorError::Validation("display name must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_sampling_rate(rate: f64) -> Result<(), MonitorError> {
    if rate.is_finite() && rate > 0.0 && rate <= 1.0 {
        Ok(())
    } else {
        Err(MonitorError::Validation(format!(
            "sampling rate must be in (0, 1], got {}",
            rate
        )))
    }
}

pub fn validate_interval(interval_minutes: i32) -> Result<(), MonitorError> {
    if interval_minutes < MIN_INTERVAL_MINUTES {
        return Err(MonitorError::Validation(format!(
            "interval must be at least {} minutes, got {}",
            MIN_INTERVAL_MINUTES, interval_minutes
        )));
    }
    Ok(())
}

pub fn validate_evaluators(evaluators: &[Evaluator]) -> Result<(), MonitorError> {
    if evaluators.is_empty() {
        return Err(MonitorError::Validation(
            "at least one evaluator is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for evaluator in evaluators {
        if evaluator.identifier.trim().is_empty() {
            return Err(MonitorError::Validation(
                "evaluator identifier must not be empty".to_string(),
            ));
        }
        if !seen.insert(evaluator.identifier.as_str()) {
            return Err(MonitorError::Validation(format!(
                "duplicate evaluator '{}'",
                evaluator.identifier
            )));
        }
    }
    Ok(())
}

/// Past windows must be non-empty and fully elapsed.
pub fn validate_trace_window(
    trace_start: DateTime<Utc>,
    trace_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), MonitorError> {
    if trace_start >= trace_end {
        return Err(MonitorError::Validation(
            "trace start time must be before trace end time".to_string(),
        ));
    }
    if trace_end > now {
        return Err(MonitorError::Validation(
            "trace end time must not be in the future".to_string(),
        ));
    }
    Ok(())
}

/// Errors surfaced by monitor operations
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Monitor not found: {0}")]
    MonitorNotFound(String),

    #[error("Monitor run not found: {0}")]
    RunNotFound(String),

    #[error("Monitor already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid monitor state: {0}")]
    InvalidState(String),

    #[error("Failed to calculate time window: {0}")]
    TimeWindow(#[from] TimeWindowError),

    #[error("Workload executor error: {0}")]
    Workload(#[from] WorkloadError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
