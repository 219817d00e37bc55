// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod monitor_executor;
pub mod monitor_manager;
pub mod monitor_scheduler;

pub use monitor_executor::{MonitorExecutor, StandardMonitorExecutor};
pub use monitor_manager::{
    CreateMonitorRequest, MonitorManager, MonitorRunView, MonitorView, StandardMonitorManager,
    UpdateMonitorRequest,
};
pub use monitor_scheduler::{CycleOutcome, MonitorScheduler, MonitorSchedulerConfig};
