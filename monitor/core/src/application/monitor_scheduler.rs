// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Monitor Scheduler - Background loop that drives recurring monitors
//!
//! Every tick the scheduler tries to take the cluster-wide scheduler lock. The
//! replica that gets it triggers every due future monitor and reconciles the
//! status of in-flight runs; every other replica skips the tick.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Leader-per-tick scheduling of monitor runs
//! - **Collaborators:** MonitorExecutor, SchedulerLock, WorkloadExecutor, repositories
//!
//! # Cycle
//!
//! 1. `try_acquire` the lock; held elsewhere → `CycleOutcome::Skipped`
//! 2. For each due monitor: time window → execute → advance `next_run_time`
//! 3. For each Pending/Running run: fetch resource → interpret → persist if changed
//! 4. Release the lock
//!
//! Units of work run sequentially and cancellation is checked between them.
//! Nothing is retried inside a cycle; the next tick picks up whatever failed.

use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::monitor_executor::MonitorExecutor;
use crate::domain::monitor::{Monitor, MonitorError};
use crate::domain::monitor_run::{InFlightRun, MonitorRun};
use crate::domain::repository::{MonitorRepository, MonitorRunRepository, SchedulerLock};
use crate::domain::run_status::{interpret_run_status, run_error_message};
use crate::domain::time_window::calculate_time_window;
use crate::domain::workload::{WorkloadExecutor, WORKFLOW_RUN_KIND};

/// Configuration for the monitor scheduler
#[derive(Debug, Clone)]
pub struct MonitorSchedulerConfig {
    /// Seconds between cycles
    pub interval_seconds: u64,

    pub enabled: bool,
}

impl Default for MonitorSchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            enabled: true,
        }
    }
}

/// Result of one scheduler cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another instance holds the scheduler lock
    Skipped,
    Completed {
        triggered: usize,
        failed: usize,
        reconciled: usize,
    },
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct MonitorScheduler {
    monitor_repository: Arc<dyn MonitorRepository>,
    run_repository: Arc<dyn MonitorRunRepository>,
    executor: Arc<dyn MonitorExecutor>,
    workload: Arc<dyn WorkloadExecutor>,
    lock: Arc<dyn SchedulerLock>,
    config: MonitorSchedulerConfig,
    running: Mutex<Option<RunningLoop>>,
}

impl MonitorScheduler {
    pub fn new(
        monitor_repository: Arc<dyn MonitorRepository>,
        run_repository: Arc<dyn MonitorRunRepository>,
        executor: Arc<dyn MonitorExecutor>,
        workload: Arc<dyn WorkloadExecutor>,
        lock: Arc<dyn SchedulerLock>,
        config: MonitorSchedulerConfig,
    ) -> Self {
        Self {
            monitor_repository,
            run_repository,
            executor,
            workload,
            lock,
            config,
            running: Mutex::new(None),
        }
    }

    /// Spawn the background loop. The loop also ends when `shutdown` is
    /// cancelled.
    ///
    /// Returns `false` when the scheduler is disabled or already running.
    pub async fn start(self: &Arc<Self>, shutdown: &CancellationToken) -> bool {
        if !self.config.enabled {
            info!("Monitor scheduler is disabled");
            return false;
        }

        let mut slot = self.running.lock().await;
        if slot.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            debug!("Monitor scheduler already running");
            return false;
        }

        let token = shutdown.child_token();
        let handle = tokio::spawn(Arc::clone(self).run(token.clone()));
        *slot = Some(RunningLoop { token, handle });
        true
    }

    /// Stop the loop and wait for its current unit of work to finish.
    ///
    /// Safe to call before `start` and any number of times.
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        let Some(running) = running else {
            return;
        };

        running.token.cancel();
        if let Err(e) = running.handle.await {
            warn!("Monitor scheduler task ended abnormally: {}", e);
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    async fn run(self: Arc<Self>, token: CancellationToken) {
        info!(
            interval_seconds = self.config.interval_seconds,
            "Starting monitor scheduler background task"
        );

        // First tick fires immediately
        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Shutdown signal received, stopping monitor scheduler");
                    break;
                }
                _ = tick.tick() => {
                    match self.run_cycle(&token).await {
                        Ok(CycleOutcome::Skipped) => {
                            debug!("Scheduler lock held elsewhere, skipping cycle");
                        }
                        Ok(CycleOutcome::Completed { triggered, failed, reconciled }) => {
                            if triggered + failed + reconciled > 0 {
                                info!(triggered, failed, reconciled, "Monitor scheduler cycle completed");
                            } else {
                                debug!("Monitor scheduler cycle completed with no work");
                            }
                        }
                        Err(e) => {
                            warn!("Monitor scheduler cycle failed: {}", e);
                        }
                    }
                }
            }
        }

        info!("Monitor scheduler background task stopped");
    }

    /// Run a single cycle under the scheduler lock.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome, MonitorError> {
        let Some(lock) = self.lock.try_acquire().await? else {
            metrics::counter!("monitor_scheduler_cycles_total", "outcome" => "skipped").increment(1);
            return Ok(CycleOutcome::Skipped);
        };

        let result = self.run_locked(cancel).await;

        if let Err(e) = lock.release().await {
            warn!("Failed to release scheduler lock: {}", e);
        }

        let outcome = if result.is_ok() { "completed" } else { "failed" };
        metrics::counter!("monitor_scheduler_cycles_total", "outcome" => outcome).increment(1);
        result
    }

    async fn run_locked(&self, cancel: &CancellationToken) -> Result<CycleOutcome, MonitorError> {
        let now = Utc::now();
        let (mut triggered, mut failed, mut reconciled) = (0, 0, 0);

        let due = self.monitor_repository.find_due(now).await?;
        for monitor in &due {
            if cancel.is_cancelled() {
                return Ok(CycleOutcome::Completed { triggered, failed, reconciled });
            }
            match self.trigger_monitor(monitor, now).await {
                Ok(_) => triggered += 1,
                Err(e) => {
                    failed += 1;
                    metrics::counter!("monitor_trigger_failures_total").increment(1);
                    warn!(
                        monitor = %monitor.name,
                        org = %monitor.org_name,
                        error = %e,
                        "Failed to trigger monitor, retrying next cycle"
                    );
                }
            }
        }

        let in_flight = self.run_repository.find_in_flight().await?;
        for entry in &in_flight {
            if cancel.is_cancelled() {
                break;
            }
            match self.reconcile_run(entry).await {
                Ok(true) => reconciled += 1,
                Ok(false) => {}
                Err(e) => warn!(
                    run_id = %entry.run.id,
                    job_name = %entry.run.job_name,
                    error = %e,
                    "Failed to reconcile monitor run status"
                ),
            }
        }

        Ok(CycleOutcome::Completed { triggered, failed, reconciled })
    }

    /// Execute one due monitor and advance its schedule.
    ///
    /// A window or execution failure leaves `next_run_time` untouched. A
    /// failed schedule update after a successful execution is only logged;
    /// the monitor then runs again next cycle. A monitor stopped while its run
    /// was being submitted stays stopped.
    pub async fn trigger_monitor(
        &self,
        monitor: &Monitor,
        now: DateTime<Utc>,
    ) -> Result<MonitorRun, MonitorError> {
        let window = calculate_time_window(monitor.next_run_time, monitor.interval_minutes, now)?;

        let run = self
            .executor
            .execute_monitor_run(
                &monitor.org_name,
                monitor,
                window.start_time,
                window.end_time,
                &monitor.evaluators,
            )
            .await?;

        match self
            .executor
            .update_next_run_time(monitor.id, window.next_run_time)
            .await
        {
            Ok(true) => {}
            Ok(false) => info!(
                monitor = %monitor.name,
                run_id = %run.id,
                "Monitor stopped during trigger; schedule not advanced"
            ),
            Err(e) => error!(
                monitor = %monitor.name,
                run_id = %run.id,
                error = %e,
                "Failed to advance next run time; the monitor will run again next cycle"
            ),
        }

        metrics::counter!("monitor_triggers_total").increment(1);
        debug!(
            monitor = %monitor.name,
            run_id = %run.id,
            next_run_time = %window.next_run_time,
            "Monitor triggered"
        );
        Ok(run)
    }

    /// Returns `true` when the stored status changed.
    async fn reconcile_run(&self, entry: &InFlightRun) -> Result<bool, MonitorError> {
        let resource = self
            .workload
            .get_resource(&entry.org_name, WORKFLOW_RUN_KIND, &entry.run.job_name)
            .await?;

        let mut run = entry.run.clone();
        let status = interpret_run_status(&resource);
        if !run.apply_status(status, &run_error_message(&resource)) {
            return Ok(false);
        }

        self.run_repository
            .update_status(run.id, run.status, run.error_message.as_deref())
            .await?;

        metrics::counter!("monitor_run_transitions_total", "status" => run.status.as_str()).increment(1);
        info!(
            run_id = %run.id,
            job_name = %run.job_name,
            from = %entry.run.status,
            to = %run.status,
            "Monitor run status updated"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monitor::{Evaluator, MonitorId, MonitorType};
    use crate::domain::monitor_run::{MonitorRunId, RunStatus};
    use crate::domain::repository::{HeldLock, RepositoryError};
    use crate::domain::workload::{WorkflowRunSpec, WorkloadError, WorkloadRef};
    use crate::infrastructure::repositories::{InMemoryMonitorStore, InMemorySchedulerLock};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, SubsecRound};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Executor double that records calls and writes runs into the store.
    struct RecordingExecutor {
        store: Arc<InMemoryMonitorStore>,
        calls: StdMutex<Vec<(MonitorId, DateTime<Utc>, DateTime<Utc>)>>,
        fail_execution: bool,
        fail_schedule_update: bool,
        stop_during_execution: bool,
    }

    impl RecordingExecutor {
        fn new(store: Arc<InMemoryMonitorStore>) -> Self {
            Self {
                store,
                calls: StdMutex::new(Vec::new()),
                fail_execution: false,
                fail_schedule_update: false,
                stop_during_execution: false,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MonitorExecutor for RecordingExecutor {
        async fn execute_monitor_run(
            &self,
            _org_name: &str,
            monitor: &Monitor,
            start_time: DateTime<Utc>,
            end_time: DateTime<Utc>,
            evaluators: &[Evaluator],
        ) -> Result<MonitorRun, MonitorError> {
            self.calls.lock().unwrap().push((monitor.id, start_time, end_time));
            if self.fail_execution {
                return Err(WorkloadError::Transport("workflow plane unavailable".to_string()).into());
            }
            if self.stop_during_execution {
                self.store.suspend_schedule(monitor.id).await?;
            }
            let run = MonitorRun::pending(
                MonitorRunId::new(),
                monitor.id,
                format!("{}-00000000", monitor.name),
                start_time,
                end_time,
                evaluators.to_vec(),
            );
            MonitorRunRepository::create(self.store.as_ref(), &run).await?;
            Ok(run)
        }

        async fn update_next_run_time(
            &self,
            monitor_id: MonitorId,
            next_run_time: DateTime<Utc>,
        ) -> Result<bool, MonitorError> {
            if self.fail_schedule_update {
                return Err(RepositoryError::Database("deadlock detected".to_string()).into());
            }
            let advanced = self.store.advance_next_run_time(monitor_id, next_run_time).await?;
            Ok(advanced)
        }
    }

    #[derive(Default)]
    struct StaticWorkload {
        resources: StdMutex<HashMap<String, serde_json::Value>>,
    }

    #[async_trait]
    impl WorkloadExecutor for StaticWorkload {
        async fn submit(&self, spec: &WorkflowRunSpec) -> Result<WorkloadRef, WorkloadError> {
            Ok(WorkloadRef::workflow_run(&spec.namespace, &spec.name))
        }

        async fn delete(&self, _workload: &WorkloadRef) -> Result<(), WorkloadError> {
            Ok(())
        }

        async fn get_resource(&self, _: &str, _: &str, name: &str) -> Result<serde_json::Value, WorkloadError> {
            self.resources
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| WorkloadError::NotFound(name.to_string()))
        }
    }

    struct Harness {
        store: Arc<InMemoryMonitorStore>,
        executor: Arc<RecordingExecutor>,
        workload: Arc<StaticWorkload>,
        lock: InMemorySchedulerLock,
        scheduler: Arc<MonitorScheduler>,
    }

    fn harness_with(configure: impl FnOnce(&mut RecordingExecutor), config: MonitorSchedulerConfig) -> Harness {
        let store = Arc::new(InMemoryMonitorStore::new());
        let mut executor = RecordingExecutor::new(store.clone());
        configure(&mut executor);
        let executor = Arc::new(executor);
        let workload = Arc::new(StaticWorkload::default());
        let lock = InMemorySchedulerLock::new();
        let scheduler = Arc::new(MonitorScheduler::new(
            store.clone(),
            store.clone(),
            executor.clone(),
            workload.clone(),
            Arc::new(lock.clone()),
            config,
        ));
        Harness { store, executor, workload, lock, scheduler }
    }

    fn harness() -> Harness {
        harness_with(|_| {}, MonitorSchedulerConfig::default())
    }

    fn due_monitor(name: &str, interval: Option<i32>, next_run_time: Option<DateTime<Utc>>) -> Monitor {
        let now = Utc::now();
        Monitor {
            id: MonitorId::new(),
            name: name.to_string(),
            display_name: name.to_string(),
            monitor_type: MonitorType::Future,
            org_name: "acme".to_string(),
            project_name: "default".to_string(),
            agent_name: "support-bot".to_string(),
            agent_id: "agent-uid".to_string(),
            environment_name: "production".to_string(),
            environment_id: "env-uid".to_string(),
            evaluators: vec![Evaluator::new("tone", "Tone")],
            sampling_rate: 1.0,
            interval_minutes: interval,
            next_run_time,
            trace_start: None,
            trace_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn stored(store: &InMemoryMonitorStore, id: MonitorId) -> Monitor {
        MonitorRepository::find_by_id(store, id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_cycle_triggers_due_monitor_once_and_advances_schedule() {
        let h = harness();
        let next = Utc::now() - ChronoDuration::minutes(1);
        let monitor = due_monitor("tone-check", Some(60), Some(next));
        h.store.insert_monitor(monitor.clone());

        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, CycleOutcome::Completed { triggered: 1, failed: 0, reconciled: 0 });
        let calls = h.executor.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        let (_, start, end) = calls[0];
        assert_eq!(start, (next - ChronoDuration::minutes(60)).trunc_subsecs(0));

        let updated = stored(&h.store, monitor.id).await;
        assert_eq!(updated.next_run_time, Some(end + ChronoDuration::minutes(60)));

        // Not due any more
        h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(h.executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_window_end_respects_safety_delta() {
        let h = harness();
        let monitor = due_monitor("tone-check", Some(100), Some(Utc::now() - ChronoDuration::minutes(1)));
        h.store.insert_monitor(monitor);

        let before = Utc::now();
        h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        let (_, _, end) = h.executor.calls.lock().unwrap()[0];
        assert!(end <= before - ChronoDuration::minutes(5) + ChronoDuration::seconds(1));
    }

    #[tokio::test]
    async fn test_nil_interval_skips_monitor() {
        let h = harness();
        let monitor = due_monitor("broken", None, Some(Utc::now() - ChronoDuration::minutes(1)));
        h.store.insert_monitor(monitor.clone());

        let err = h.scheduler.trigger_monitor(&monitor, Utc::now()).await.unwrap_err();
        assert!(err.to_string().contains("interval_minutes is nil"));
        assert_eq!(h.executor.call_count(), 0);

        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Completed { triggered: 0, failed: 1, reconciled: 0 });
        assert_eq!(h.executor.call_count(), 0);
        assert_eq!(stored(&h.store, monitor.id).await.next_run_time, monitor.next_run_time);
    }

    #[tokio::test]
    async fn test_failed_execution_keeps_schedule_and_continues() {
        let h = harness_with(|e| e.fail_execution = true, MonitorSchedulerConfig::default());
        let first = due_monitor("first", Some(10), Some(Utc::now() - ChronoDuration::minutes(2)));
        let second = due_monitor("second", Some(10), Some(Utc::now() - ChronoDuration::minutes(1)));
        h.store.insert_monitor(first.clone());
        h.store.insert_monitor(second.clone());

        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, CycleOutcome::Completed { triggered: 0, failed: 2, reconciled: 0 });
        assert_eq!(h.executor.call_count(), 2);
        assert_eq!(stored(&h.store, first.id).await.next_run_time, first.next_run_time);
    }

    #[tokio::test]
    async fn test_schedule_update_failure_is_not_fatal() {
        let h = harness_with(|e| e.fail_schedule_update = true, MonitorSchedulerConfig::default());
        let monitor = due_monitor("tone-check", Some(10), Some(Utc::now() - ChronoDuration::minutes(1)));
        h.store.insert_monitor(monitor.clone());

        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, CycleOutcome::Completed { triggered: 1, failed: 0, reconciled: 0 });
        // Schedule not advanced: the monitor is still due
        assert_eq!(stored(&h.store, monitor.id).await.next_run_time, monitor.next_run_time);
    }

    #[tokio::test]
    async fn test_stop_during_trigger_is_not_undone() {
        let h = harness_with(|e| e.stop_during_execution = true, MonitorSchedulerConfig::default());
        let monitor = due_monitor("tone-check", Some(10), Some(Utc::now() - ChronoDuration::minutes(1)));
        h.store.insert_monitor(monitor.clone());

        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();

        assert_eq!(outcome, CycleOutcome::Completed { triggered: 1, failed: 0, reconciled: 0 });
        assert_eq!(stored(&h.store, monitor.id).await.next_run_time, None);

        h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(h.executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cycle_skipped_when_lock_held() {
        let h = harness();
        h.store.insert_monitor(due_monitor("tone-check", Some(10), Some(Utc::now())));

        let held: Box<dyn HeldLock> = h.lock.try_acquire().await.unwrap().unwrap();
        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Skipped);
        assert_eq!(h.executor.call_count(), 0);

        held.release().await.unwrap();
        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed { triggered: 1, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_cycle_does_no_work() {
        let h = harness();
        h.store.insert_monitor(due_monitor("tone-check", Some(10), Some(Utc::now())));
        let token = CancellationToken::new();
        token.cancel();

        let outcome = h.scheduler.run_cycle(&token).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Completed { triggered: 0, failed: 0, reconciled: 0 });
        assert_eq!(h.executor.call_count(), 0);
        // Lock was released
        assert!(h.lock.try_acquire().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reconcile_persists_changed_status() {
        let h = harness();
        let monitor = due_monitor("tone-check", Some(10), Some(Utc::now()));
        h.store.insert_monitor(monitor.clone());
        let run = h
            .scheduler
            .trigger_monitor(&monitor, Utc::now())
            .await
            .unwrap();

        h.workload.resources.lock().unwrap().insert(
            run.job_name.clone(),
            json!({ "status": { "conditions": [
                { "type": "WorkflowCompleted", "status": "True", "reason": "WorkflowFailed" }
            ] } }),
        );

        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed { reconciled: 1, .. }));

        let updated = MonitorRunRepository::find_by_id(h.store.as_ref(), run.id).await.unwrap().unwrap();
        assert_eq!(updated.status, RunStatus::Failed);
        assert_eq!(updated.error_message.as_deref(), Some("WorkflowFailed"));

        // Terminal runs are no longer reconciled
        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed { reconciled: 0, .. }));
    }

    #[tokio::test]
    async fn test_reconcile_leaves_unchanged_status_alone() {
        let h = harness();
        let monitor = due_monitor("tone-check", Some(10), Some(Utc::now()));
        h.store.insert_monitor(monitor.clone());
        let run = h.scheduler.trigger_monitor(&monitor, Utc::now()).await.unwrap();
        h.workload.resources.lock().unwrap().insert(run.job_name.clone(), json!({}));

        let outcome = h.scheduler.run_cycle(&CancellationToken::new()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed { reconciled: 0, .. }));
        let stored = MonitorRunRepository::find_by_id(h.store.as_ref(), run.id).await.unwrap().unwrap();
        assert_eq!(stored.updated_at, run.updated_at);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let h = harness();
        h.scheduler.stop().await;

        assert!(h.scheduler.start(&CancellationToken::new()).await);
        assert!(h.scheduler.is_running().await);
        assert!(!h.scheduler.start(&CancellationToken::new()).await);

        h.scheduler.stop().await;
        h.scheduler.stop().await;
        h.scheduler.stop().await;
        assert!(!h.scheduler.is_running().await);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_not_start() {
        let h = harness_with(
            |_| {},
            MonitorSchedulerConfig {
                enabled: false,
                ..Default::default()
            },
        );
        assert!(!h.scheduler.start(&CancellationToken::new()).await);
        assert!(!h.scheduler.is_running().await);
        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_loop_runs_first_cycle_immediately_and_honours_shutdown() {
        let h = harness();
        h.store.insert_monitor(due_monitor("tone-check", Some(10), Some(Utc::now())));
        let shutdown = CancellationToken::new();

        assert!(h.scheduler.start(&shutdown).await);
        for _ in 0..100 {
            if h.executor.call_count() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(h.executor.call_count(), 1);

        shutdown.cancel();
        for _ in 0..100 {
            if !h.scheduler.is_running().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!h.scheduler.is_running().await);
        h.scheduler.stop().await;
    }
}
