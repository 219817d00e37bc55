// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the persistence contracts defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve monitors and their runs
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL
//!
//! - **PostgresMonitorRepository** - Monitor definitions and schedule state
//! - **PostgresMonitorRunRepository** - Run history and status
//! - **PostgresSchedulerLock** - Transaction-scoped advisory lock
//!
//! ## In-Memory
//!
//! - **InMemoryMonitorStore** - Monitors and runs in one shared map pair, so
//!   deletes cascade the same way the foreign key does in PostgreSQL
//! - **InMemorySchedulerLock** - Process-local try-lock
//!
//! # Usage
//!
//! ```no_run
//! use chrono::Utc;
//! use monitor_core::domain::repository::MonitorRepository;
//! use monitor_core::infrastructure::repositories::PostgresMonitorRepository;
//! use sqlx::PgPool;
//!
//! # async fn due_monitors(database_url: &str) -> anyhow::Result<()> {
//! let pool = PgPool::connect(database_url).await?;
//! let repo = PostgresMonitorRepository::new(pool);
//!
//! let due = repo.find_due(Utc::now()).await?;
//! println!("{} monitors due", due.len());
//! # Ok(())
//! # }
//! ```

pub mod postgres_monitor;
pub mod postgres_monitor_run;
pub mod postgres_scheduler_lock;

pub use postgres_monitor::PostgresMonitorRepository;
pub use postgres_monitor_run::PostgresMonitorRunRepository;
pub use postgres_scheduler_lock::PostgresSchedulerLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::monitor::{Monitor, MonitorId};
use crate::domain::monitor_run::{InFlightRun, MonitorRun, MonitorRunId, RunStatus};
use crate::domain::repository::{
    HeldLock, MonitorFilter, MonitorRepository, MonitorRunRepository, RepositoryError, SchedulerLock,
};

#[derive(Default)]
struct StoreState {
    monitors: HashMap<MonitorId, Monitor>,
    runs: HashMap<MonitorRunId, MonitorRun>,
}

/// In-memory backing for both monitor and run repositories.
#[derive(Clone, Default)]
pub struct InMemoryMonitorStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryMonitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a monitor directly, bypassing name uniqueness checks.
    pub fn insert_monitor(&self, monitor: Monitor) {
        self.write().monitors.insert(monitor.id, monitor);
    }

    // A poisoned lock only means a writer panicked mid-test; the maps stay usable.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MonitorRepository for InMemoryMonitorStore {
    async fn create(&self, monitor: &Monitor) -> Result<(), RepositoryError> {
        let mut state = self.write();
        let taken = state
            .monitors
            .values()
            .any(|m| m.org_name == monitor.org_name && m.name == monitor.name);
        if taken {
            return Err(RepositoryError::Conflict(format!(
                "monitor '{}' already exists in organization '{}'",
                monitor.name, monitor.org_name
            )));
        }
        state.monitors.insert(monitor.id, monitor.clone());
        Ok(())
    }

    async fn update_definition(&self, monitor: &Monitor) -> Result<(), RepositoryError> {
        let mut state = self.write();
        let existing = state
            .monitors
            .get_mut(&monitor.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("monitor {}", monitor.id)))?;
        existing.display_name = monitor.display_name.clone();
        existing.evaluators = monitor.evaluators.clone();
        existing.sampling_rate = monitor.sampling_rate;
        existing.interval_minutes = monitor.interval_minutes;
        existing.updated_at = monitor.updated_at;
        Ok(())
    }

    async fn find_by_id(&self, id: MonitorId) -> Result<Option<Monitor>, RepositoryError> {
        Ok(self.read().monitors.get(&id).cloned())
    }

    async fn find_by_name(&self, org_name: &str, name: &str) -> Result<Option<Monitor>, RepositoryError> {
        Ok(self
            .read()
            .monitors
            .values()
            .find(|m| m.org_name == org_name && m.name == name)
            .cloned())
    }

    async fn list(&self, org_name: &str, filter: &MonitorFilter) -> Result<Vec<Monitor>, RepositoryError> {
        let mut monitors: Vec<Monitor> = self
            .read()
            .monitors
            .values()
            .filter(|m| m.org_name == org_name && filter.matches(m))
            .cloned()
            .collect();
        monitors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(monitors)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Monitor>, RepositoryError> {
        let mut due: Vec<Monitor> = self
            .read()
            .monitors
            .values()
            .filter(|m| m.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|m| m.next_run_time);
        Ok(due)
    }

    async fn advance_next_run_time(
        &self,
        id: MonitorId,
        next_run_time: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.write();
        match state.monitors.get_mut(&id) {
            Some(monitor) if monitor.next_run_time.is_some() => {
                monitor.next_run_time = Some(next_run_time);
                monitor.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn suspend_schedule(&self, id: MonitorId) -> Result<bool, RepositoryError> {
        let mut state = self.write();
        match state.monitors.get_mut(&id) {
            Some(monitor) if monitor.is_future() && monitor.next_run_time.is_some() => {
                monitor.next_run_time = None;
                monitor.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn resume_schedule(
        &self,
        id: MonitorId,
        next_run_time: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.write();
        match state.monitors.get_mut(&id) {
            Some(monitor) if monitor.is_future() && monitor.next_run_time.is_none() => {
                monitor.next_run_time = Some(next_run_time);
                monitor.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: MonitorId) -> Result<(), RepositoryError> {
        let mut state = self.write();
        state.monitors.remove(&id);
        state.runs.retain(|_, run| run.monitor_id != id);
        Ok(())
    }
}

#[async_trait]
impl MonitorRunRepository for InMemoryMonitorStore {
    async fn create(&self, run: &MonitorRun) -> Result<(), RepositoryError> {
        let mut state = self.write();
        if !state.monitors.contains_key(&run.monitor_id) {
            return Err(RepositoryError::NotFound(format!("monitor {}", run.monitor_id)));
        }
        state.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: MonitorRunId) -> Result<Option<MonitorRun>, RepositoryError> {
        Ok(self.read().runs.get(&id).cloned())
    }

    async fn find_latest(&self, monitor_id: MonitorId) -> Result<Option<MonitorRun>, RepositoryError> {
        Ok(self
            .read()
            .runs
            .values()
            .filter(|r| r.monitor_id == monitor_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn list_by_monitor(
        &self,
        monitor_id: MonitorId,
        limit: Option<usize>,
    ) -> Result<Vec<MonitorRun>, RepositoryError> {
        let mut runs: Vec<MonitorRun> = self
            .read()
            .runs
            .values()
            .filter(|r| r.monitor_id == monitor_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            runs.truncate(limit);
        }
        Ok(runs)
    }

    async fn find_in_flight(&self) -> Result<Vec<InFlightRun>, RepositoryError> {
        let state = self.read();
        let mut in_flight: Vec<InFlightRun> = state
            .runs
            .values()
            .filter(|r| !r.status.is_terminal())
            .filter_map(|run| {
                state.monitors.get(&run.monitor_id).map(|monitor| InFlightRun {
                    run: run.clone(),
                    org_name: monitor.org_name.clone(),
                })
            })
            .collect();
        in_flight.sort_by_key(|f| f.run.created_at);
        Ok(in_flight)
    }

    async fn update_status(
        &self,
        id: MonitorRunId,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.write();
        let run = state
            .runs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("monitor run {}", id)))?;
        run.status = status;
        run.error_message = error_message.map(str::to_string);
        run.updated_at = Utc::now();
        Ok(())
    }
}

/// Process-local scheduler lock.
///
/// Clones share the same underlying mutex, so two schedulers built from clones
/// of one lock contend exactly like two replicas on the database lock.
#[derive(Clone, Default)]
pub struct InMemorySchedulerLock {
    inner: Arc<Mutex<()>>,
}

impl InMemorySchedulerLock {
    pub fn new() -> Self {
        Self::default()
    }
}

struct InMemoryLockGuard {
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl HeldLock for InMemoryLockGuard {
    async fn release(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl SchedulerLock for InMemorySchedulerLock {
    async fn try_acquire(&self) -> Result<Option<Box<dyn HeldLock>>, RepositoryError> {
        match self.inner.clone().try_lock_owned() {
            Ok(guard) => Ok(Some(Box::new(InMemoryLockGuard { _guard: guard }))),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::monitor::{Evaluator, MonitorType};
    use chrono::Duration;

    fn monitor(org: &str, name: &str, created_at: DateTime<Utc>) -> Monitor {
        Monitor {
            id: MonitorId::new(),
            name: name.to_string(),
            display_name: name.to_string(),
            monitor_type: MonitorType::Future,
            org_name: org.to_string(),
            project_name: "default".to_string(),
            agent_name: "support-bot".to_string(),
            agent_id: "agent-uid".to_string(),
            environment_name: "production".to_string(),
            environment_id: "env-uid".to_string(),
            evaluators: vec![Evaluator::new("tone", "Tone")],
            sampling_rate: 1.0,
            interval_minutes: Some(10),
            next_run_time: Some(created_at),
            trace_start: None,
            trace_end: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn run_for(monitor: &Monitor, created_at: DateTime<Utc>) -> MonitorRun {
        let mut run = MonitorRun::pending(
            MonitorRunId::new(),
            monitor.id,
            format!("{}-abcd1234", monitor.name),
            created_at - Duration::minutes(10),
            created_at,
            monitor.evaluators.clone(),
        );
        run.created_at = created_at;
        run
    }

    #[tokio::test]
    async fn test_names_are_unique_per_org() {
        let store = InMemoryMonitorStore::new();
        let now = Utc::now();
        MonitorRepository::create(&store, &monitor("acme", "tone", now)).await.unwrap();
        MonitorRepository::create(&store, &monitor("globex", "tone", now)).await.unwrap();

        let err = MonitorRepository::create(&store, &monitor("acme", "tone", now))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_newest_first() {
        let store = InMemoryMonitorStore::new();
        let now = Utc::now();
        let older = monitor("acme", "older", now - Duration::hours(1));
        let newer = monitor("acme", "newer", now);
        store.insert_monitor(older.clone());
        store.insert_monitor(newer.clone());
        store.insert_monitor(monitor("globex", "other", now));

        let listed = store.list("acme", &MonitorFilter::default()).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn test_find_due_skips_suspended_and_past() {
        let store = InMemoryMonitorStore::new();
        let now = Utc::now();
        let due = monitor("acme", "due", now - Duration::minutes(1));
        let mut later = monitor("acme", "later", now);
        later.next_run_time = Some(now + Duration::minutes(5));
        let mut suspended = monitor("acme", "suspended", now);
        suspended.next_run_time = None;
        let mut past = monitor("acme", "past", now);
        past.monitor_type = MonitorType::Past;

        for m in [due.clone(), later, suspended, past] {
            store.insert_monitor(m);
        }

        let found = store.find_due(now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_runs() {
        let store = InMemoryMonitorStore::new();
        let now = Utc::now();
        let doomed = monitor("acme", "doomed", now);
        let kept = monitor("acme", "kept", now);
        store.insert_monitor(doomed.clone());
        store.insert_monitor(kept.clone());
        MonitorRunRepository::create(&store, &run_for(&doomed, now)).await.unwrap();
        MonitorRunRepository::create(&store, &run_for(&kept, now)).await.unwrap();

        MonitorRepository::delete(&store, doomed.id).await.unwrap();

        assert!(store.list_by_monitor(doomed.id, None).await.unwrap().is_empty());
        assert_eq!(store.list_by_monitor(kept.id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_runs_carry_org() {
        let store = InMemoryMonitorStore::new();
        let now = Utc::now();
        let m = monitor("acme", "tone", now);
        store.insert_monitor(m.clone());
        let running = run_for(&m, now - Duration::minutes(2));
        let done = run_for(&m, now);
        MonitorRunRepository::create(&store, &running).await.unwrap();
        MonitorRunRepository::create(&store, &done).await.unwrap();
        store
            .update_status(done.id, RunStatus::Succeeded, None)
            .await
            .unwrap();

        let in_flight = store.find_in_flight().await.unwrap();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].run.id, running.id);
        assert_eq!(in_flight[0].org_name, "acme");
    }

    #[tokio::test]
    async fn test_latest_and_limit() {
        let store = InMemoryMonitorStore::new();
        let now = Utc::now();
        let m = monitor("acme", "tone", now);
        store.insert_monitor(m.clone());
        for offset in [30, 20, 10] {
            MonitorRunRepository::create(&store, &run_for(&m, now - Duration::minutes(offset)))
                .await
                .unwrap();
        }

        let latest = store.find_latest(m.id).await.unwrap().unwrap();
        assert_eq!(latest.created_at, now - Duration::minutes(10));
        assert_eq!(store.list_by_monitor(m.id, Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_definition_update_keeps_schedule() {
        let store = InMemoryMonitorStore::new();
        let now = Utc::now();
        let stored = monitor("acme", "tone", now);
        store.insert_monitor(stored.clone());

        let advanced = now + Duration::minutes(57);
        assert!(store.advance_next_run_time(stored.id, advanced).await.unwrap());

        // Edit made from a snapshot loaded before the advance
        let mut edited = stored.clone();
        edited.display_name = "Renamed".to_string();
        edited.sampling_rate = 0.25;
        store.update_definition(&edited).await.unwrap();

        let after = MonitorRepository::find_by_id(&store, stored.id).await.unwrap().unwrap();
        assert_eq!(after.display_name, "Renamed");
        assert_eq!(after.sampling_rate, 0.25);
        assert_eq!(after.next_run_time, Some(advanced));
    }

    #[tokio::test]
    async fn test_advance_skips_stopped_monitor() {
        let store = InMemoryMonitorStore::new();
        let now = Utc::now();
        let m = monitor("acme", "tone", now);
        store.insert_monitor(m.clone());

        assert!(store.suspend_schedule(m.id).await.unwrap());
        assert!(!store.suspend_schedule(m.id).await.unwrap());
        assert!(!store
            .advance_next_run_time(m.id, now + Duration::minutes(10))
            .await
            .unwrap());

        let after = MonitorRepository::find_by_id(&store, m.id).await.unwrap().unwrap();
        assert_eq!(after.next_run_time, None);

        assert!(store.resume_schedule(m.id, now).await.unwrap());
        assert!(!store.resume_schedule(m.id, now).await.unwrap());
        assert!(!store.advance_next_run_time(MonitorId::new(), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_scheduler_lock_is_exclusive() {
        let lock = InMemorySchedulerLock::new();
        let replica = lock.clone();

        let held = lock.try_acquire().await.unwrap().expect("first acquire succeeds");
        assert!(replica.try_acquire().await.unwrap().is_none());

        held.release().await.unwrap();
        assert!(replica.try_acquire().await.unwrap().is_some());
    }
}
