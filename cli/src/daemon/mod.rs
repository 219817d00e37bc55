// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon mode implementation
//!
//! Handles:
//! - Wiring repositories, the workflow plane client and the scheduler
//! - HTTP health checks and the Prometheus exporter
//! - Graceful shutdown

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use monitor_core::application::{
    MonitorExecutor, MonitorManager, MonitorScheduler, MonitorSchedulerConfig,
    StandardMonitorExecutor, StandardMonitorManager,
};
use monitor_core::domain::service_config::MonitorServiceConfig;
use monitor_core::infrastructure::db::Database;
use monitor_core::infrastructure::repositories::{
    PostgresMonitorRepository, PostgresMonitorRunRepository, PostgresSchedulerLock,
};
use monitor_core::infrastructure::WorkflowPlaneClient;

pub mod server;

pub use server::start_daemon;

/// Fully wired engine services backed by PostgreSQL and the workflow plane.
pub struct MonitorServices {
    pub database: Database,
    pub manager: Arc<dyn MonitorManager>,
    pub scheduler: Arc<MonitorScheduler>,
}

impl MonitorServices {
    pub async fn connect(config: &MonitorServiceConfig) -> Result<Self> {
        let database = Database::new(&config.spec.database.url, config.spec.database.max_connections)
            .await
            .context("Failed to initialize database pool")?;
        info!("Connected to database");

        Self::build(config, database)
    }

    pub fn build(config: &MonitorServiceConfig, database: Database) -> Result<Self> {
        let pool = database.get_pool().clone();
        let monitor_repository = Arc::new(PostgresMonitorRepository::new(pool.clone()));
        let run_repository = Arc::new(PostgresMonitorRunRepository::new(pool.clone()));
        let lock = Arc::new(PostgresSchedulerLock::new(pool, config.spec.scheduler.lock_key));

        let workflow_plane = Arc::new(
            WorkflowPlaneClient::from_config(&config.spec.workflow_plane, config.resolved_api_token())
                .context("Failed to build workflow plane client")?,
        );

        let executor: Arc<dyn MonitorExecutor> = Arc::new(StandardMonitorExecutor::new(
            workflow_plane.clone(),
            monitor_repository.clone(),
            run_repository.clone(),
            config.spec.workflow_plane.workflow_template.clone(),
        ));

        let manager = Arc::new(StandardMonitorManager::new(
            monitor_repository.clone(),
            run_repository.clone(),
            executor.clone(),
            workflow_plane.clone(),
            workflow_plane.clone(),
            workflow_plane.clone(),
        ));

        let scheduler = Arc::new(MonitorScheduler::new(
            monitor_repository,
            run_repository,
            executor,
            workflow_plane,
            lock,
            scheduler_config(config),
        ));

        Ok(Self {
            database,
            manager,
            scheduler,
        })
    }
}

pub fn scheduler_config(config: &MonitorServiceConfig) -> MonitorSchedulerConfig {
    MonitorSchedulerConfig {
        interval_seconds: config.spec.scheduler.poll_interval_seconds,
        enabled: config.spec.scheduler.enabled,
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
