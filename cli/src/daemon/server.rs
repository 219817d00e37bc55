// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon HTTP server implementation

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use monitor_core::application::MonitorScheduler;
use monitor_core::domain::service_config::MonitorServiceConfig;

use super::{shutdown_signal, MonitorServices};

// Application state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<MonitorScheduler>,
    pub start_time: std::time::Instant,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(Arc::new(state))
}

pub async fn start_daemon(config: MonitorServiceConfig, apply_migrations: bool) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        name = %config.metadata.name,
        scheduler_enabled = config.spec.scheduler.enabled,
        poll_interval_seconds = config.spec.scheduler.poll_interval_seconds,
        "Agent monitor daemon starting"
    );

    if let Some(port) = config.spec.observability.metrics_port {
        let addr = socket_addr(&config.spec.server.bind_address, port)?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics exposed on {}", addr);
    }

    let services = MonitorServices::connect(&config).await?;
    if apply_migrations {
        services.database.migrate().await?;
        info!("Database migrations applied");
    }

    let shutdown = CancellationToken::new();
    services.scheduler.start(&shutdown).await;

    let app = router(AppState {
        scheduler: services.scheduler.clone(),
        start_time: std::time::Instant::now(),
    });

    let addr = socket_addr(&config.spec.server.bind_address, config.spec.server.port)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Daemon listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Daemon shutting down");
    shutdown.cancel();
    services.scheduler.stop().await;

    Ok(())
}

fn socket_addr(bind_address: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "scheduler_running": state.scheduler.is_running().await,
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}
