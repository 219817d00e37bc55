// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run a single scheduler cycle and exit

use anyhow::{Context, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use monitor_core::application::CycleOutcome;
use monitor_core::domain::service_config::MonitorServiceConfig;

use crate::daemon::{shutdown_signal, MonitorServices};

pub async fn execute(config: MonitorServiceConfig) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;

    let services = MonitorServices::connect(&config).await?;

    // Ctrl+C stops the cycle between units of work
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let outcome = services.scheduler.run_cycle(&cancel).await?;
    println!("{}", describe(outcome));

    Ok(())
}

fn describe(outcome: CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Skipped => "Scheduler lock is held by another instance; cycle skipped"
            .yellow()
            .to_string(),
        CycleOutcome::Completed {
            triggered,
            failed,
            reconciled,
        } => format!(
            "{} triggered: {}, failed: {}, runs updated: {}",
            "✓ Cycle completed.".green(),
            triggered,
            failed,
            reconciled
        ),
    }
}
