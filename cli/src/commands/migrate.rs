// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Apply the embedded database schema migrations

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use monitor_core::domain::service_config::MonitorServiceConfig;
use monitor_core::infrastructure::db::Database;

#[derive(Args)]
pub struct MigrateCommand {
    /// Report pending migrations without applying them
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: MigrateCommand, config: &MonitorServiceConfig) -> Result<()> {
    println!("{}", "Agent Monitor Migrations".bold().green());

    println!("Connecting to database...");
    let database = Database::new(&config.spec.database.url, 1).await?;

    let status = database.migration_status().await?;
    println!(
        "Migration status: {} applied, {} total available.",
        status.applied, status.available
    );

    if status.pending.is_empty() {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for (version, description) in &status.pending {
            println!(" - {} {}", version, description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying pending migrations...");
    database.migrate().await?;
    println!("{}", "✓ Database updated successfully.".green());

    Ok(())
}
