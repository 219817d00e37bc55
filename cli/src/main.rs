// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Agent Monitor CLI
//!
//! The `agent-monitor` binary hosts the monitor scheduling engine.
//!
//! ## Commands
//!
//! - `agent-monitor serve [--migrate]` - Run the scheduler daemon with health checks
//! - `agent-monitor run-once` - Execute a single scheduler cycle and exit
//! - `agent-monitor migrate [--dry-run]` - Apply database schema migrations
//! - `agent-monitor config show|validate` - Configuration management

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use agent_monitor::commands::{self, ConfigCommand, MigrateCommand};
use agent_monitor::daemon;
use agent_monitor::logging::init_logging;
use monitor_core::domain::service_config::MonitorServiceConfig;

/// Agent Monitor - Scheduled evaluation of agent traces
#[derive(Parser)]
#[command(name = "agent-monitor")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "MONITOR_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true, env = "MONITOR_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (compact, json); overrides the config file
    #[arg(long, global = true, env = "MONITOR_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler daemon
    #[command(name = "serve")]
    Serve {
        /// Apply pending database migrations before starting
        #[arg(long)]
        migrate: bool,
    },

    /// Run a single scheduler cycle and exit
    #[command(name = "run-once")]
    RunOnce,

    /// Apply database migrations
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match MonitorServiceConfig::load_or_default(cli.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(
                cli.log_level.as_deref().unwrap_or("info"),
                cli.log_format.as_deref().unwrap_or("compact"),
            )?;
            return Err(e);
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.spec.observability.log_level.clone());
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.spec.observability.log_format.clone());
    init_logging(&level, &format)?;

    match cli.command {
        Some(Commands::Serve { migrate }) => {
            info!("Starting agent monitor in daemon mode");
            daemon::start_daemon(config, migrate).await
        }
        Some(Commands::RunOnce) => commands::run_once::execute(config).await,
        Some(Commands::Migrate { command }) => commands::migrate::execute(command, &config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
