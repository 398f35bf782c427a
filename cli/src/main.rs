// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Chaos CLI
//!
//! The `chaosctl` binary drives the experiment core from a terminal.
//!
//! ## Commands
//!
//! - `chaosctl experiment classify` - Reconcile a manifest and print its canonical form
//! - `chaosctl run score` - Score a completed run's execution data
//! - `chaosctl config show|validate|generate` - Configuration management
//! - `chaosctl db migrate` - Create the PostgreSQL schema

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use chaos_core::config::{ChaosNodeConfig, LogFormat, LoggingConfig};
use chaos_orchestrator::commands::{self, ConfigCommand, DbCommand, ExperimentCommand, RunCommand};

/// Chaos experiment reconciliation and resiliency scoring
#[derive(Parser)]
#[command(name = "chaosctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CHAOS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "CHAOS_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Experiment manifest operations
    #[command(name = "experiment")]
    Experiment {
        #[command(subcommand)]
        command: ExperimentCommand,
    },

    /// Experiment run operations
    #[command(name = "run")]
    Run {
        #[command(subcommand)]
        command: RunCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Database management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Discovery logs go to a compact stderr subscriber until the configured
    // format is known.
    let bootstrap_level = cli.log_level.clone().unwrap_or_else(|| LoggingConfig::default().level);
    let bootstrap = build_subscriber(&bootstrap_level, LogFormat::Compact)?;
    let config = tracing::subscriber::with_default(bootstrap, || {
        ChaosNodeConfig::load_or_default(cli.config.clone())
    })
    .context("Failed to load configuration")?;

    let logging = &config.spec.observability.logging;
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    init_logging(level, logging.format)?;
    debug!(node = %config.metadata.name, "Configuration loaded");

    match cli.command {
        Some(Commands::Experiment { command }) => commands::experiment::handle_command(command).await,
        Some(Commands::Run { command }) => commands::run::handle_command(command, &config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Db { command }) => commands::db::handle_command(command, &config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    tracing::subscriber::set_global_default(build_subscriber(level, format)?)
        .context("Failed to install log subscriber")
}

fn build_subscriber(level: &str, format: LogFormat) -> Result<Box<dyn tracing::Subscriber + Send + Sync>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    Ok(match format {
        LogFormat::Compact => Box::new(builder.compact().finish()),
        LogFormat::Json => Box::new(builder.json().finish()),
    })
}
