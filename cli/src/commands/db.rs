// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Commands
//!
//! `chaosctl db migrate` creates the experiment, revision, run and
//! infrastructure tables. Statements are idempotent, so running it against
//! an up-to-date database is a no-op.
//!
//! # Environment
//!
//! The connection URL comes from `--database-url`, `CHAOS_DATABASE_URL`, or
//! `spec.storage.database_url`, in that order.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use chaos_core::config::ChaosNodeConfig;
use chaos_core::infrastructure::db::Database;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Create or update the PostgreSQL schema
    Migrate {
        /// PostgreSQL connection URL
        #[arg(long, env = "CHAOS_DATABASE_URL")]
        database_url: Option<String>,
    },
}

pub async fn handle_command(command: DbCommand, config: &ChaosNodeConfig) -> Result<()> {
    match command {
        DbCommand::Migrate { database_url } => migrate(database_url, config).await,
    }
}

async fn migrate(database_url: Option<String>, config: &ChaosNodeConfig) -> Result<()> {
    let database_url = database_url
        .or_else(|| config.spec.storage.database_url.clone())
        .context("No database URL. Set --database-url, CHAOS_DATABASE_URL or spec.storage.database_url")?;

    println!("Connecting to database...");
    let db = Database::new(&database_url, 1)
        .await
        .context("Failed to connect to database")?;

    println!("Applying schema...");
    db.migrate().await.context("Failed to apply schema")?;
    println!("{}", "✓ Database schema is up to date.".green());

    Ok(())
}
