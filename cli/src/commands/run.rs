// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Experiment run commands
//!
//! Commands: score

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use chaos_core::application::{
    create_repositories, parse_execution_data, CompleteExperimentRunUseCase, StandardCompleteExperimentRunUseCase,
};
use chaos_core::config::ChaosNodeConfig;
use chaos_core::domain::experiment::{FaultWeight, WeightTable};
use chaos_core::domain::experiment_run::ResiliencyResult;
use chaos_core::domain::repository::StorageBackend;
use chaos_core::domain::resiliency::{MatchMode, ResiliencyScorer};

use super::parse_weight;

#[derive(Subcommand)]
pub enum RunCommand {
    /// Compute the resiliency score of a completed run
    Score {
        /// Path to the run's execution data (JSON)
        #[arg(value_name = "EXECUTION_DATA")]
        execution_data: PathBuf,

        /// Score against these weights instead of the stored revision, repeatable
        #[arg(short, long = "weight", value_name = "FAULT=WEIGHT", value_parser = parse_weight)]
        weights: Vec<FaultWeight>,

        /// Experiment whose stored revision supplies the weights
        #[arg(long, conflicts_with = "weights")]
        experiment_id: Option<String>,

        /// Run identity, used for logging only
        #[arg(long, default_value = "cli")]
        run_id: String,

        /// Override the configured match mode (substring, exact)
        #[arg(long)]
        match_mode: Option<MatchMode>,

        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: RunCommand, config: &ChaosNodeConfig) -> Result<()> {
    match command {
        RunCommand::Score {
            execution_data,
            weights,
            experiment_id,
            run_id,
            match_mode,
            json,
        } => {
            let raw = tokio::fs::read_to_string(&execution_data)
                .await
                .with_context(|| format!("Failed to read execution data {:?}", execution_data))?;
            let data = parse_execution_data(&raw)?;
            let scorer = match_mode.map(ResiliencyScorer::new).unwrap_or_else(|| config.scorer());

            let result = match experiment_id {
                Some(experiment_id) => {
                    let repositories = create_repositories(&stored_weights_backend(config)?).await?;
                    StandardCompleteExperimentRunUseCase::new(repositories.experiments, scorer)
                        .process_completed_run(&data, &experiment_id.into(), &run_id.into())
                        .await?
                }
                None if !weights.is_empty() => {
                    let table: WeightTable = weights.iter().collect();
                    scorer.score(&table, &data)
                }
                None => bail!("Either --weight or --experiment-id is required"),
            };

            render(&result, json)
        }
    }
}

/// Backend holding experiments written by earlier invocations. A fresh
/// in-memory store never does.
fn stored_weights_backend(config: &ChaosNodeConfig) -> Result<StorageBackend> {
    match config.storage_backend()? {
        StorageBackend::InMemory => bail!(
            "--experiment-id needs a persistent store: set spec.storage.backend to postgres \
             (or CHAOS_DATABASE_URL), or pass --weight instead"
        ),
        backend => Ok(backend),
    }
}

fn render(result: &ResiliencyResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let score = format!("{:.2}", result.resiliency_score);
    let score = if result.resiliency_score >= 0.5 { score.green() } else { score.red() };
    println!("{} {}", "Resiliency score:".bold(), score);
    println!("  Faults weighted: {}", result.total_experiments);
    println!("  Passed: {}", result.faults_passed);
    println!("  Failed: {}", result.faults_failed);
    println!("  Awaited: {}", result.faults_awaited);
    println!("  Stopped: {}", result.faults_stopped);
    println!("  N/A: {}", result.faults_na);

    Ok(())
}
