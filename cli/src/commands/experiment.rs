// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Experiment manifest commands
//!
//! Commands: classify

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use chaos_core::domain::experiment::{ExperimentId, FaultWeight, WeightTable};
use chaos_core::domain::manifest::{IdentityLabels, Reconciliation};
use chaos_core::infrastructure::manifest_parser::ChaosManifest;

use super::parse_weight;

#[derive(Subcommand)]
pub enum ExperimentCommand {
    /// Reconcile a manifest: stamp identity labels and fault weights, print the canonical form
    Classify {
        /// Path to the experiment manifest (JSON or YAML)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Experiment name; must match the manifest's metadata.name
        #[arg(long)]
        name: String,

        /// Infrastructure the experiment targets
        #[arg(long)]
        infra_id: String,

        /// Revision identity to stamp
        #[arg(long, default_value = "rev-0")]
        revision_id: String,

        /// Experiment identity to stamp (generated when omitted)
        #[arg(long)]
        experiment_id: Option<String>,

        /// Declared fault weight, repeatable
        #[arg(short, long = "weight", value_name = "FAULT=WEIGHT", value_parser = parse_weight)]
        weights: Vec<FaultWeight>,

        /// Emit the full result as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: ExperimentCommand) -> Result<()> {
    match command {
        ExperimentCommand::Classify {
            manifest,
            name,
            infra_id,
            revision_id,
            experiment_id,
            weights,
            json,
        } => {
            let experiment_id = experiment_id
                .filter(|id| !id.is_empty())
                .map(ExperimentId::from)
                .unwrap_or_else(ExperimentId::generate);
            let identity = IdentityLabels::new(experiment_id, infra_id.into(), revision_id.into());
            classify(manifest, &name, &identity, weights.iter().collect(), json).await
        }
    }
}

async fn classify(
    path: PathBuf,
    name: &str,
    identity: &IdentityLabels,
    declared: WeightTable,
    json: bool,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read manifest {:?}", path))?;

    let result = ChaosManifest::classify(&raw, name, identity, &declared)
        .with_context(|| format!("Manifest {:?} failed validation", path))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&result)?)?);
        return Ok(());
    }

    println!("{}", format!("✓ {} '{}' reconciled", result.kind, name).green());
    println!("  Experiment ID: {}", identity.experiment_id);
    println!("  Revision ID: {}", identity.revision_id);
    if let Some(cron) = &result.cron_syntax {
        println!("  Schedule: {}", cron);
    }
    println!();

    println!("{}", "Fault weights:".bold());
    for (fault, weight) in result.weight_table.iter() {
        let inferred = result.inferred_weights.iter().any(|w| w.fault_name == fault);
        let origin = if inferred { "inferred".dimmed() } else { "declared".normal() };
        println!("  {:<32} {:>5}  {}", fault, weight, origin);
    }
    println!();

    println!("{}", "Manifest:".bold());
    println!("{}", result.manifest);

    Ok(())
}

fn to_json(result: &Reconciliation) -> Result<serde_json::Value> {
    let manifest: serde_json::Value =
        serde_json::from_str(&result.manifest).context("Reconciled manifest is not valid JSON")?;
    Ok(serde_json::json!({
        "kind": result.kind,
        "cronSyntax": result.cron_syntax,
        "inferredWeights": result.inferred_weights,
        "weightTable": result.weight_table,
        "manifest": manifest,
    }))
}
