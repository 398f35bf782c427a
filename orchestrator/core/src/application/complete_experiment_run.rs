// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Complete Experiment Run Use Case
//!
//! Scores a finished run against the weight table of the revision it was
//! launched from. Read-only: nothing is written back.
//!
//! # Flow
//!
//! 1. Load the experiment; `NotFound` when missing
//! 2. Pick the revision named by the run's execution data; `NotFound` when missing
//! 3. Score the reported fault nodes with the configured match mode

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::domain::error::ChaosExperimentError;
use crate::domain::experiment::{ExperimentId, RunId};
use crate::domain::experiment_run::{ExecutionData, ResiliencyResult};
use crate::domain::repository::ExperimentRepository;
use crate::domain::resiliency::ResiliencyScorer;

/// Decode execution data as reported by the agent.
///
/// Unknown fault verdicts and malformed payloads are validation failures.
pub fn parse_execution_data(raw: &str) -> Result<ExecutionData, ChaosExperimentError> {
    serde_json::from_str(raw)
        .map_err(|e| ChaosExperimentError::Validation(format!("invalid execution data: {}", e)))
}

#[async_trait]
pub trait CompleteExperimentRunUseCase: Send + Sync {
    async fn process_completed_run(
        &self,
        execution_data: &ExecutionData,
        experiment_id: &ExperimentId,
        run_id: &RunId,
    ) -> Result<ResiliencyResult, ChaosExperimentError>;
}

pub struct StandardCompleteExperimentRunUseCase {
    experiment_repository: Arc<dyn ExperimentRepository>,
    scorer: ResiliencyScorer,
}

impl StandardCompleteExperimentRunUseCase {
    pub fn new(experiment_repository: Arc<dyn ExperimentRepository>, scorer: ResiliencyScorer) -> Self {
        Self {
            experiment_repository,
            scorer,
        }
    }
}

#[async_trait]
impl CompleteExperimentRunUseCase for StandardCompleteExperimentRunUseCase {
    async fn process_completed_run(
        &self,
        execution_data: &ExecutionData,
        experiment_id: &ExperimentId,
        run_id: &RunId,
    ) -> Result<ResiliencyResult, ChaosExperimentError> {
        let experiment = self
            .experiment_repository
            .find_by_id(experiment_id)
            .await?
            .ok_or_else(|| ChaosExperimentError::NotFound(format!("experiment {}", experiment_id)))?;

        let revision_id = &execution_data.revision_id;
        let revision = experiment.revision(revision_id).ok_or_else(|| {
            ChaosExperimentError::NotFound(format!(
                "revision {} of experiment {}",
                revision_id, experiment_id
            ))
        })?;

        let result = self.scorer.score(&revision.weight_table, execution_data);

        info!(
            experiment_id = %experiment_id,
            run_id = %run_id,
            revision_id = %revision_id,
            score = result.resiliency_score,
            match_mode = %self.scorer.mode(),
            "Scored completed experiment run"
        );
        metrics::histogram!("chaos_resiliency_score").record(result.resiliency_score);

        Ok(result)
    }
}
