// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Experiment Lifecycle Use Case
//!
//! Create, update and soft-delete of experiment records and their runs.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Persist revisions, run the soft-delete transaction, notify subscribers
//! - **Collaborators:**
//!   - Domain: Experiment aggregate, ExperimentRun aggregate
//!   - Infrastructure: ExperimentRepository, ExperimentRunRepository, ExperimentNotifier
//!
//! # Notification
//!
//! Every operation takes an optional notifier. The notifier is only called
//! after the write has been committed, and its failure is logged and
//! counted but never returned.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::process_experiment::ProcessedExperiment;
use crate::domain::dispatch::{DispatchIntent, DispatchPayload, DispatchRequest, ExperimentNotifier};
use crate::domain::error::ChaosExperimentError;
use crate::domain::experiment::{Actor, Experiment, ExperimentKey, ProjectId};
use crate::domain::experiment_run::ExperimentRun;
use crate::domain::repository::{ExperimentRepository, ExperimentRunRepository, ExperimentTransaction};

/// How an update treats the revision list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionUpdate {
    /// Replace experiment-level fields and append the revision
    Append,
    /// Patch the manifest of the existing revision with the same id; used
    /// by the enable/disable toggle of scheduled kinds
    ReplaceInPlace,
}

impl RevisionUpdate {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionUpdate::Append => "append",
            RevisionUpdate::ReplaceInPlace => "replace_in_place",
        }
    }
}

#[async_trait]
pub trait ExperimentLifecycleUseCase: Send + Sync {
    /// Persist a new experiment holding its first revision.
    ///
    /// # Errors
    ///
    /// - `Conflict`: an experiment with the same id exists
    /// - `Storage`: persistence failed
    async fn create_experiment(
        &self,
        project_id: &ProjectId,
        processed: &ProcessedExperiment,
        actor: &Actor,
        notifier: Option<&dyn ExperimentNotifier>,
    ) -> Result<Experiment, ChaosExperimentError>;

    async fn update_experiment(
        &self,
        project_id: &ProjectId,
        processed: &ProcessedExperiment,
        actor: &Actor,
        mode: RevisionUpdate,
        notifier: Option<&dyn ExperimentNotifier>,
    ) -> Result<(), ChaosExperimentError>;

    /// Soft-delete the experiment and every one of its runs atomically.
    async fn delete_experiment(
        &self,
        experiment: &Experiment,
        actor: &Actor,
        notifier: Option<&dyn ExperimentNotifier>,
    ) -> Result<(), ChaosExperimentError>;

    /// Write `is_removed` on a single run.
    async fn delete_experiment_run(
        &self,
        run: &ExperimentRun,
        is_removed: bool,
        actor: &Actor,
        notifier: Option<&dyn ExperimentNotifier>,
    ) -> Result<(), ChaosExperimentError>;
}

pub struct StandardExperimentLifecycleUseCase {
    experiment_repository: Arc<dyn ExperimentRepository>,
    run_repository: Arc<dyn ExperimentRunRepository>,
}

impl StandardExperimentLifecycleUseCase {
    pub fn new(
        experiment_repository: Arc<dyn ExperimentRepository>,
        run_repository: Arc<dyn ExperimentRunRepository>,
    ) -> Self {
        Self {
            experiment_repository,
            run_repository,
        }
    }

    async fn run_delete_transaction(
        tx: &mut dyn ExperimentTransaction,
        key: &ExperimentKey,
        actor: &Actor,
    ) -> Result<u64, ChaosExperimentError> {
        let stamp = actor.stamp();
        tx.mark_experiment_removed(key, &stamp).await?;
        let runs = tx.mark_runs_removed(&key.experiment_id, &stamp).await?;
        Ok(runs)
    }
}

/// Hand a request to the notifier, if any. Failures are logged, never returned.
fn dispatch(notifier: Option<&dyn ExperimentNotifier>, request: DispatchRequest) {
    let Some(notifier) = notifier else {
        return;
    };
    let intent = request.intent;
    let infra_id = request.infra_id.clone();
    if let Err(e) = notifier.notify(request) {
        warn!(%intent, %infra_id, error = %e, "Failed to notify experiment subscriber");
        metrics::counter!("chaos_dispatch_failures_total", "intent" => intent.as_str()).increment(1);
    }
}

#[async_trait]
impl ExperimentLifecycleUseCase for StandardExperimentLifecycleUseCase {
    async fn create_experiment(
        &self,
        project_id: &ProjectId,
        processed: &ProcessedExperiment,
        actor: &Actor,
        notifier: Option<&dyn ExperimentNotifier>,
    ) -> Result<Experiment, ChaosExperimentError> {
        let experiment_id = processed.experiment_id()?.clone();
        let stamp = actor.stamp();
        let experiment = Experiment::new(
            experiment_id.clone(),
            project_id.clone(),
            processed.request.patch(processed.experiment_type),
            processed.revision.clone(),
            &stamp,
        );

        self.experiment_repository.insert(&experiment).await?;

        info!(
            experiment_id = %experiment_id,
            project_id = %project_id,
            name = experiment.name(),
            revision_id = %processed.revision.revision_id,
            kind = %processed.experiment_type,
            "Created experiment"
        );
        metrics::counter!("chaos_experiments_created_total").increment(1);

        dispatch(
            notifier,
            DispatchRequest {
                project_id: project_id.clone(),
                infra_id: experiment.infra_id.clone(),
                payload: DispatchPayload::Manifest {
                    experiment_id,
                    manifest: processed.revision.manifest.clone(),
                },
                actor: actor.username.clone(),
                intent: DispatchIntent::Create,
            },
        );
        Ok(experiment)
    }

    async fn update_experiment(
        &self,
        project_id: &ProjectId,
        processed: &ProcessedExperiment,
        actor: &Actor,
        mode: RevisionUpdate,
        notifier: Option<&dyn ExperimentNotifier>,
    ) -> Result<(), ChaosExperimentError> {
        let experiment_id = processed.experiment_id()?.clone();
        let key = ExperimentKey::new(experiment_id.clone(), project_id.clone());
        let revision = &processed.revision;
        let stamp = actor.stamp();

        match mode {
            RevisionUpdate::Append => {
                let patch = processed.request.patch(processed.experiment_type);
                self.experiment_repository
                    .append_revision(&key, &patch, revision, &stamp)
                    .await?;
            }
            RevisionUpdate::ReplaceInPlace => {
                self.experiment_repository
                    .replace_revision_manifest(&key, &revision.revision_id, &revision.manifest, &stamp)
                    .await?;
            }
        }

        info!(
            experiment_id = %experiment_id,
            project_id = %project_id,
            revision_id = %revision.revision_id,
            mode = mode.as_str(),
            "Updated experiment"
        );
        metrics::counter!("chaos_experiments_updated_total", "mode" => mode.as_str()).increment(1);

        dispatch(
            notifier,
            DispatchRequest {
                project_id: project_id.clone(),
                infra_id: processed.request.infra_id.clone(),
                payload: DispatchPayload::Manifest {
                    experiment_id,
                    manifest: revision.manifest.clone(),
                },
                actor: actor.username.clone(),
                intent: DispatchIntent::Update,
            },
        );
        Ok(())
    }

    async fn delete_experiment(
        &self,
        experiment: &Experiment,
        actor: &Actor,
        notifier: Option<&dyn ExperimentNotifier>,
    ) -> Result<(), ChaosExperimentError> {
        let key = experiment.key();
        let mut tx = self.experiment_repository.begin().await?;

        let runs = match Self::run_delete_transaction(tx.as_mut(), &key, actor).await {
            Ok(runs) => runs,
            Err(e) => {
                warn!(experiment_id = %key.experiment_id, error = %e, "Aborting experiment delete");
                if let Err(abort_err) = tx.abort().await {
                    warn!(experiment_id = %key.experiment_id, error = %abort_err, "Failed to abort experiment delete");
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        info!(
            experiment_id = %key.experiment_id,
            project_id = %key.project_id,
            name = experiment.name(),
            runs,
            "Deleted experiment"
        );
        metrics::counter!("chaos_experiments_deleted_total").increment(1);

        dispatch(
            notifier,
            DispatchRequest {
                project_id: key.project_id.clone(),
                infra_id: experiment.infra_id.clone(),
                payload: DispatchPayload::Experiment(key.experiment_id.clone()),
                actor: actor.username.clone(),
                intent: DispatchIntent::WorkflowDelete,
            },
        );
        Ok(())
    }

    async fn delete_experiment_run(
        &self,
        run: &ExperimentRun,
        is_removed: bool,
        actor: &Actor,
        notifier: Option<&dyn ExperimentNotifier>,
    ) -> Result<(), ChaosExperimentError> {
        self.run_repository
            .set_removed(&run.key(), is_removed, &actor.stamp())
            .await?;

        info!(
            run_id = %run.run_id,
            experiment_id = %run.experiment_id,
            is_removed,
            "Updated experiment run removal"
        );
        metrics::counter!("chaos_experiment_runs_deleted_total").increment(1);

        dispatch(
            notifier,
            DispatchRequest {
                project_id: run.project_id.clone(),
                infra_id: run.infra_id.clone(),
                payload: DispatchPayload::Run(run.run_id.clone()),
                actor: actor.username.clone(),
                intent: DispatchIntent::WorkflowRunDelete,
            },
        );
        Ok(())
    }
}
