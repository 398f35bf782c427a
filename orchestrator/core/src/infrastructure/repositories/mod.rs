// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! This module provides infrastructure implementations of repository abstractions
//! defined in the domain layer, following the Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresExperimentRepository** - Experiments and their ordered revisions
//! - **PostgresExperimentRunRepository** - Run records and removal flags
//! - **PostgresChaosInfraRepository** - Infrastructure activity lookup
//!
//! ## In-Memory Repositories
//!
//! - **InMemoryChaosStore** - Experiments and runs behind one lock, so the
//!   soft-delete transaction can apply to both atomically
//! - **InMemoryChaosInfraRepository** - Registered infrastructures
//!
//! # Usage
//!
//! ```no_run
//! # async fn example() -> anyhow::Result<()> {
//! use chaos_core::infrastructure::db::Database;
//! use chaos_core::infrastructure::repositories::PostgresExperimentRepository;
//!
//! let db = Database::new("postgres://localhost/chaoscenter", 5).await?;
//! let repo = PostgresExperimentRepository::new(db.get_pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod postgres_chaos_infra;
pub mod postgres_experiment;
pub mod postgres_experiment_run;
pub mod schema;

pub use postgres_chaos_infra::PostgresChaosInfraRepository;
pub use postgres_experiment::PostgresExperimentRepository;
pub use postgres_experiment_run::PostgresExperimentRunRepository;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::chaos_infra::ChaosInfra;
use crate::domain::experiment::{
    AuditStamp, Experiment, ExperimentId, ExperimentKey, ExperimentPatch, InfraId, Revision, RevisionId, RunId,
};
use crate::domain::experiment_run::{ExperimentRun, RunKey};
use crate::domain::repository::{
    ChaosInfraRepository, ExperimentRepository, ExperimentRunRepository, ExperimentTransaction, RepositoryError,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    experiments: HashMap<ExperimentId, Experiment>,
    runs: HashMap<RunId, ExperimentRun>,
}

impl StoreState {
    fn experiment(&self, key: &ExperimentKey) -> Option<&Experiment> {
        self.experiments
            .get(&key.experiment_id)
            .filter(|e| e.project_id == key.project_id)
    }

    fn experiment_mut(&mut self, key: &ExperimentKey) -> Result<&mut Experiment, RepositoryError> {
        self.experiments
            .get_mut(&key.experiment_id)
            .filter(|e| e.project_id == key.project_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("experiment {}", key.experiment_id)))
    }
}

/// Experiments and runs sharing one lock
#[derive(Clone, Default)]
pub struct InMemoryChaosStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryChaosStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExperimentRepository for InMemoryChaosStore {
    async fn insert(&self, experiment: &Experiment) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        if state.experiments.contains_key(&experiment.experiment_id) {
            return Err(RepositoryError::Conflict(format!(
                "experiment {}",
                experiment.experiment_id
            )));
        }
        state
            .experiments
            .insert(experiment.experiment_id.clone(), experiment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &ExperimentId) -> Result<Option<Experiment>, RepositoryError> {
        Ok(self.state.read().experiments.get(id).cloned())
    }

    async fn append_revision(
        &self,
        key: &ExperimentKey,
        patch: &ExperimentPatch,
        revision: &Revision,
        stamp: &AuditStamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        state
            .experiment_mut(key)?
            .apply_edit(patch, revision.clone(), stamp);
        Ok(())
    }

    async fn replace_revision_manifest(
        &self,
        key: &ExperimentKey,
        revision_id: &RevisionId,
        manifest: &str,
        stamp: &AuditStamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        if !state
            .experiment_mut(key)?
            .replace_revision_manifest(revision_id, manifest, stamp)
        {
            return Err(RepositoryError::NotFound(format!("revision {}", revision_id)));
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn ExperimentTransaction>, RepositoryError> {
        let snapshot = self.state.read().clone();
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            snapshot,
            staged: Vec::new(),
        }))
    }
}

#[async_trait]
impl ExperimentRunRepository for InMemoryChaosStore {
    async fn save(&self, run: &ExperimentRun) -> Result<(), RepositoryError> {
        self.state.write().runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn find_by_id(&self, run_id: &RunId) -> Result<Option<ExperimentRun>, RepositoryError> {
        Ok(self.state.read().runs.get(run_id).cloned())
    }

    async fn find_by_experiment(&self, experiment_id: &ExperimentId) -> Result<Vec<ExperimentRun>, RepositoryError> {
        let state = self.state.read();
        let mut runs: Vec<ExperimentRun> = state
            .runs
            .values()
            .filter(|r| &r.experiment_id == experiment_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| a.audit.created_at.cmp(&b.audit.created_at));
        Ok(runs)
    }

    async fn set_removed(&self, key: &RunKey, is_removed: bool, stamp: &AuditStamp) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        let run = state
            .runs
            .get_mut(&key.run_id)
            .filter(|r| r.project_id == key.project_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("experiment run {}", key.run_id)))?;
        run.set_removed(is_removed, stamp);
        Ok(())
    }
}

#[derive(Debug)]
enum StagedWrite {
    RemoveExperiment(ExperimentKey, AuditStamp),
    RemoveRuns(ExperimentId, AuditStamp),
}

/// Reads from the snapshot taken at `begin`; writes are queued and applied
/// to the live store under a single write lock at commit.
struct InMemoryTransaction {
    state: Arc<RwLock<StoreState>>,
    snapshot: StoreState,
    staged: Vec<StagedWrite>,
}

#[async_trait]
impl ExperimentTransaction for InMemoryTransaction {
    async fn mark_experiment_removed(&mut self, key: &ExperimentKey, stamp: &AuditStamp) -> Result<(), RepositoryError> {
        if self.snapshot.experiment(key).is_none() {
            return Err(RepositoryError::NotFound(format!("experiment {}", key.experiment_id)));
        }
        self.staged
            .push(StagedWrite::RemoveExperiment(key.clone(), stamp.clone()));
        Ok(())
    }

    async fn mark_runs_removed(&mut self, experiment_id: &ExperimentId, stamp: &AuditStamp) -> Result<u64, RepositoryError> {
        let matched = self
            .snapshot
            .runs
            .values()
            .filter(|r| &r.experiment_id == experiment_id)
            .count() as u64;
        self.staged
            .push(StagedWrite::RemoveRuns(experiment_id.clone(), stamp.clone()));
        Ok(matched)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryTransaction { state, staged, .. } = *self;
        let mut state = state.write();
        // Validate before touching anything so a vanished row fails the whole commit.
        for write in &staged {
            if let StagedWrite::RemoveExperiment(key, _) = write {
                if state.experiment(key).is_none() {
                    return Err(RepositoryError::Database(format!(
                        "commit failed: experiment {} vanished during transaction",
                        key.experiment_id
                    )));
                }
            }
        }
        for write in staged {
            match write {
                StagedWrite::RemoveExperiment(key, stamp) => {
                    state.experiment_mut(&key)?.mark_removed(&stamp);
                }
                StagedWrite::RemoveRuns(experiment_id, stamp) => {
                    for run in state.runs.values_mut().filter(|r| r.experiment_id == experiment_id) {
                        run.set_removed(true, &stamp);
                    }
                }
            }
        }
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryChaosInfraRepository {
    infras: Arc<RwLock<HashMap<InfraId, ChaosInfra>>>,
}

impl InMemoryChaosInfraRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, infra: ChaosInfra) {
        self.infras.write().insert(infra.infra_id.clone(), infra);
    }
}

#[async_trait]
impl ChaosInfraRepository for InMemoryChaosInfraRepository {
    async fn find_by_id(&self, infra_id: &InfraId) -> Result<Option<ChaosInfra>, RepositoryError> {
        Ok(self.infras.read().get(infra_id).cloned())
    }
}
