// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root, following the DDD Repository
//! pattern: one repository per aggregate, interface defined in the domain layer,
//! implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ExperimentRepository` | `Experiment` | `InMemoryChaosStore`, `PostgresExperimentRepository` |
//! | `ExperimentRunRepository` | `ExperimentRun` | `InMemoryChaosStore`, `PostgresExperimentRunRepository` |
//! | `ChaosInfraRepository` | `ChaosInfra` (read-only) | `InMemoryChaosInfraRepository`, `PostgresChaosInfraRepository` |
//!
//! ## Soft-delete transaction
//!
//! Deleting an experiment touches two collections. [`ExperimentRepository::begin`]
//! hands out an [`ExperimentTransaction`] that the caller owns for the
//! duration of the delete: reads see a snapshot taken at `begin`, and nothing
//! is visible to other readers until `commit`. A transaction dropped without
//! `commit` leaves no trace, so a cancelled caller never half-applies a delete.

use async_trait::async_trait;

use crate::domain::chaos_infra::ChaosInfra;
use crate::domain::experiment::{
    AuditStamp, Experiment, ExperimentId, ExperimentKey, ExperimentPatch, InfraId, Revision, RevisionId, RunId,
};
use crate::domain::experiment_run::{ExperimentRun, RunKey};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Repository interface for Experiment aggregates
#[async_trait]
pub trait ExperimentRepository: Send + Sync {
    /// Insert a new experiment. `Conflict` when the id already exists.
    async fn insert(&self, experiment: &Experiment) -> Result<(), RepositoryError>;

    /// Find experiment by ID, removed or not
    async fn find_by_id(&self, id: &ExperimentId) -> Result<Option<Experiment>, RepositoryError>;

    /// Replace experiment-level fields and append `revision` at the end of
    /// the revision list.
    async fn append_revision(
        &self,
        key: &ExperimentKey,
        patch: &ExperimentPatch,
        revision: &Revision,
        stamp: &AuditStamp,
    ) -> Result<(), RepositoryError>;

    /// Patch manifest and timestamp of the existing revision `revision_id`.
    async fn replace_revision_manifest(
        &self,
        key: &ExperimentKey,
        revision_id: &RevisionId,
        manifest: &str,
        stamp: &AuditStamp,
    ) -> Result<(), RepositoryError>;

    /// Open a snapshot-isolated transaction spanning experiments and runs.
    async fn begin(&self) -> Result<Box<dyn ExperimentTransaction>, RepositoryError>;
}

/// Multi-collection unit of work used by the soft delete
#[async_trait]
pub trait ExperimentTransaction: Send {
    /// Flag the experiment removed. `NotFound` when `key` matches nothing.
    async fn mark_experiment_removed(&mut self, key: &ExperimentKey, stamp: &AuditStamp) -> Result<(), RepositoryError>;

    /// Flag every run of the experiment removed; returns how many matched.
    async fn mark_runs_removed(&mut self, experiment_id: &ExperimentId, stamp: &AuditStamp) -> Result<u64, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn abort(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Repository interface for ExperimentRun aggregates
#[async_trait]
pub trait ExperimentRunRepository: Send + Sync {
    /// Save run (create or update)
    async fn save(&self, run: &ExperimentRun) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, run_id: &RunId) -> Result<Option<ExperimentRun>, RepositoryError>;

    async fn find_by_experiment(&self, experiment_id: &ExperimentId) -> Result<Vec<ExperimentRun>, RepositoryError>;

    /// Single-document write of the run's removal flag.
    async fn set_removed(&self, key: &RunKey, is_removed: bool, stamp: &AuditStamp) -> Result<(), RepositoryError>;
}

/// Read-only lookup of registered chaos infrastructures
#[async_trait]
pub trait ChaosInfraRepository: Send + Sync {
    async fn find_by_id(&self, infra_id: &InfraId) -> Result<Option<ChaosInfra>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
