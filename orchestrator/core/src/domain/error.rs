// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Failure taxonomy returned by every experiment use case.

use crate::domain::experiment_run::UnknownVerdict;
use crate::domain::manifest::ManifestError;
use crate::domain::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ChaosExperimentError {
    /// Malformed or unrecognized manifest, missing fault name, bad weight label
    #[error("validation error: {0}")]
    Validation(String),

    /// Inactive or cross-tenant infrastructure target
    #[error("authorization error: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(RepositoryError),
}

impl ChaosExperimentError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ChaosExperimentError::Validation(_))
    }
}

impl From<ManifestError> for ChaosExperimentError {
    fn from(err: ManifestError) -> Self {
        ChaosExperimentError::Validation(err.to_string())
    }
}

impl From<UnknownVerdict> for ChaosExperimentError {
    fn from(err: UnknownVerdict) -> Self {
        ChaosExperimentError::Validation(err.to_string())
    }
}

impl From<RepositoryError> for ChaosExperimentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => ChaosExperimentError::Conflict(msg),
            other => ChaosExperimentError::Storage(other),
        }
    }
}
