// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Process Experiment Use Case
//!
//! Application service that turns an inbound create/update request into a
//! request ready for persistence.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Admission check, identity assignment, manifest reconciliation
//! - **Collaborators:**
//!   - Domain: ChaosInfra admission policy, WeightReconciler
//!   - Infrastructure: ChaosInfraRepository, ChaosManifest parser
//!
//! # Flow
//!
//! 1. Look up the target infrastructure; reject inactive or cross-tenant targets
//! 2. Generate the experiment id when the request carries none
//! 3. Classify the manifest and reconcile fault weights
//! 4. Fold inferred weights and the canonical manifest back into the request

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::error::ChaosExperimentError;
use crate::domain::experiment::{ExperimentId, ExperimentRequest, FaultWeight, ProjectId, Revision, RevisionId};
use crate::domain::manifest::{IdentityLabels, ManifestKind};
use crate::domain::repository::ChaosInfraRepository;
use crate::infrastructure::manifest_parser::ChaosManifest;

/// Request after reconciliation, together with the revision it will persist
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedExperiment {
    /// Original request with id, canonical manifest, complete weights and
    /// cron syntax filled in
    pub request: ExperimentRequest,
    pub experiment_type: ManifestKind,
    pub inferred_weights: Vec<FaultWeight>,
    pub revision: Revision,
}

impl ProcessedExperiment {
    pub fn experiment_id(&self) -> Result<&ExperimentId, ChaosExperimentError> {
        self.request
            .experiment_id
            .as_ref()
            .ok_or_else(|| ChaosExperimentError::Validation("experiment id is missing".to_string()))
    }
}

#[async_trait]
pub trait ProcessExperimentUseCase: Send + Sync {
    /// Validate and reconcile a create/update request.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the target infrastructure is unknown
    /// - `Authorization`: the target is inactive or owned by another project
    /// - `Validation`: the manifest failed classification
    async fn process_experiment(
        &self,
        request: ExperimentRequest,
        project_id: &ProjectId,
        revision_id: &RevisionId,
    ) -> Result<ProcessedExperiment, ChaosExperimentError>;
}

pub struct StandardProcessExperimentUseCase {
    infra_repository: Arc<dyn ChaosInfraRepository>,
}

impl StandardProcessExperimentUseCase {
    pub fn new(infra_repository: Arc<dyn ChaosInfraRepository>) -> Self {
        Self { infra_repository }
    }
}

#[async_trait]
impl ProcessExperimentUseCase for StandardProcessExperimentUseCase {
    async fn process_experiment(
        &self,
        mut request: ExperimentRequest,
        project_id: &ProjectId,
        revision_id: &RevisionId,
    ) -> Result<ProcessedExperiment, ChaosExperimentError> {
        let infra = self
            .infra_repository
            .find_by_id(&request.infra_id)
            .await?
            .ok_or_else(|| ChaosExperimentError::NotFound(format!("infrastructure {}", request.infra_id)))?;
        if let Some(reason) = infra.admission_error(project_id) {
            return Err(ChaosExperimentError::Authorization(reason));
        }

        let experiment_id = match request.experiment_id.take() {
            Some(id) if !id.is_empty() => id,
            _ => ExperimentId::generate(),
        };

        let identity = IdentityLabels::new(experiment_id.clone(), request.infra_id.clone(), revision_id.clone());
        let reconciliation = ChaosManifest::classify(
            &request.experiment_manifest,
            &request.experiment_name,
            &identity,
            &request.weight_table(),
        )?;

        debug!(
            experiment_id = %experiment_id,
            inferred = reconciliation.inferred_weights.len(),
            "Reconciled experiment weights"
        );

        request.experiment_id = Some(experiment_id.clone());
        request.experiment_manifest = reconciliation.manifest.clone();
        request.weightages.extend(reconciliation.inferred_weights.iter().cloned());
        if reconciliation.cron_syntax.is_some() {
            request.cron_syntax = reconciliation.cron_syntax.clone();
        }

        info!(
            experiment_id = %experiment_id,
            project_id = %project_id,
            revision_id = %revision_id,
            kind = %reconciliation.kind,
            "Processed experiment request"
        );

        Ok(ProcessedExperiment {
            revision: Revision::new(revision_id.clone(), reconciliation.manifest, reconciliation.weight_table),
            experiment_type: reconciliation.kind,
            inferred_weights: reconciliation.inferred_weights,
            request,
        })
    }
}
