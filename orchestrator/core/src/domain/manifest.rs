// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chaos Manifest Domain Model
//!
//! Manifest kinds, identity labels and the per-fault weight policy shared by
//! every manifest shape.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Classify manifests and reconcile fault weights
//! - **Implementations:** Document walking for each kind lives in
//!   `crate::infrastructure::manifest_parser`
//!
//! # Weight Policy
//!
//! For every fault found in a manifest, exactly one of:
//!
//! 1. **Declared** – the caller supplied a weight; it is stamped on the fault
//!    and is *not* reported back as inferred.
//! 2. **Labeled** – the fault already carries a `weight` label from a prior
//!    revision; it is parsed and reported as inferred, label untouched.
//! 3. **Defaulted** – neither; weight 10 is stamped and reported as inferred.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::domain::experiment::{ExperimentId, FaultWeight, InfraId, RevisionId, WeightTable};

/// Weight assigned to a fault that is neither declared nor labeled.
pub const DEFAULT_FAULT_WEIGHT: u32 = 10;

pub const LABEL_WORKFLOW_ID: &str = "workflow_id";
pub const LABEL_INFRA_ID: &str = "infra_id";
pub const LABEL_REVISION_ID: &str = "revision_id";
pub const LABEL_CONTROLLER_INSTANCE_ID: &str = "workflows.argoproj.io/controller-instanceid";
pub const LABEL_TYPE: &str = "type";
pub const LABEL_WEIGHT: &str = "weight";
pub const STANDALONE_WORKFLOW: &str = "standalone_workflow";

// ============================================================================
// Manifest Kind
// ============================================================================

/// The four manifest shapes an experiment can be submitted as.
///
/// Also persisted as the experiment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestKind {
    Workflow,
    CronWorkflow,
    ChaosEngine,
    ChaosSchedule,
}

impl ManifestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::Workflow => "Workflow",
            ManifestKind::CronWorkflow => "CronWorkflow",
            ManifestKind::ChaosEngine => "ChaosEngine",
            ManifestKind::ChaosSchedule => "ChaosSchedule",
        }
    }

    /// Whether manifests of this kind execute under the workflow controller.
    pub fn runs_under_workflow_controller(&self) -> bool {
        matches!(self, ManifestKind::Workflow | ManifestKind::CronWorkflow)
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManifestKind {
    type Err = ManifestError;

    /// Case-insensitive; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "workflow" => Ok(ManifestKind::Workflow),
            "cronworkflow" => Ok(ManifestKind::CronWorkflow),
            "chaosengine" => Ok(ManifestKind::ChaosEngine),
            "chaosschedule" => Ok(ManifestKind::ChaosSchedule),
            _ => Err(ManifestError::UnsupportedKind(s.to_string())),
        }
    }
}

// ============================================================================
// Identity Labels
// ============================================================================

/// Identity stamped on the manifest root so agents can correlate runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityLabels {
    pub experiment_id: ExperimentId,
    pub infra_id: InfraId,
    pub revision_id: RevisionId,
}

impl IdentityLabels {
    pub fn new(experiment_id: ExperimentId, infra_id: InfraId, revision_id: RevisionId) -> Self {
        Self {
            experiment_id,
            infra_id,
            revision_id,
        }
    }

    /// Label pairs for the given kind.
    pub fn labels_for(&self, kind: ManifestKind) -> Vec<(&'static str, String)> {
        let mut labels = vec![
            (LABEL_WORKFLOW_ID, self.experiment_id.to_string()),
            (LABEL_INFRA_ID, self.infra_id.to_string()),
            (LABEL_REVISION_ID, self.revision_id.to_string()),
        ];
        if kind.runs_under_workflow_controller() {
            labels.push((LABEL_CONTROLLER_INSTANCE_ID, self.infra_id.to_string()));
        } else {
            labels.push((LABEL_TYPE, STANDALONE_WORKFLOW.to_string()));
        }
        labels
    }
}

// ============================================================================
// Weight Reconciliation
// ============================================================================

/// Where a fault's reconciled weight came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSource {
    Declared(u32),
    Labeled(u32),
    Defaulted(u32),
}

impl WeightSource {
    pub fn weight(&self) -> u32 {
        match self {
            WeightSource::Declared(w) | WeightSource::Labeled(w) | WeightSource::Defaulted(w) => *w,
        }
    }

    /// Label value to write on the fault node. A prior label is left as is.
    pub fn label_to_stamp(&self) -> Option<String> {
        match self {
            WeightSource::Declared(w) | WeightSource::Defaulted(w) => Some(w.to_string()),
            WeightSource::Labeled(_) => None,
        }
    }
}

/// Accumulates weight decisions while a manifest is walked.
pub struct WeightReconciler<'a> {
    declared: &'a WeightTable,
    inferred: Vec<FaultWeight>,
    faults: BTreeSet<String>,
}

impl<'a> WeightReconciler<'a> {
    pub fn new(declared: &'a WeightTable) -> Self {
        Self {
            declared,
            inferred: Vec::new(),
            faults: BTreeSet::new(),
        }
    }

    /// Decide the weight of one fault given the label it currently carries.
    pub fn resolve(
        &mut self,
        fault_name: &str,
        existing_label: Option<&str>,
    ) -> Result<WeightSource, ManifestError> {
        if fault_name.is_empty() {
            return Err(ManifestError::EmptyFaultName);
        }
        self.faults.insert(fault_name.to_string());

        let source = if let Some(weight) = self.declared.get(fault_name) {
            WeightSource::Declared(weight)
        } else if let Some(label) = existing_label {
            let weight = label
                .parse::<u32>()
                .map_err(|_| ManifestError::InvalidWeightLabel {
                    fault: fault_name.to_string(),
                    value: label.to_string(),
                })?;
            self.infer(fault_name, weight);
            WeightSource::Labeled(weight)
        } else {
            self.infer(fault_name, DEFAULT_FAULT_WEIGHT);
            WeightSource::Defaulted(DEFAULT_FAULT_WEIGHT)
        };

        debug!(fault = %fault_name, ?source, "Reconciled fault weight");
        Ok(source)
    }

    fn infer(&mut self, fault_name: &str, weight: u32) {
        if !self.inferred.iter().any(|w| w.fault_name == fault_name) {
            self.inferred.push(FaultWeight::new(fault_name, weight));
        }
    }

    /// Distinct fault names seen so far.
    pub fn faults(&self) -> &BTreeSet<String> {
        &self.faults
    }

    /// Declared weights merged with inferred ones.
    pub fn weight_table(&self) -> WeightTable {
        let mut table = self.declared.clone();
        for weight in &self.inferred {
            table.insert(weight.fault_name.clone(), weight.weightage);
        }
        table
    }

    pub fn into_inferred(self) -> Vec<FaultWeight> {
        self.inferred
    }
}

/// Contract shared by every manifest shape: stamp identity, then walk the
/// faults through a [`WeightReconciler`].
pub trait FaultManifest {
    fn kind(&self) -> ManifestKind;

    fn inject_identity(&mut self, identity: &IdentityLabels) -> Result<(), ManifestError>;

    fn reconcile_weights(&mut self, reconciler: &mut WeightReconciler<'_>) -> Result<(), ManifestError>;

    /// Schedule string, cron kind only.
    fn cron_syntax(&self) -> Option<String> {
        None
    }

    fn to_canonical(&self) -> Result<String, ManifestError>;
}

/// Output of classifying a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub kind: ManifestKind,
    pub manifest: String,
    pub inferred_weights: Vec<FaultWeight>,
    pub weight_table: WeightTable,
    pub cron_syntax: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to parse experiment manifest: {0}")]
    Parse(String),

    #[error("{kind} name doesn't match: expected '{expected}', got '{got}'")]
    NameMismatch {
        kind: String,
        expected: String,
        got: String,
    },

    #[error("unsupported manifest kind '{0}': only workflows, cron workflows, chaos engines and chaos schedules are supported")]
    UnsupportedKind(String),

    #[error("failed to parse embedded chaos engine: {0}")]
    EmbeddedFault(String),

    #[error("no experiments specified in chaos engine - {0}")]
    NoFaults(String),

    #[error("empty chaos experiment name")]
    EmptyFaultName,

    #[error("weight label '{value}' of fault '{fault}' is not a non-negative integer")]
    InvalidWeightLabel { fault: String, value: String },

    #[error("failed to serialize experiment manifest: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(pairs: &[(&str, u32)]) -> WeightTable {
        pairs.iter().map(|(n, w)| FaultWeight::new(*n, *w)).collect()
    }

    #[test]
    fn test_kind_parsing_is_case_insensitive() {
        assert_eq!("chaosengine".parse::<ManifestKind>().unwrap(), ManifestKind::ChaosEngine);
        assert_eq!("CRONWORKFLOW".parse::<ManifestKind>().unwrap(), ManifestKind::CronWorkflow);
        assert_eq!("ChaosSchedule".parse::<ManifestKind>().unwrap(), ManifestKind::ChaosSchedule);
        assert!(matches!(
            "Deployment".parse::<ManifestKind>(),
            Err(ManifestError::UnsupportedKind(k)) if k == "Deployment"
        ));
    }

    #[test]
    fn test_identity_labels_by_kind() {
        let identity = IdentityLabels::new("exp".into(), "infra".into(), "rev".into());

        let workflow = identity.labels_for(ManifestKind::Workflow);
        assert!(workflow.contains(&(LABEL_CONTROLLER_INSTANCE_ID, "infra".to_string())));
        assert!(!workflow.iter().any(|(k, _)| *k == LABEL_TYPE));

        let engine = identity.labels_for(ManifestKind::ChaosEngine);
        assert!(engine.contains(&(LABEL_TYPE, STANDALONE_WORKFLOW.to_string())));
        assert!(engine.contains(&(LABEL_WORKFLOW_ID, "exp".to_string())));
    }

    #[test]
    fn test_declared_weight_wins_over_label() {
        let table = declared(&[("pod-delete", 30)]);
        let mut reconciler = WeightReconciler::new(&table);

        let source = reconciler.resolve("pod-delete", Some("5")).unwrap();
        assert_eq!(source, WeightSource::Declared(30));
        assert_eq!(source.label_to_stamp().as_deref(), Some("30"));
        assert!(reconciler.into_inferred().is_empty());
    }

    #[test]
    fn test_prior_label_is_inferred_and_kept() {
        let table = WeightTable::default();
        let mut reconciler = WeightReconciler::new(&table);

        let source = reconciler.resolve("pod-cpu-hog", Some("7")).unwrap();
        assert_eq!(source, WeightSource::Labeled(7));
        assert_eq!(source.label_to_stamp(), None);
        assert_eq!(reconciler.into_inferred(), vec![FaultWeight::new("pod-cpu-hog", 7)]);
    }

    #[test]
    fn test_unlabeled_fault_defaults_to_ten() {
        let table = WeightTable::default();
        let mut reconciler = WeightReconciler::new(&table);

        let source = reconciler.resolve("node-drain", None).unwrap();
        assert_eq!(source, WeightSource::Defaulted(DEFAULT_FAULT_WEIGHT));
        assert_eq!(reconciler.weight_table().get("node-drain"), Some(10));
    }

    #[test]
    fn test_invalid_labels_and_names_are_rejected() {
        let table = WeightTable::default();
        let mut reconciler = WeightReconciler::new(&table);

        assert_eq!(reconciler.resolve("", None), Err(ManifestError::EmptyFaultName));
        assert!(matches!(
            reconciler.resolve("pod-delete", Some("heavy")),
            Err(ManifestError::InvalidWeightLabel { .. })
        ));
        assert!(matches!(
            reconciler.resolve("pod-delete", Some("-3")),
            Err(ManifestError::InvalidWeightLabel { .. })
        ));
    }

    #[test]
    fn test_repeated_fault_is_inferred_once() {
        let table = WeightTable::default();
        let mut reconciler = WeightReconciler::new(&table);
        reconciler.resolve("pod-delete", None).unwrap();
        reconciler.resolve("pod-delete", None).unwrap();

        assert_eq!(reconciler.faults().len(), 1);
        assert_eq!(reconciler.into_inferred().len(), 1);
    }
}
