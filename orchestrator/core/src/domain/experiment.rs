// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Experiment Domain Model
//!
//! The `Experiment` aggregate root and the revisions it owns.
//!
//! # Architectural Context
//!
//! - **Bounded Context:** Experiment Lifecycle Context
//! - **Aggregate Root:** Experiment
//! - **Owned Entities:** Revision (embedded, never addressed on its own)
//!
//! # Invariants
//!
//! - An experiment always holds at least one revision.
//! - Revisions are append-only and keep submission order. The single
//!   exception is [`Experiment::replace_revision_manifest`], used by the
//!   enable/disable toggle of scheduled kinds.
//! - A weight table holds one weight per fault name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::manifest::ManifestKind;

// ============================================================================
// Value Objects: Identifiers
// ============================================================================

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_identifier!(
    /// Stable experiment identity, generated once when the caller omits it
    ExperimentId
);
string_identifier!(
    /// Tenant owning experiments and infrastructures
    ProjectId
);
string_identifier!(
    /// Remote execution agent an experiment targets
    InfraId
);
string_identifier!(
    /// Caller-supplied identity of one experiment edit
    RevisionId
);
string_identifier!(
    /// Identity of one experiment run
    RunId
);

impl ExperimentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Lookup key for a persisted experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentKey {
    pub experiment_id: ExperimentId,
    pub project_id: ProjectId,
}

impl ExperimentKey {
    pub fn new(experiment_id: ExperimentId, project_id: ProjectId) -> Self {
        Self {
            experiment_id,
            project_id,
        }
    }
}

/// Resolved caller identity, as handed over by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub username: String,
}

impl Actor {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    /// Audit stamp for a write performed now.
    pub fn stamp(&self) -> AuditStamp {
        AuditStamp {
            actor: self.username.clone(),
            at: Utc::now(),
        }
    }
}

/// Who changed a record, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub actor: String,
    pub at: DateTime<Utc>,
}

// ============================================================================
// Weights
// ============================================================================

/// Importance factor of a single fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultWeight {
    pub fault_name: String,
    pub weightage: u32,
}

impl FaultWeight {
    pub fn new(fault_name: impl Into<String>, weightage: u32) -> Self {
        Self {
            fault_name: fault_name.into(),
            weightage,
        }
    }
}

/// Fault name → weight. Iterates in ascending fault-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable(BTreeMap<String, u32>);

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fault_name: &str) -> Option<u32> {
        self.0.get(fault_name).copied()
    }

    pub fn contains(&self, fault_name: &str) -> bool {
        self.0.contains_key(fault_name)
    }

    /// Later inserts for the same fault replace earlier ones.
    pub fn insert(&mut self, fault_name: impl Into<String>, weight: u32) {
        self.0.insert(fault_name.into(), weight);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.0.values().map(|w| u64::from(*w)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    pub fn to_weightages(&self) -> Vec<FaultWeight> {
        self.iter().map(|(name, weight)| FaultWeight::new(name, weight)).collect()
    }
}

impl FromIterator<FaultWeight> for WeightTable {
    fn from_iter<I: IntoIterator<Item = FaultWeight>>(iter: I) -> Self {
        let mut table = WeightTable::new();
        for weight in iter {
            table.insert(weight.fault_name, weight.weightage);
        }
        table
    }
}

impl<'a> FromIterator<&'a FaultWeight> for WeightTable {
    fn from_iter<I: IntoIterator<Item = &'a FaultWeight>>(iter: I) -> Self {
        iter.into_iter().cloned().collect()
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Snapshot of an experiment's manifest and weights at one edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub revision_id: RevisionId,
    pub manifest: String,
    pub updated_at: DateTime<Utc>,
    pub weight_table: WeightTable,
}

impl Revision {
    pub fn new(revision_id: RevisionId, manifest: impl Into<String>, weight_table: WeightTable) -> Self {
        Self {
            revision_id,
            manifest: manifest.into(),
            updated_at: Utc::now(),
            weight_table,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDetails {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    pub is_removed: bool,
}

impl Audit {
    pub fn created(stamp: &AuditStamp) -> Self {
        Self {
            created_at: stamp.at,
            created_by: stamp.actor.clone(),
            updated_at: stamp.at,
            updated_by: stamp.actor.clone(),
            is_removed: false,
        }
    }

    pub fn touch(&mut self, stamp: &AuditStamp) {
        self.updated_at = stamp.at;
        self.updated_by = stamp.actor.clone();
    }
}

/// Experiment-level fields replaced on a normal edit
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentPatch {
    pub experiment_type: ManifestKind,
    pub cron_syntax: Option<String>,
    pub details: ResourceDetails,
    pub infra_id: InfraId,
    pub is_custom: bool,
}

// ============================================================================
// Aggregate Root: Experiment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: ExperimentId,
    pub project_id: ProjectId,
    pub infra_id: InfraId,
    pub experiment_type: ManifestKind,
    pub cron_syntax: Option<String>,
    pub is_custom: bool,
    pub details: ResourceDetails,
    pub audit: Audit,
    #[serde(deserialize_with = "non_empty_revisions")]
    revisions: Vec<Revision>,
    #[serde(default)]
    pub recent_runs: Vec<RunId>,
}

impl Experiment {
    /// Build a new record holding its first revision.
    pub fn new(
        experiment_id: ExperimentId,
        project_id: ProjectId,
        patch: ExperimentPatch,
        initial_revision: Revision,
        stamp: &AuditStamp,
    ) -> Self {
        Self {
            experiment_id,
            project_id,
            infra_id: patch.infra_id,
            experiment_type: patch.experiment_type,
            cron_syntax: patch.cron_syntax,
            is_custom: patch.is_custom,
            details: patch.details,
            audit: Audit::created(stamp),
            revisions: vec![initial_revision],
            recent_runs: Vec::new(),
        }
    }

    /// Rehydrate a persisted record. `None` when `revisions` is empty.
    pub fn from_parts(
        experiment_id: ExperimentId,
        project_id: ProjectId,
        patch: ExperimentPatch,
        audit: Audit,
        revisions: Vec<Revision>,
        recent_runs: Vec<RunId>,
    ) -> Option<Self> {
        if revisions.is_empty() {
            return None;
        }
        Some(Self {
            experiment_id,
            project_id,
            infra_id: patch.infra_id,
            experiment_type: patch.experiment_type,
            cron_syntax: patch.cron_syntax,
            is_custom: patch.is_custom,
            details: patch.details,
            audit,
            revisions,
            recent_runs,
        })
    }

    pub fn key(&self) -> ExperimentKey {
        ExperimentKey::new(self.experiment_id.clone(), self.project_id.clone())
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn is_removed(&self) -> bool {
        self.audit.is_removed
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn revision(&self, revision_id: &RevisionId) -> Option<&Revision> {
        self.revisions.iter().find(|r| &r.revision_id == revision_id)
    }

    pub fn latest_revision(&self) -> &Revision {
        // Non-empty by construction.
        &self.revisions[self.revisions.len() - 1]
    }

    /// Replace experiment-level fields and append a revision.
    pub fn apply_edit(&mut self, patch: &ExperimentPatch, revision: Revision, stamp: &AuditStamp) {
        self.experiment_type = patch.experiment_type;
        self.cron_syntax = patch.cron_syntax.clone();
        self.details = patch.details.clone();
        self.infra_id = patch.infra_id.clone();
        self.is_custom = patch.is_custom;
        self.audit.touch(stamp);
        self.revisions.push(revision);
    }

    /// Patch the manifest of an existing revision in place.
    ///
    /// Returns `false` when no revision carries `revision_id`.
    pub fn replace_revision_manifest(
        &mut self,
        revision_id: &RevisionId,
        manifest: &str,
        stamp: &AuditStamp,
    ) -> bool {
        let Some(revision) = self.revisions.iter_mut().find(|r| &r.revision_id == revision_id) else {
            return false;
        };
        revision.manifest = manifest.to_string();
        revision.updated_at = stamp.at;
        self.audit.touch(stamp);
        true
    }

    pub fn mark_removed(&mut self, stamp: &AuditStamp) {
        self.audit.is_removed = true;
        self.audit.touch(stamp);
    }
}

fn non_empty_revisions<'de, D>(deserializer: D) -> Result<Vec<Revision>, D::Error>
where
    D: Deserializer<'de>,
{
    let revisions = Vec::<Revision>::deserialize(deserializer)?;
    if revisions.is_empty() {
        return Err(serde::de::Error::invalid_length(0, &"at least one revision"));
    }
    Ok(revisions)
}

// ============================================================================
// Inbound Request
// ============================================================================

/// Create/update request as received from the API layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRequest {
    #[serde(default, rename = "experimentID")]
    pub experiment_id: Option<ExperimentId>,
    pub experiment_name: String,
    #[serde(default)]
    pub experiment_description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "infraID")]
    pub infra_id: InfraId,
    pub experiment_manifest: String,
    #[serde(default)]
    pub cron_syntax: Option<String>,
    #[serde(default)]
    pub is_custom_experiment: bool,
    #[serde(default)]
    pub weightages: Vec<FaultWeight>,
}

impl ExperimentRequest {
    pub fn weight_table(&self) -> WeightTable {
        self.weightages.iter().collect()
    }

    pub fn details(&self) -> ResourceDetails {
        ResourceDetails {
            name: self.experiment_name.clone(),
            description: self.experiment_description.clone(),
            tags: self.tags.clone(),
        }
    }

    pub fn patch(&self, experiment_type: ManifestKind) -> ExperimentPatch {
        ExperimentPatch {
            experiment_type,
            cron_syntax: self.cron_syntax.clone(),
            details: self.details(),
            infra_id: self.infra_id.clone(),
            is_custom: self.is_custom_experiment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_experiment() -> Experiment {
        let stamp = Actor::new("admin").stamp();
        let patch = ExperimentPatch {
            experiment_type: ManifestKind::Workflow,
            cron_syntax: None,
            details: ResourceDetails {
                name: "podtato".to_string(),
                ..Default::default()
            },
            infra_id: "infra-1".into(),
            is_custom: true,
        };
        Experiment::new(
            "exp-1".into(),
            "project-1".into(),
            patch,
            Revision::new("rev-1".into(), "{}", WeightTable::new()),
            &stamp,
        )
    }

    #[test]
    fn test_weight_table_last_insert_wins() {
        let table: WeightTable = vec![
            FaultWeight::new("pod-delete", 10),
            FaultWeight::new("pod-delete", 30),
            FaultWeight::new("cpu-hog", 5),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("pod-delete"), Some(30));
        assert_eq!(table.total_weight(), 35);
        // BTreeMap order
        assert_eq!(table.to_weightages()[0].fault_name, "cpu-hog");
    }

    #[test]
    fn test_new_experiment_holds_initial_revision() {
        let experiment = sample_experiment();
        assert_eq!(experiment.revisions().len(), 1);
        assert_eq!(experiment.latest_revision().revision_id.as_str(), "rev-1");
        assert!(!experiment.is_removed());
        assert_eq!(experiment.audit.created_by, "admin");
    }

    #[test]
    fn test_apply_edit_appends_in_order() {
        let mut experiment = sample_experiment();
        let patch = ExperimentPatch {
            experiment_type: ManifestKind::CronWorkflow,
            cron_syntax: Some("*/5 * * * *".to_string()),
            details: experiment.details.clone(),
            infra_id: "infra-2".into(),
            is_custom: false,
        };
        let stamp = Actor::new("editor").stamp();
        experiment.apply_edit(&patch, Revision::new("rev-2".into(), "{}", WeightTable::new()), &stamp);
        experiment.apply_edit(&patch, Revision::new("rev-3".into(), "{}", WeightTable::new()), &stamp);

        let ids: Vec<&str> = experiment.revisions().iter().map(|r| r.revision_id.as_str()).collect();
        assert_eq!(ids, vec!["rev-1", "rev-2", "rev-3"]);
        assert_eq!(experiment.infra_id.as_str(), "infra-2");
        assert_eq!(experiment.audit.updated_by, "editor");
    }

    #[test]
    fn test_replace_revision_manifest_in_place() {
        let mut experiment = sample_experiment();
        let stamp = Actor::new("editor").stamp();

        assert!(experiment.replace_revision_manifest(&"rev-1".into(), "{\"suspend\":true}", &stamp));
        assert_eq!(experiment.revisions().len(), 1);
        assert_eq!(experiment.latest_revision().manifest, "{\"suspend\":true}");
        assert!(!experiment.replace_revision_manifest(&"missing".into(), "{}", &stamp));
    }

    #[test]
    fn test_from_parts_rejects_empty_revisions() {
        let experiment = sample_experiment();
        let patch = experiment_patch(&experiment);
        assert!(Experiment::from_parts(
            experiment.experiment_id.clone(),
            experiment.project_id.clone(),
            patch,
            experiment.audit.clone(),
            vec![],
            vec![],
        )
        .is_none());
    }

    #[test]
    fn test_deserialize_rejects_empty_revisions() {
        let experiment = sample_experiment();
        let mut value = serde_json::to_value(&experiment).unwrap();
        let restored: Experiment = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(restored, experiment);

        value["revisions"] = serde_json::json!([]);
        let err = serde_json::from_value::<Experiment>(value).unwrap_err();
        assert!(err.to_string().contains("at least one revision"));
    }

    fn experiment_patch(experiment: &Experiment) -> ExperimentPatch {
        ExperimentPatch {
            experiment_type: experiment.experiment_type,
            cron_syntax: experiment.cron_syntax.clone(),
            details: experiment.details.clone(),
            infra_id: experiment.infra_id.clone(),
            is_custom: experiment.is_custom,
        }
    }
}
