// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chaos Manifest Parser
//!
//! Infrastructure for reading experiment manifests, stamping identity and
//! fault weights into them, and writing them back out in canonical form.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Parse external JSON/YAML manifests → reconciled manifests
//! - **Anti-Corruption:** Only the fields the lifecycle cares about are
//!   touched; everything else in the document is carried through verbatim
//!
//! # Where faults live
//!
//! | Kind | Fault list | Weight label |
//! |------|-----------|--------------|
//! | `Workflow` | `spec.templates[*]` embedding a ChaosEngine | `templates[*].metadata.labels` |
//! | `CronWorkflow` | `spec.workflowSpec.templates[*]` | `templates[*].metadata.labels` |
//! | `ChaosEngine` | `spec.experiments[0]` | `metadata.labels` |
//! | `ChaosSchedule` | `spec.engineTemplateSpec.experiments[0]` | `metadata.labels` |
//!
//! Embedded engines in workflow templates sit in
//! `inputs.artifacts[0].raw.data` as YAML that may contain `{{ … }}`
//! templating; the delimiters are stripped before the YAML is read.
//!
//! # Canonical form
//!
//! Compact JSON with keys in a deterministic order, so classifying a
//! canonical manifest again with the same declared weights reproduces it
//! byte for byte.

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::experiment::WeightTable;
use crate::domain::manifest::{
    FaultManifest, IdentityLabels, ManifestError, ManifestKind, Reconciliation, WeightReconciler, LABEL_WEIGHT,
};

type Document = Map<String, Value>;

// ============================================================================
// Manifest Variants
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowManifest {
    document: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CronWorkflowManifest {
    document: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChaosEngineManifest {
    document: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChaosScheduleManifest {
    document: Document,
}

/// A parsed manifest of one of the four supported kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ChaosManifest {
    Workflow(WorkflowManifest),
    CronWorkflow(CronWorkflowManifest),
    ChaosEngine(ChaosEngineManifest),
    ChaosSchedule(ChaosScheduleManifest),
}

impl ChaosManifest {
    /// Parse a JSON or YAML manifest and check that its name matches the
    /// experiment's declared name.
    pub fn parse(raw: &str, experiment_name: &str) -> Result<Self, ManifestError> {
        let document = parse_document(raw)?;

        let kind = document.get("kind").and_then(Value::as_str).unwrap_or_default().to_string();
        let name = document
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if name != experiment_name {
            return Err(ManifestError::NameMismatch {
                kind,
                expected: experiment_name.to_string(),
                got: name.to_string(),
            });
        }

        Ok(match kind.parse::<ManifestKind>()? {
            ManifestKind::Workflow => ChaosManifest::Workflow(WorkflowManifest { document }),
            ManifestKind::CronWorkflow => ChaosManifest::CronWorkflow(CronWorkflowManifest { document }),
            ManifestKind::ChaosEngine => ChaosManifest::ChaosEngine(ChaosEngineManifest { document }),
            ManifestKind::ChaosSchedule => ChaosManifest::ChaosSchedule(ChaosScheduleManifest { document }),
        })
    }

    pub fn kind(&self) -> ManifestKind {
        self.as_fault_manifest().kind()
    }

    fn as_fault_manifest(&self) -> &dyn FaultManifest {
        match self {
            ChaosManifest::Workflow(m) => m,
            ChaosManifest::CronWorkflow(m) => m,
            ChaosManifest::ChaosEngine(m) => m,
            ChaosManifest::ChaosSchedule(m) => m,
        }
    }

    fn as_fault_manifest_mut(&mut self) -> &mut dyn FaultManifest {
        match self {
            ChaosManifest::Workflow(m) => m,
            ChaosManifest::CronWorkflow(m) => m,
            ChaosManifest::ChaosEngine(m) => m,
            ChaosManifest::ChaosSchedule(m) => m,
        }
    }

    /// Stamp identity labels, reconcile every fault weight against
    /// `declared`, and serialize the result.
    pub fn reconcile(
        mut self,
        identity: &IdentityLabels,
        declared: &WeightTable,
    ) -> Result<Reconciliation, ManifestError> {
        let manifest = self.as_fault_manifest_mut();
        manifest.inject_identity(identity)?;

        let mut reconciler = WeightReconciler::new(declared);
        manifest.reconcile_weights(&mut reconciler)?;

        let weight_table = reconciler.weight_table();
        debug_assert!(reconciler.faults().iter().all(|f| weight_table.contains(f)));

        let kind = manifest.kind();
        let cron_syntax = manifest.cron_syntax();
        let canonical = manifest.to_canonical()?;
        let fault_count = reconciler.faults().len();
        let inferred_weights = reconciler.into_inferred();

        debug!(
            %kind,
            faults = fault_count,
            inferred = inferred_weights.len(),
            "Reconciled experiment manifest"
        );

        Ok(Reconciliation {
            kind,
            manifest: canonical,
            inferred_weights,
            weight_table,
            cron_syntax,
        })
    }

    /// Parse and reconcile in one step.
    pub fn classify(
        raw: &str,
        experiment_name: &str,
        identity: &IdentityLabels,
        declared: &WeightTable,
    ) -> Result<Reconciliation, ManifestError> {
        Self::parse(raw, experiment_name)?.reconcile(identity, declared)
    }
}

// ============================================================================
// Per-kind reconciliation
// ============================================================================

impl FaultManifest for WorkflowManifest {
    fn kind(&self) -> ManifestKind {
        ManifestKind::Workflow
    }

    fn inject_identity(&mut self, identity: &IdentityLabels) -> Result<(), ManifestError> {
        let kind = self.kind();
        stamp_labels(root_labels(&mut self.document)?, identity, kind);
        Ok(())
    }

    fn reconcile_weights(&mut self, reconciler: &mut WeightReconciler<'_>) -> Result<(), ManifestError> {
        let spec = object_entry(&mut self.document, "spec")?;
        reconcile_templates(spec.get_mut("templates"), reconciler)
    }

    fn to_canonical(&self) -> Result<String, ManifestError> {
        canonical(&self.document)
    }
}

impl FaultManifest for CronWorkflowManifest {
    fn kind(&self) -> ManifestKind {
        ManifestKind::CronWorkflow
    }

    fn inject_identity(&mut self, identity: &IdentityLabels) -> Result<(), ManifestError> {
        let kind = self.kind();
        stamp_labels(root_labels(&mut self.document)?, identity, kind);

        let spec = object_entry(&mut self.document, "spec")?;
        let workflow_metadata = object_entry(spec, "workflowMetadata")?;
        stamp_labels(object_entry(workflow_metadata, "labels")?, identity, kind);
        Ok(())
    }

    fn reconcile_weights(&mut self, reconciler: &mut WeightReconciler<'_>) -> Result<(), ManifestError> {
        let spec = object_entry(&mut self.document, "spec")?;
        let workflow_spec = object_entry(spec, "workflowSpec")?;
        reconcile_templates(workflow_spec.get_mut("templates"), reconciler)
    }

    fn cron_syntax(&self) -> Option<String> {
        self.document
            .get("spec")
            .and_then(|s| s.get("schedule"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn to_canonical(&self) -> Result<String, ManifestError> {
        canonical(&self.document)
    }
}

impl FaultManifest for ChaosEngineManifest {
    fn kind(&self) -> ManifestKind {
        ManifestKind::ChaosEngine
    }

    fn inject_identity(&mut self, identity: &IdentityLabels) -> Result<(), ManifestError> {
        let kind = self.kind();
        stamp_labels(root_labels(&mut self.document)?, identity, kind);
        Ok(())
    }

    fn reconcile_weights(&mut self, reconciler: &mut WeightReconciler<'_>) -> Result<(), ManifestError> {
        let fault_name = first_experiment_name(&self.document, "/experiments")?;
        reconcile_root_weight(&mut self.document, &fault_name, reconciler)
    }

    fn to_canonical(&self) -> Result<String, ManifestError> {
        canonical(&self.document)
    }
}

impl FaultManifest for ChaosScheduleManifest {
    fn kind(&self) -> ManifestKind {
        ManifestKind::ChaosSchedule
    }

    fn inject_identity(&mut self, identity: &IdentityLabels) -> Result<(), ManifestError> {
        let kind = self.kind();
        stamp_labels(root_labels(&mut self.document)?, identity, kind);
        Ok(())
    }

    fn reconcile_weights(&mut self, reconciler: &mut WeightReconciler<'_>) -> Result<(), ManifestError> {
        let fault_name = first_experiment_name(&self.document, "/engineTemplateSpec/experiments")?;
        reconcile_root_weight(&mut self.document, &fault_name, reconciler)
    }

    fn to_canonical(&self) -> Result<String, ManifestError> {
        canonical(&self.document)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_document(raw: &str) -> Result<Document, ManifestError> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(json_err) => serde_yaml::from_str(raw)
            .map_err(|yaml_err| ManifestError::Parse(format!("not JSON ({}) nor YAML ({})", json_err, yaml_err)))?,
    };

    match value {
        Value::Object(document) => Ok(document),
        other => Err(ManifestError::Parse(format!(
            "manifest root must be a mapping, got {}",
            value_type(&other)
        ))),
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

fn canonical(document: &Document) -> Result<String, ManifestError> {
    serde_json::to_string(document).map_err(|e| ManifestError::Serialization(e.to_string()))
}

fn metadata_name(document: &Document) -> Option<&str> {
    document.get("metadata")?.get("name")?.as_str()
}

/// Child mapping under `key`, created (or replacing a non-mapping) if needed.
fn object_entry<'a>(map: &'a mut Document, key: &str) -> Result<&'a mut Document, ManifestError> {
    let slot = map.entry(key.to_string()).or_insert(Value::Null);
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut()
        .ok_or_else(|| ManifestError::Parse(format!("'{}' is not a mapping", key)))
}

fn root_labels(document: &mut Document) -> Result<&mut Document, ManifestError> {
    let metadata = object_entry(document, "metadata")?;
    object_entry(metadata, "labels")
}

fn stamp_labels(labels: &mut Document, identity: &IdentityLabels, kind: ManifestKind) {
    for (key, value) in identity.labels_for(kind) {
        labels.insert(key.to_string(), Value::String(value));
    }
}

fn weight_label(labels: &Document) -> Option<String> {
    labels.get(LABEL_WEIGHT).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn apply_weight(
    labels: &mut Document,
    fault_name: &str,
    reconciler: &mut WeightReconciler<'_>,
) -> Result<(), ManifestError> {
    let existing = weight_label(labels);
    let source = reconciler.resolve(fault_name, existing.as_deref())?;
    if let Some(stamp) = source.label_to_stamp() {
        labels.insert(LABEL_WEIGHT.to_string(), Value::String(stamp));
    }
    Ok(())
}

fn reconcile_root_weight(
    document: &mut Document,
    fault_name: &str,
    reconciler: &mut WeightReconciler<'_>,
) -> Result<(), ManifestError> {
    apply_weight(root_labels(document)?, fault_name, reconciler)
}

/// First fault under `spec`, addressed by a JSON pointer relative to `spec`.
fn first_experiment_name(document: &Document, spec_pointer: &str) -> Result<String, ManifestError> {
    let experiments = document
        .get("spec")
        .and_then(|spec| spec.pointer(spec_pointer))
        .and_then(Value::as_array);
    let Some(first) = experiments.and_then(|e| e.first()) else {
        return Err(ManifestError::NoFaults(metadata_name(document).unwrap_or_default().to_string()));
    };
    let name = first.get("name").and_then(Value::as_str).unwrap_or_default();
    if name.is_empty() {
        return Err(ManifestError::EmptyFaultName);
    }
    Ok(name.to_string())
}

fn reconcile_templates(
    templates: Option<&mut Value>,
    reconciler: &mut WeightReconciler<'_>,
) -> Result<(), ManifestError> {
    let Some(Value::Array(templates)) = templates else {
        return Ok(());
    };

    for template in templates.iter_mut() {
        let data = template
            .pointer("/inputs/artifacts/0/raw/data")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let Some(data) = data else {
            continue;
        };
        let Some(fault_name) = embedded_fault_name(&data)? else {
            continue;
        };
        let Value::Object(template) = template else {
            continue;
        };

        let metadata = object_entry(template, "metadata")?;
        apply_weight(object_entry(metadata, "labels")?, &fault_name, reconciler)?;
    }
    Ok(())
}

/// Fault name of a ChaosEngine embedded in a template artifact, `None` for
/// artifacts of any other kind.
fn embedded_fault_name(data: &str) -> Result<Option<String>, ManifestError> {
    let stripped = data.replace("{{", "").replace("}}", "");
    let engine: Value =
        serde_yaml::from_str(&stripped).map_err(|e| ManifestError::EmbeddedFault(e.to_string()))?;

    let kind = engine.get("kind").and_then(Value::as_str).unwrap_or_default();
    if !kind.eq_ignore_ascii_case(ManifestKind::ChaosEngine.as_str()) {
        return Ok(None);
    }

    let has_experiments = engine
        .pointer("/spec/experiments")
        .and_then(Value::as_array)
        .is_some_and(|e| !e.is_empty());
    if !has_experiments {
        let name = engine.pointer("/metadata/name").and_then(Value::as_str).unwrap_or_default();
        return Err(ManifestError::NoFaults(name.to_string()));
    }

    let fault_name = engine
        .pointer("/metadata/generateName")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if fault_name.is_empty() {
        return Err(ManifestError::EmptyFaultName);
    }
    Ok(Some(fault_name.to_string()))
}
