// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for manifest reconciliation
//!
//! Feeds realistic YAML manifests of every kind through the classifier and
//! checks weight conservation, declared-over-inferred precedence and
//! idempotent re-classification.

use serde_json::Value;

use chaos_core::domain::experiment::{FaultWeight, WeightTable};
use chaos_core::domain::manifest::{IdentityLabels, ManifestError, ManifestKind};
use chaos_core::infrastructure::manifest_parser::ChaosManifest;

const WORKFLOW_YAML: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: Workflow
metadata:
  name: podtato-head-chaos
  namespace: litmus
  labels:
    subject: podtato-head
spec:
  entrypoint: argowf-chaos
  serviceAccountName: argo-chaos
  arguments:
    parameters:
      - name: adminModeNamespace
        value: litmus
  templates:
    - name: argowf-chaos
      steps:
        - - name: install-application
            template: install-application
        - - name: pod-delete
            template: pod-delete
          - name: pod-cpu-hog
            template: pod-cpu-hog
    - name: install-application
      container:
        image: litmuschaos/litmus-app-deployer:latest
        args: ["-namespace={{workflow.parameters.adminModeNamespace}}"]
    - name: pod-delete
      inputs:
        artifacts:
          - name: pod-delete
            path: /tmp/chaosengine-pod-delete.yaml
            raw:
              data: |
                apiVersion: litmuschaos.io/v1alpha1
                kind: ChaosEngine
                metadata:
                  namespace: "{{workflow.parameters.adminModeNamespace}}"
                  generateName: pod-delete
                spec:
                  engineState: active
                  experiments:
                    - name: pod-delete
      container:
        image: litmuschaos/litmus-checker:latest
        args: ["-file=/tmp/chaosengine-pod-delete.yaml"]
    - name: pod-cpu-hog
      metadata:
        labels:
          weight: "7"
          team: platform
      inputs:
        artifacts:
          - name: pod-cpu-hog
            path: /tmp/chaosengine-pod-cpu-hog.yaml
            raw:
              data: |
                apiVersion: litmuschaos.io/v1alpha1
                kind: ChaosEngine
                metadata:
                  namespace: "{{workflow.parameters.adminModeNamespace}}"
                  generateName: pod-cpu-hog
                spec:
                  experiments:
                    - name: pod-cpu-hog
      container:
        image: litmuschaos/litmus-checker:latest
    - name: revert-chaos
      inputs:
        artifacts:
          - name: cleanup
            path: /tmp/cleanup.yaml
            raw:
              data: |
                kind: ConfigMap
                metadata:
                  name: cleanup
      container:
        image: litmuschaos/k8s:latest
"#;

const CRON_YAML: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: CronWorkflow
metadata:
  name: nightly-chaos
spec:
  schedule: "0 3 * * *"
  concurrencyPolicy: Forbid
  workflowSpec:
    entrypoint: run
    templates:
      - name: node-drain
        inputs:
          artifacts:
            - name: node-drain
              raw:
                data: |
                  kind: ChaosEngine
                  metadata:
                    generateName: node-drain
                  spec:
                    experiments:
                      - name: node-drain
"#;

const SCHEDULE_YAML: &str = r#"
apiVersion: litmuschaos.io/v1alpha1
kind: ChaosSchedule
metadata:
  name: weekly-network
  labels:
    weight: "15"
spec:
  schedule:
    repeat:
      properties:
        minChaosInterval: "2m"
  engineTemplateSpec:
    engineState: active
    experiments:
      - name: pod-network-loss
"#;

fn identity() -> IdentityLabels {
    IdentityLabels::new("exp-42".into(), "infra-7".into(), "rev-3".into())
}

fn weights(pairs: &[(&str, u32)]) -> WeightTable {
    pairs.iter().map(|(n, w)| FaultWeight::new(*n, *w)).collect()
}

fn doc(manifest: &str) -> Value {
    serde_json::from_str(manifest).unwrap()
}

#[test]
fn test_workflow_reconciliation() {
    let result = ChaosManifest::classify(WORKFLOW_YAML, "podtato-head-chaos", &identity(), &WeightTable::new()).unwrap();

    assert_eq!(result.kind, ManifestKind::Workflow);
    assert_eq!(
        result.inferred_weights,
        vec![FaultWeight::new("pod-delete", 10), FaultWeight::new("pod-cpu-hog", 7)]
    );
    assert_eq!(result.weight_table, weights(&[("pod-delete", 10), ("pod-cpu-hog", 7)]));

    let manifest = doc(&result.manifest);
    let root = &manifest["metadata"]["labels"];
    assert_eq!(root["subject"], "podtato-head");
    assert_eq!(root["workflow_id"], "exp-42");
    assert_eq!(root["infra_id"], "infra-7");
    assert_eq!(root["revision_id"], "rev-3");
    assert_eq!(root["workflows.argoproj.io/controller-instanceid"], "infra-7");
    assert!(root.get("type").is_none());

    let templates = manifest["spec"]["templates"].as_array().unwrap();
    assert_eq!(templates[2]["metadata"]["labels"]["weight"], "10");
    assert_eq!(templates[3]["metadata"]["labels"]["weight"], "7");
    assert_eq!(templates[3]["metadata"]["labels"]["team"], "platform");
    // Non-fault templates are left alone
    assert!(templates[1].get("metadata").is_none());
    assert!(templates[4].get("metadata").is_none());
}

#[test]
fn test_weight_conservation_without_declared_weights() {
    for n in 1..=6 {
        let faults: Vec<String> = (0..n).map(|i| format!("fault-{}", i)).collect();
        let templates: Vec<Value> = faults
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f,
                    "inputs": {"artifacts": [{"raw": {"data": format!(
                        "kind: ChaosEngine\nmetadata:\n  generateName: {f}\nspec:\n  experiments:\n    - name: {f}\n"
                    )}}]}
                })
            })
            .collect();
        let raw = serde_json::json!({
            "kind": "Workflow",
            "metadata": {"name": "wf"},
            "spec": {"templates": templates}
        })
        .to_string();

        let result = ChaosManifest::classify(&raw, "wf", &identity(), &WeightTable::new()).unwrap();
        assert_eq!(result.weight_table.len(), n);
        assert!(result.weight_table.iter().all(|(_, w)| w == 10));
        assert_eq!(result.inferred_weights.len(), n);
    }
}

#[test]
fn test_declared_weight_overrides_stale_label() {
    let declared = weights(&[("pod-cpu-hog", 50)]);
    let result = ChaosManifest::classify(WORKFLOW_YAML, "podtato-head-chaos", &identity(), &declared).unwrap();

    assert_eq!(result.inferred_weights, vec![FaultWeight::new("pod-delete", 10)]);
    assert_eq!(result.weight_table.get("pod-cpu-hog"), Some(50));
    let manifest = doc(&result.manifest);
    assert_eq!(manifest["spec"]["templates"][3]["metadata"]["labels"]["weight"], "50");
}

#[test]
fn test_reclassification_is_byte_identical() {
    let declared = weights(&[("pod-delete", 20)]);
    for (raw, name) in [
        (WORKFLOW_YAML, "podtato-head-chaos"),
        (CRON_YAML, "nightly-chaos"),
        (SCHEDULE_YAML, "weekly-network"),
    ] {
        let first = ChaosManifest::classify(raw, name, &identity(), &declared).unwrap();
        let second = ChaosManifest::classify(&first.manifest, name, &identity(), &declared).unwrap();
        assert_eq!(first.manifest, second.manifest, "{} drifted", name);
        assert_eq!(first.weight_table, second.weight_table);
    }
}

#[test]
fn test_cron_workflow_surfaces_schedule() {
    let result = ChaosManifest::classify(CRON_YAML, "nightly-chaos", &identity(), &WeightTable::new()).unwrap();

    assert_eq!(result.kind, ManifestKind::CronWorkflow);
    assert_eq!(result.cron_syntax.as_deref(), Some("0 3 * * *"));
    assert_eq!(result.inferred_weights, vec![FaultWeight::new("node-drain", 10)]);

    let manifest = doc(&result.manifest);
    let nested = &manifest["spec"]["workflowMetadata"]["labels"];
    assert_eq!(nested["workflow_id"], "exp-42");
    assert_eq!(nested["workflows.argoproj.io/controller-instanceid"], "infra-7");
    assert_eq!(
        manifest["spec"]["workflowSpec"]["templates"][0]["metadata"]["labels"]["weight"],
        "10"
    );
}

#[test]
fn test_chaos_schedule_keeps_prior_label() {
    let result = ChaosManifest::classify(SCHEDULE_YAML, "weekly-network", &identity(), &WeightTable::new()).unwrap();

    assert_eq!(result.kind, ManifestKind::ChaosSchedule);
    assert_eq!(result.inferred_weights, vec![FaultWeight::new("pod-network-loss", 15)]);
    let labels = &doc(&result.manifest)["metadata"]["labels"];
    assert_eq!(labels["weight"], "15");
    assert_eq!(labels["type"], "standalone_workflow");
}

#[test]
fn test_embedded_engine_without_faults_is_rejected() {
    let raw = WORKFLOW_YAML.replace(
        "                  experiments:\n                    - name: pod-delete\n",
        "                  experiments: []\n",
    );
    assert!(matches!(
        ChaosManifest::classify(&raw, "podtato-head-chaos", &identity(), &WeightTable::new()),
        Err(ManifestError::NoFaults(_))
    ));
}

#[test]
fn test_kind_is_case_insensitive_and_closed() {
    let raw = SCHEDULE_YAML.replace("kind: ChaosSchedule", "kind: CHAOSSCHEDULE");
    let result = ChaosManifest::classify(&raw, "weekly-network", &identity(), &WeightTable::new()).unwrap();
    assert_eq!(result.kind, ManifestKind::ChaosSchedule);

    let raw = SCHEDULE_YAML.replace("kind: ChaosSchedule", "kind: ChaosResult");
    assert!(matches!(
        ChaosManifest::classify(&raw, "weekly-network", &identity(), &WeightTable::new()),
        Err(ManifestError::UnsupportedKind(kind)) if kind == "ChaosResult"
    ));
}
