// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for scoring completed runs
//!
//! Experiments are created through the lifecycle use cases so the weight
//! table used for scoring is the one recorded on the stored revision.

use std::sync::Arc;

use chaos_core::application::{
    parse_execution_data, CompleteExperimentRunUseCase, ExperimentLifecycleUseCase, ProcessExperimentUseCase,
    RevisionUpdate, StandardCompleteExperimentRunUseCase, StandardExperimentLifecycleUseCase,
    StandardProcessExperimentUseCase,
};
use chaos_core::domain::chaos_infra::ChaosInfra;
use chaos_core::domain::error::ChaosExperimentError;
use chaos_core::domain::experiment::{Actor, ExperimentRequest, FaultWeight};
use chaos_core::domain::resiliency::{MatchMode, ResiliencyScorer};
use chaos_core::infrastructure::repositories::{InMemoryChaosInfraRepository, InMemoryChaosStore};

const PROJECT: &str = "project-1";
const INFRA: &str = "infra-1";
const EXPERIMENT: &str = "exp-podtato";

fn workflow_manifest() -> String {
    let template = |fault: &str| {
        serde_json::json!({
            "name": fault,
            "inputs": {"artifacts": [{"name": fault, "raw": {"data": format!(
                "kind: ChaosEngine\nmetadata:\n  namespace: \"{{{{workflow.parameters.adminModeNamespace}}}}\"\n  generateName: {fault}\nspec:\n  experiments:\n    - name: {fault}\n"
            )}}]},
            "container": {"image": "litmuschaos/litmus-checker:latest"}
        })
    };
    serde_json::json!({
        "apiVersion": "argoproj.io/v1alpha1",
        "kind": "Workflow",
        "metadata": {"name": "podtato-head"},
        "spec": {"entrypoint": "main", "templates": [template("pod-delete"), template("pod-cpu-hog")]}
    })
    .to_string()
}

struct Harness {
    store: InMemoryChaosStore,
    process: StandardProcessExperimentUseCase,
    lifecycle: StandardExperimentLifecycleUseCase,
}

impl Harness {
    fn new() -> Self {
        let store = InMemoryChaosStore::new();
        let infras = InMemoryChaosInfraRepository::new();
        infras.register(ChaosInfra {
            infra_id: INFRA.into(),
            project_id: PROJECT.into(),
            is_active: true,
        });
        Self {
            process: StandardProcessExperimentUseCase::new(Arc::new(infras)),
            lifecycle: StandardExperimentLifecycleUseCase::new(Arc::new(store.clone()), Arc::new(store.clone())),
            store,
        }
    }

    fn scorer(&self, mode: MatchMode) -> StandardCompleteExperimentRunUseCase {
        StandardCompleteExperimentRunUseCase::new(Arc::new(self.store.clone()), ResiliencyScorer::new(mode))
    }

    async fn submit(&self, weights: Vec<FaultWeight>, revision: &str, create: bool) {
        let request = ExperimentRequest {
            experiment_id: Some(EXPERIMENT.into()),
            experiment_name: "podtato-head".to_string(),
            infra_id: INFRA.into(),
            experiment_manifest: workflow_manifest(),
            weightages: weights,
            ..Default::default()
        };
        let processed = self
            .process
            .process_experiment(request, &PROJECT.into(), &revision.into())
            .await
            .unwrap();
        let actor = Actor::new("admin");
        if create {
            self.lifecycle
                .create_experiment(&PROJECT.into(), &processed, &actor, None)
                .await
                .unwrap();
        } else {
            self.lifecycle
                .update_experiment(&PROJECT.into(), &processed, &actor, RevisionUpdate::Append, None)
                .await
                .unwrap();
        }
    }
}

fn execution_data(revision: &str, nodes: &[(&str, &str, &str)]) -> String {
    let nodes: serde_json::Map<String, serde_json::Value> = nodes
        .iter()
        .enumerate()
        .map(|(i, (engine, verdict, probe))| {
            (
                format!("podtato-head-{}", i),
                serde_json::json!({
                    "name": engine,
                    "type": "ChaosEngine",
                    "chaosData": {
                        "engineName": engine,
                        "faultVerdict": verdict,
                        "probeSuccessPercentage": probe
                    }
                }),
            )
        })
        .chain(std::iter::once((
            "podtato-head".to_string(),
            serde_json::json!({"name": "podtato-head", "type": "Steps"}),
        )))
        .collect();
    serde_json::json!({"revisionID": revision, "phase": "Completed", "nodes": nodes}).to_string()
}

fn weights(pairs: &[(&str, u32)]) -> Vec<FaultWeight> {
    pairs.iter().map(|(n, w)| FaultWeight::new(*n, *w)).collect()
}

#[tokio::test]
async fn test_completed_run_is_scored_against_revision_weights() {
    let h = Harness::new();
    h.submit(weights(&[("pod-delete", 10), ("pod-cpu-hog", 30)]), "rev-0", true)
        .await;

    let data = parse_execution_data(&execution_data(
        "rev-0",
        &[("pod-delete-x7k2p", "Pass", "100"), ("pod-cpu-hog-m4q9z", "Fail", "0")],
    ))
    .unwrap();
    let result = h
        .scorer(MatchMode::Substring)
        .process_completed_run(&data, &EXPERIMENT.into(), &"run-1".into())
        .await
        .unwrap();

    assert_eq!(result.resiliency_score, 0.25);
    assert_eq!(result.total_experiments, 2);
    assert_eq!(result.faults_passed, 1);
    assert_eq!(result.faults_failed, 1);
    assert_eq!(result.faults_na, 0);
}

#[tokio::test]
async fn test_each_revision_scores_with_its_own_weights() {
    let h = Harness::new();
    h.submit(weights(&[("pod-delete", 10), ("pod-cpu-hog", 30)]), "rev-0", true)
        .await;
    h.submit(weights(&[("pod-delete", 30), ("pod-cpu-hog", 10)]), "rev-1", false)
        .await;

    let nodes = [("pod-delete-a", "Pass", "100"), ("pod-cpu-hog-b", "Fail", "0")];
    let scorer = h.scorer(MatchMode::Substring);

    let old = parse_execution_data(&execution_data("rev-0", &nodes)).unwrap();
    let new = parse_execution_data(&execution_data("rev-1", &nodes)).unwrap();
    let old = scorer
        .process_completed_run(&old, &EXPERIMENT.into(), &"run-1".into())
        .await
        .unwrap();
    let new = scorer
        .process_completed_run(&new, &EXPERIMENT.into(), &"run-2".into())
        .await
        .unwrap();

    assert_eq!(old.resiliency_score, 0.25);
    assert_eq!(new.resiliency_score, 0.75);
}

#[tokio::test]
async fn test_zero_weights_score_zero_but_still_tally() {
    let h = Harness::new();
    h.submit(weights(&[("pod-delete", 0), ("pod-cpu-hog", 0)]), "rev-0", true)
        .await;

    let data = parse_execution_data(&execution_data(
        "rev-0",
        &[("pod-delete-a", "Pass", "100"), ("pod-cpu-hog-b", "Stopped", "50")],
    ))
    .unwrap();
    let result = h
        .scorer(MatchMode::Substring)
        .process_completed_run(&data, &EXPERIMENT.into(), &"run-1".into())
        .await
        .unwrap();

    assert_eq!(result.resiliency_score, 0.0);
    assert_eq!(result.faults_passed, 1);
    assert_eq!(result.faults_stopped, 1);
}

#[tokio::test]
async fn test_exact_mode_ignores_generated_suffixes() {
    let h = Harness::new();
    h.submit(weights(&[("pod-delete", 10), ("pod-cpu-hog", 30)]), "rev-0", true)
        .await;

    let suffixed = parse_execution_data(&execution_data(
        "rev-0",
        &[("pod-delete-a", "Pass", "100"), ("pod-cpu-hog-b", "Pass", "100")],
    ))
    .unwrap();
    let exact = h.scorer(MatchMode::Exact);
    let result = exact
        .process_completed_run(&suffixed, &EXPERIMENT.into(), &"run-1".into())
        .await
        .unwrap();
    assert_eq!(result.resiliency_score, 0.0);
    assert_eq!(result.faults_passed, 2);

    let verbatim = parse_execution_data(&execution_data(
        "rev-0",
        &[("pod-delete", "Pass", "100"), ("pod-cpu-hog", "Pass", "60")],
    ))
    .unwrap();
    let result = exact
        .process_completed_run(&verbatim, &EXPERIMENT.into(), &"run-2".into())
        .await
        .unwrap();
    // (10*100 + 30*60) / 40 = 70
    assert_eq!(result.resiliency_score, 0.7);
}

#[tokio::test]
async fn test_unknown_experiment_or_revision_is_not_found() {
    let h = Harness::new();
    h.submit(weights(&[("pod-delete", 10)]), "rev-0", true).await;
    let scorer = h.scorer(MatchMode::Substring);

    let data = parse_execution_data(&execution_data("rev-9", &[("pod-delete-a", "Pass", "100")])).unwrap();
    assert!(matches!(
        scorer
            .process_completed_run(&data, &EXPERIMENT.into(), &"run-1".into())
            .await,
        Err(ChaosExperimentError::NotFound(_))
    ));

    let data = parse_execution_data(&execution_data("rev-0", &[("pod-delete-a", "Pass", "100")])).unwrap();
    assert!(matches!(
        scorer
            .process_completed_run(&data, &"exp-missing".into(), &"run-1".into())
            .await,
        Err(ChaosExperimentError::NotFound(_))
    ));
}

#[test]
fn test_malformed_execution_data_is_a_validation_error() {
    let unknown_verdict = execution_data("rev-0", &[("pod-delete-a", "Flaky", "100")]);
    assert!(matches!(
        parse_execution_data(&unknown_verdict),
        Err(ChaosExperimentError::Validation(_))
    ));
    assert!(matches!(
        parse_execution_data("{\"nodes\": {}}"),
        Err(ChaosExperimentError::Validation(_))
    ));

    let no_verdict = execution_data("rev-0", &[("pod-delete-a", "", "")]);
    let data = parse_execution_data(&no_verdict).unwrap();
    assert_eq!(data.nodes.len(), 2);
}
