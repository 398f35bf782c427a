// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Experiment Run Domain Model
//!
//! `ExperimentRun` is a sibling aggregate of `Experiment`, keyed by its own
//! run id and pointing back at the experiment and the revision it was
//! launched from. Completed runs report per-fault execution nodes, which
//! feed the resiliency scorer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::experiment::{Audit, AuditStamp, ExperimentId, InfraId, ProjectId, RevisionId, RunId};

/// Lookup key for a persisted run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub run_id: RunId,
    pub project_id: ProjectId,
}

impl RunKey {
    pub fn new(run_id: RunId, project_id: ProjectId) -> Self {
        Self { run_id, project_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRun {
    pub run_id: RunId,
    pub experiment_id: ExperimentId,
    pub project_id: ProjectId,
    pub infra_id: InfraId,
    pub revision_id: RevisionId,
    pub audit: Audit,
}

impl ExperimentRun {
    pub fn new(
        run_id: RunId,
        experiment_id: ExperimentId,
        project_id: ProjectId,
        infra_id: InfraId,
        revision_id: RevisionId,
        stamp: &AuditStamp,
    ) -> Self {
        Self {
            run_id,
            experiment_id,
            project_id,
            infra_id,
            revision_id,
            audit: Audit::created(stamp),
        }
    }

    pub fn key(&self) -> RunKey {
        RunKey::new(self.run_id.clone(), self.project_id.clone())
    }

    pub fn is_removed(&self) -> bool {
        self.audit.is_removed
    }

    pub fn set_removed(&mut self, is_removed: bool, stamp: &AuditStamp) {
        self.audit.is_removed = is_removed;
        self.audit.touch(stamp);
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.audit.updated_at
    }
}

// ============================================================================
// Execution Results
// ============================================================================

/// Verdict reported by the agent for one fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FaultVerdict {
    Pass,
    Fail,
    Awaited,
    Stopped,
    /// `N/A`, or no verdict reported at all
    #[default]
    NotApplicable,
}

impl FaultVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultVerdict::Pass => "Pass",
            FaultVerdict::Fail => "Fail",
            FaultVerdict::Awaited => "Awaited",
            FaultVerdict::Stopped => "Stopped",
            FaultVerdict::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for FaultVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultVerdict {
    type Err = UnknownVerdict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pass" => Ok(FaultVerdict::Pass),
            "Fail" => Ok(FaultVerdict::Fail),
            "Awaited" => Ok(FaultVerdict::Awaited),
            "Stopped" => Ok(FaultVerdict::Stopped),
            "N/A" | "" => Ok(FaultVerdict::NotApplicable),
            other => Err(UnknownVerdict(other.to_string())),
        }
    }
}

impl TryFrom<String> for FaultVerdict {
    type Error = UnknownVerdict;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FaultVerdict> for String {
    fn from(verdict: FaultVerdict) -> Self {
        verdict.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fault verdict '{0}'")]
pub struct UnknownVerdict(pub String);

/// Chaos-specific payload of an execution node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosData {
    #[serde(default)]
    pub engine_name: String,
    #[serde(default)]
    pub fault_verdict: FaultVerdict,
    /// Integer 0–100, string-encoded on the wire
    #[serde(default)]
    pub probe_success_percentage: String,
}

impl ChaosData {
    /// Parsed probe success; anything unparsable counts as 0, clamped to 0..=100.
    pub fn probe_success(&self) -> u64 {
        self.probe_success_percentage
            .trim()
            .parse::<i64>()
            .map(|p| p.clamp(0, 100) as u64)
            .unwrap_or(0)
    }
}

pub const CHAOS_ENGINE_NODE: &str = "ChaosEngine";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionNode {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaos_data: Option<ChaosData>,
}

impl ExecutionNode {
    /// Chaos payload of a fault node; `None` for every other node.
    pub fn fault(&self) -> Option<&ChaosData> {
        if self.node_type == CHAOS_ENGINE_NODE {
            self.chaos_data.as_ref()
        } else {
            None
        }
    }
}

/// Raw results of a completed run as reported by the agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionData {
    #[serde(rename = "revisionID")]
    pub revision_id: RevisionId,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub nodes: BTreeMap<String, ExecutionNode>,
}

/// Derived result of scoring a completed run; never persisted by the core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResiliencyResult {
    pub total_experiments: usize,
    pub faults_passed: u32,
    pub faults_failed: u32,
    pub faults_awaited: u32,
    pub faults_stopped: u32,
    pub faults_na: u32,
    pub resiliency_score: f64,
}

impl ResiliencyResult {
    pub fn tally(&mut self, verdict: FaultVerdict) {
        match verdict {
            FaultVerdict::Pass => self.faults_passed += 1,
            FaultVerdict::Fail => self.faults_failed += 1,
            FaultVerdict::Awaited => self.faults_awaited += 1,
            FaultVerdict::Stopped => self.faults_stopped += 1,
            FaultVerdict::NotApplicable => self.faults_na += 1,
        }
    }
}
