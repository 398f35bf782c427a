// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Subscriber Dispatch Contract
//!
//! After a write is committed, the lifecycle service tells the target
//! infrastructure's subscriber what changed. Delivery is fire-and-forget:
//! the core enqueues the request and never waits for the agent.
//!
//! Notification is optional per call. Callers that pass no notifier
//! (e.g. data backfills) get persistence without downstream dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::experiment::{ExperimentId, InfraId, ProjectId, RunId};

/// What the subscriber should do with the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchIntent {
    Create,
    Update,
    WorkflowDelete,
    WorkflowRunDelete,
}

impl DispatchIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchIntent::Create => "create",
            DispatchIntent::Update => "update",
            DispatchIntent::WorkflowDelete => "workflow_delete",
            DispatchIntent::WorkflowRunDelete => "workflow_run_delete",
        }
    }
}

impl fmt::Display for DispatchIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full manifest for create/update, a bare reference for deletes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DispatchPayload {
    Manifest {
        experiment_id: ExperimentId,
        manifest: String,
    },
    Experiment(ExperimentId),
    Run(RunId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub project_id: ProjectId,
    pub infra_id: InfraId,
    pub payload: DispatchPayload,
    pub actor: String,
    pub intent: DispatchIntent,
}

impl DispatchRequest {
    pub fn run_id(&self) -> Option<&RunId> {
        match &self.payload {
            DispatchPayload::Run(run_id) => Some(run_id),
            _ => None,
        }
    }
}

/// Outbound port to the subscriber transport
pub trait ExperimentNotifier: Send + Sync {
    /// Enqueue a request. Must not block on agent acknowledgement.
    fn notify(&self, request: DispatchRequest) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no subscriber connected for infrastructure {0}")]
    NoSubscriber(InfraId),

    #[error("dispatch channel closed")]
    Closed,

    #[error("dispatch failed: {0}")]
    Other(String),
}
