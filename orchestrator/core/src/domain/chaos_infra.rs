// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chaos infrastructure as seen by the experiment lifecycle: an activity flag
//! and the owning project. Registration and health tracking live elsewhere.

use serde::{Deserialize, Serialize};

use crate::domain::experiment::{InfraId, ProjectId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosInfra {
    pub infra_id: InfraId,
    pub project_id: ProjectId,
    pub is_active: bool,
}

impl ChaosInfra {
    /// Reason the infrastructure may not receive experiments for `project_id`.
    pub fn admission_error(&self, project_id: &ProjectId) -> Option<String> {
        if !self.is_active {
            return Some(format!(
                "experiment scheduling failed due to inactive infra {}",
                self.infra_id
            ));
        }
        if &self.project_id != project_id {
            return Some(format!(
                "project {} doesn't match with the chaos_infra identifiers",
                project_id
            ));
        }
        None
    }
}
