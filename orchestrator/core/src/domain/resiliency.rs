// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Resiliency Scoring
//!
//! Aggregates the fault verdicts of a completed run into a single score
//! using the weight table recorded on the run's revision.
//!
//! # Formula
//!
//! ```text
//! weighted_sum = Σ weight(fault) × probe_success(fault)      (matched faults)
//! score        = floor(weighted_sum / Σ weight) / 100        (0 when Σ weight = 0)
//! ```
//!
//! The score is the weighted mean probe success expressed in [0, 1] and
//! truncated to two decimals, never rounded up.
//!
//! A fault is weighted once per run. When several nodes resolve to the same
//! fault, the first one in node-id order supplies its probe success; every
//! node is still tallied.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::experiment::WeightTable;
use crate::domain::experiment_run::{ExecutionData, ResiliencyResult};

/// How a reported engine name is matched against weight-table fault names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Engine name contains the fault name. Overlapping fault names are
    /// ambiguous; the first match in fault-name order wins.
    #[default]
    Substring,
    /// Engine name equals the fault name.
    Exact,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Substring => f.write_str("substring"),
            MatchMode::Exact => f.write_str("exact"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "substring" => Ok(MatchMode::Substring),
            "exact" => Ok(MatchMode::Exact),
            other => Err(format!("unknown match mode '{}': expected 'substring' or 'exact'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResiliencyScorer {
    mode: MatchMode,
}

impl ResiliencyScorer {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Fault name an engine name resolves to, if any.
    pub fn match_fault<'t>(&self, weights: &'t WeightTable, engine_name: &str) -> Option<(&'t str, u32)> {
        match self.mode {
            MatchMode::Exact => weights.iter().find(|(name, _)| *name == engine_name),
            MatchMode::Substring => weights.iter().find(|(name, _)| engine_name.contains(name)),
        }
    }

    pub fn score(&self, weights: &WeightTable, data: &ExecutionData) -> ResiliencyResult {
        let mut result = ResiliencyResult {
            total_experiments: weights.len(),
            ..Default::default()
        };
        let weight_sum = weights.total_weight();
        let mut weighted_sum: u64 = 0;
        let mut scored = BTreeSet::new();

        for fault in data.nodes.values().filter_map(|node| node.fault()) {
            if let Some((name, weight)) = self.match_fault(weights, &fault.engine_name) {
                if scored.insert(name) {
                    weighted_sum += u64::from(weight) * fault.probe_success();
                }
            }
            result.tally(fault.fault_verdict);
        }

        if weight_sum != 0 {
            result.resiliency_score = truncated_score(weighted_sum, weight_sum);
        }
        result
    }
}

/// `floor(weighted_sum / weight_sum) / 100`, computed in integers so the
/// truncation is exact.
fn truncated_score(weighted_sum: u64, weight_sum: u64) -> f64 {
    (weighted_sum / weight_sum) as f64 / 100.0
}
