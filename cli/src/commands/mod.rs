// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the chaos CLI

pub mod config;
pub mod db;
pub mod experiment;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::experiment::ExperimentCommand;
pub use self::run::RunCommand;

use chaos_core::domain::experiment::FaultWeight;

/// Parse a `FAULT=WEIGHT` pair given on the command line.
pub fn parse_weight(arg: &str) -> Result<FaultWeight, String> {
    let (fault, weight) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected FAULT=WEIGHT, got '{}'", arg))?;
    let fault = fault.trim();
    if fault.is_empty() {
        return Err(format!("missing fault name in '{}'", arg));
    }
    let weight = weight
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("weight of '{}' must be a non-negative integer", fault))?;
    Ok(FaultWeight::new(fault, weight))
}
