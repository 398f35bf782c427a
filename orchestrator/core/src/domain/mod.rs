// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: aggregates, value objects, policies and the ports the
//! application layer drives.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Experiment, revision and run model; weight and scoring policy

pub mod chaos_infra;
pub mod dispatch;
pub mod error;
pub mod experiment;
pub mod experiment_run;
pub mod manifest;
pub mod repository;
pub mod resiliency;
