// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chaos experiment core
//!
//! Manifest reconciliation, revisioned experiment records and resiliency
//! scoring for chaos experiments.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, use cases and storage adapters; no transport

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
