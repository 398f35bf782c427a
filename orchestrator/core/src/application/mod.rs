// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod complete_experiment_run;
pub mod experiment_lifecycle;
pub mod process_experiment;
pub mod repository_factory;

// Re-export use cases for convenience
pub use complete_experiment_run::{
    parse_execution_data, CompleteExperimentRunUseCase, StandardCompleteExperimentRunUseCase,
};
pub use experiment_lifecycle::{ExperimentLifecycleUseCase, RevisionUpdate, StandardExperimentLifecycleUseCase};
pub use process_experiment::{ProcessExperimentUseCase, ProcessedExperiment, StandardProcessExperimentUseCase};
pub use repository_factory::{create_repositories, ChaosRepositories};
