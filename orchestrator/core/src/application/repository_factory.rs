// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on storage backend
//! configuration, keeping the domain layer free of infrastructure types.
//!
//! The in-memory backend shares one store between experiments and runs so
//! the soft-delete transaction covers both collections.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wire repository trait objects for the configured backend

use anyhow::Result;
use std::sync::Arc;

use crate::domain::repository::{ChaosInfraRepository, ExperimentRepository, ExperimentRunRepository, StorageBackend};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryChaosInfraRepository, InMemoryChaosStore, PostgresChaosInfraRepository, PostgresExperimentRepository,
    PostgresExperimentRunRepository,
};

/// Repositories for one storage backend
#[derive(Clone)]
pub struct ChaosRepositories {
    pub experiments: Arc<dyn ExperimentRepository>,
    pub runs: Arc<dyn ExperimentRunRepository>,
    pub infrastructures: Arc<dyn ChaosInfraRepository>,
}

/// Creates every repository the use cases need for the configured backend
pub async fn create_repositories(backend: &StorageBackend) -> Result<ChaosRepositories> {
    match backend {
        StorageBackend::InMemory => {
            let store = InMemoryChaosStore::new();
            Ok(ChaosRepositories {
                experiments: Arc::new(store.clone()),
                runs: Arc::new(store),
                infrastructures: Arc::new(InMemoryChaosInfraRepository::new()),
            })
        }
        StorageBackend::PostgreSQL(config) => {
            let db = Database::new(&config.connection_string, config.max_connections).await?;
            let pool = db.get_pool().clone();
            Ok(ChaosRepositories {
                experiments: Arc::new(PostgresExperimentRepository::new(pool.clone())),
                runs: Arc::new(PostgresExperimentRunRepository::new(pool.clone())),
                infrastructures: Arc::new(PostgresChaosInfraRepository::new(pool)),
            })
        }
    }
}
