// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::chaos_infra::ChaosInfra;
use crate::domain::experiment::InfraId;
use crate::domain::repository::{ChaosInfraRepository, RepositoryError};

pub struct PostgresChaosInfraRepository {
    pool: PgPool,
}

impl PostgresChaosInfraRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChaosInfraRepository for PostgresChaosInfraRepository {
    async fn find_by_id(&self, infra_id: &InfraId) -> Result<Option<ChaosInfra>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT infra_id, project_id, is_active
            FROM chaos_infrastructures
            WHERE infra_id = $1
            "#,
        )
        .bind(infra_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ChaosInfra {
            infra_id: row.try_get::<String, _>("infra_id")?.into(),
            project_id: row.try_get::<String, _>("project_id")?.into(),
            is_active: row.try_get("is_active")?,
        }))
    }
}
