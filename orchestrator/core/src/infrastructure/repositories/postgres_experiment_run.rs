// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::experiment::{Audit, AuditStamp, ExperimentId, RunId};
use crate::domain::experiment_run::{ExperimentRun, RunKey};
use crate::domain::repository::{ExperimentRunRepository, RepositoryError};

pub struct PostgresExperimentRunRepository {
    pool: PgPool,
}

impl PostgresExperimentRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn run_from_row(row: &PgRow) -> Result<ExperimentRun, RepositoryError> {
        Ok(ExperimentRun {
            run_id: row.try_get::<String, _>("run_id")?.into(),
            experiment_id: row.try_get::<String, _>("experiment_id")?.into(),
            project_id: row.try_get::<String, _>("project_id")?.into(),
            infra_id: row.try_get::<String, _>("infra_id")?.into(),
            revision_id: row.try_get::<String, _>("revision_id")?.into(),
            audit: Audit {
                created_at: row.try_get("created_at")?,
                created_by: row.try_get("created_by")?,
                updated_at: row.try_get("updated_at")?,
                updated_by: row.try_get("updated_by")?,
                is_removed: row.try_get("is_removed")?,
            },
        })
    }
}

const RUN_COLUMNS: &str = "run_id, experiment_id, project_id, infra_id, revision_id, \
                           created_at, created_by, updated_at, updated_by, is_removed";

#[async_trait]
impl ExperimentRunRepository for PostgresExperimentRunRepository {
    async fn save(&self, run: &ExperimentRun) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO chaos_experiment_runs (
                run_id, experiment_id, project_id, infra_id, revision_id,
                created_at, created_by, updated_at, updated_by, is_removed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (run_id) DO UPDATE SET
                revision_id = EXCLUDED.revision_id,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by,
                is_removed = EXCLUDED.is_removed
            "#,
        )
        .bind(run.run_id.as_str())
        .bind(run.experiment_id.as_str())
        .bind(run.project_id.as_str())
        .bind(run.infra_id.as_str())
        .bind(run.revision_id.as_str())
        .bind(run.audit.created_at)
        .bind(&run.audit.created_by)
        .bind(run.audit.updated_at)
        .bind(&run.audit.updated_by)
        .bind(run.audit.is_removed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, run_id: &RunId) -> Result<Option<ExperimentRun>, RepositoryError> {
        let query = format!("SELECT {} FROM chaos_experiment_runs WHERE run_id = $1", RUN_COLUMNS);
        let row = sqlx::query(&query)
            .bind(run_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::run_from_row).transpose()
    }

    async fn find_by_experiment(&self, experiment_id: &ExperimentId) -> Result<Vec<ExperimentRun>, RepositoryError> {
        let query = format!(
            "SELECT {} FROM chaos_experiment_runs WHERE experiment_id = $1 ORDER BY created_at ASC",
            RUN_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(experiment_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::run_from_row).collect()
    }

    async fn set_removed(&self, key: &RunKey, is_removed: bool, stamp: &AuditStamp) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE chaos_experiment_runs
            SET is_removed = $3, updated_at = $4, updated_by = $5
            WHERE run_id = $1 AND project_id = $2
            "#,
        )
        .bind(key.run_id.as_str())
        .bind(key.project_id.as_str())
        .bind(is_removed)
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("experiment run {}", key.run_id)));
        }
        Ok(())
    }
}
