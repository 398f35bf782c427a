// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Postgres, Row, Transaction};
use tracing::debug;

use crate::domain::experiment::{
    Audit, AuditStamp, Experiment, ExperimentId, ExperimentKey, ExperimentPatch, ResourceDetails, Revision,
    RevisionId, RunId, WeightTable,
};
use crate::domain::manifest::ManifestKind;
use crate::domain::repository::{ExperimentRepository, ExperimentTransaction, RepositoryError};

pub struct PostgresExperimentRepository {
    pool: PgPool,
}

impl PostgresExperimentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_revision(
        conn: &mut PgConnection,
        experiment_id: &ExperimentId,
        position: i32,
        revision: &Revision,
    ) -> Result<(), RepositoryError> {
        let weightages = serde_json::to_value(&revision.weight_table)?;
        sqlx::query(
            r#"
            INSERT INTO chaos_experiment_revisions (experiment_id, position, revision_id, manifest, weightages, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(experiment_id.as_str())
        .bind(position)
        .bind(revision.revision_id.as_str())
        .bind(&revision.manifest)
        .bind(&weightages)
        .bind(revision.updated_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Lock the experiment row for the rest of the transaction.
    async fn lock_experiment(conn: &mut PgConnection, key: &ExperimentKey) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            SELECT experiment_id
            FROM chaos_experiments
            WHERE experiment_id = $1 AND project_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.experiment_id.as_str())
        .bind(key.project_id.as_str())
        .fetch_optional(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| RepositoryError::NotFound(format!("experiment {}", key.experiment_id)))
    }

    fn revision_from_row(row: &PgRow) -> Result<Revision, RepositoryError> {
        let weightages: serde_json::Value = row.try_get("weightages")?;
        let weight_table: WeightTable = serde_json::from_value(weightages)?;
        Ok(Revision {
            revision_id: RevisionId(row.try_get("revision_id")?),
            manifest: row.try_get("manifest")?,
            updated_at: row.try_get("updated_at")?,
            weight_table,
        })
    }

    fn experiment_from_row(row: &PgRow, revisions: Vec<Revision>) -> Result<Experiment, RepositoryError> {
        let experiment_id = ExperimentId(row.try_get("experiment_id")?);
        let experiment_type: String = row.try_get("experiment_type")?;
        let experiment_type = experiment_type
            .parse::<ManifestKind>()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let tags: serde_json::Value = row.try_get("tags")?;
        let recent_runs: serde_json::Value = row.try_get("recent_runs")?;
        let recent_runs: Vec<RunId> = serde_json::from_value(recent_runs)?;

        let patch = ExperimentPatch {
            experiment_type,
            cron_syntax: row.try_get("cron_syntax")?,
            details: ResourceDetails {
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                tags: serde_json::from_value(tags)?,
            },
            infra_id: row.try_get::<String, _>("infra_id")?.into(),
            is_custom: row.try_get("is_custom")?,
        };
        let audit = Audit {
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            created_by: row.try_get("created_by")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
            updated_by: row.try_get("updated_by")?,
            is_removed: row.try_get("is_removed")?,
        };

        Experiment::from_parts(
            experiment_id.clone(),
            row.try_get::<String, _>("project_id")?.into(),
            patch,
            audit,
            revisions,
            recent_runs,
        )
        .ok_or_else(|| RepositoryError::Serialization(format!("experiment {} has no revisions", experiment_id)))
    }
}

#[async_trait]
impl ExperimentRepository for PostgresExperimentRepository {
    async fn insert(&self, experiment: &Experiment) -> Result<(), RepositoryError> {
        let tags = serde_json::to_value(&experiment.details.tags)?;
        let recent_runs = serde_json::to_value(&experiment.recent_runs)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO chaos_experiments (
                experiment_id, project_id, infra_id, experiment_type, cron_syntax, is_custom,
                name, description, tags, recent_runs,
                created_at, created_by, updated_at, updated_by, is_removed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(experiment.experiment_id.as_str())
        .bind(experiment.project_id.as_str())
        .bind(experiment.infra_id.as_str())
        .bind(experiment.experiment_type.as_str())
        .bind(&experiment.cron_syntax)
        .bind(experiment.is_custom)
        .bind(&experiment.details.name)
        .bind(&experiment.details.description)
        .bind(&tags)
        .bind(&recent_runs)
        .bind(experiment.audit.created_at)
        .bind(&experiment.audit.created_by)
        .bind(experiment.audit.updated_at)
        .bind(&experiment.audit.updated_by)
        .bind(experiment.audit.is_removed)
        .execute(&mut *tx)
        .await?;

        for (position, revision) in experiment.revisions().iter().enumerate() {
            Self::insert_revision(&mut tx, &experiment.experiment_id, position as i32, revision).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &ExperimentId) -> Result<Option<Experiment>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT experiment_id, project_id, infra_id, experiment_type, cron_syntax, is_custom,
                   name, description, tags, recent_runs,
                   created_at, created_by, updated_at, updated_by, is_removed
            FROM chaos_experiments
            WHERE experiment_id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let revision_rows = sqlx::query(
            r#"
            SELECT revision_id, manifest, weightages, updated_at
            FROM chaos_experiment_revisions
            WHERE experiment_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let revisions = revision_rows
            .iter()
            .map(Self::revision_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Self::experiment_from_row(&row, revisions).map(Some)
    }

    async fn append_revision(
        &self,
        key: &ExperimentKey,
        patch: &ExperimentPatch,
        revision: &Revision,
        stamp: &AuditStamp,
    ) -> Result<(), RepositoryError> {
        let tags = serde_json::to_value(&patch.details.tags)?;

        let mut tx = self.pool.begin().await?;
        Self::lock_experiment(&mut tx, key).await?;

        let position: i32 = sqlx::query(
            r#"
            SELECT COALESCE(MAX(position) + 1, 0) AS next_position
            FROM chaos_experiment_revisions
            WHERE experiment_id = $1
            "#,
        )
        .bind(key.experiment_id.as_str())
        .fetch_one(&mut *tx)
        .await?
        .try_get("next_position")?;

        sqlx::query(
            r#"
            UPDATE chaos_experiments
            SET experiment_type = $3, cron_syntax = $4, name = $5, description = $6, tags = $7,
                infra_id = $8, is_custom = $9, updated_at = $10, updated_by = $11
            WHERE experiment_id = $1 AND project_id = $2
            "#,
        )
        .bind(key.experiment_id.as_str())
        .bind(key.project_id.as_str())
        .bind(patch.experiment_type.as_str())
        .bind(&patch.cron_syntax)
        .bind(&patch.details.name)
        .bind(&patch.details.description)
        .bind(&tags)
        .bind(patch.infra_id.as_str())
        .bind(patch.is_custom)
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(&mut *tx)
        .await?;

        Self::insert_revision(&mut tx, &key.experiment_id, position, revision).await?;
        tx.commit().await?;

        debug!(experiment_id = %key.experiment_id, position, "Appended experiment revision");
        Ok(())
    }

    async fn replace_revision_manifest(
        &self,
        key: &ExperimentKey,
        revision_id: &RevisionId,
        manifest: &str,
        stamp: &AuditStamp,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_experiment(&mut tx, key).await?;

        let result = sqlx::query(
            r#"
            UPDATE chaos_experiment_revisions
            SET manifest = $3, updated_at = $4
            WHERE experiment_id = $1 AND revision_id = $2
            "#,
        )
        .bind(key.experiment_id.as_str())
        .bind(revision_id.as_str())
        .bind(manifest)
        .bind(stamp.at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("revision {}", revision_id)));
        }

        sqlx::query(
            r#"
            UPDATE chaos_experiments
            SET updated_at = $3, updated_by = $4
            WHERE experiment_id = $1 AND project_id = $2
            "#,
        )
        .bind(key.experiment_id.as_str())
        .bind(key.project_id.as_str())
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn ExperimentTransaction>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        sqlx::query("SET LOCAL synchronous_commit = on")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PostgresExperimentTransaction { tx }))
    }
}

/// Dropping without `commit` rolls back.
pub struct PostgresExperimentTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ExperimentTransaction for PostgresExperimentTransaction {
    async fn mark_experiment_removed(&mut self, key: &ExperimentKey, stamp: &AuditStamp) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE chaos_experiments
            SET is_removed = TRUE, updated_at = $3, updated_by = $4
            WHERE experiment_id = $1 AND project_id = $2
            "#,
        )
        .bind(key.experiment_id.as_str())
        .bind(key.project_id.as_str())
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("experiment {}", key.experiment_id)));
        }
        Ok(())
    }

    async fn mark_runs_removed(&mut self, experiment_id: &ExperimentId, stamp: &AuditStamp) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE chaos_experiment_runs
            SET is_removed = TRUE, updated_at = $2, updated_by = $3
            WHERE experiment_id = $1
            "#,
        )
        .bind(experiment_id.as_str())
        .bind(stamp.at)
        .bind(&stamp.actor)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
