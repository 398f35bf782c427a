// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Schema
//!
//! | Table | Key | Holds |
//! |-------|-----|-------|
//! | `chaos_experiments` | `experiment_id` | Experiment-level fields and audit |
//! | `chaos_experiment_revisions` | `(experiment_id, position)` | Ordered revisions |
//! | `chaos_experiment_runs` | `run_id` | Run records and removal flag |
//! | `chaos_infrastructures` | `infra_id` | Activity and owning project |
//!
//! `position` is dense and zero-based; it is the only source of revision
//! order.

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::repository::RepositoryError;

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS chaos_experiments (
        experiment_id   TEXT PRIMARY KEY,
        project_id      TEXT NOT NULL,
        infra_id        TEXT NOT NULL,
        experiment_type TEXT NOT NULL,
        cron_syntax     TEXT,
        is_custom       BOOLEAN NOT NULL DEFAULT FALSE,
        name            TEXT NOT NULL,
        description     TEXT,
        tags            JSONB NOT NULL DEFAULT '[]'::jsonb,
        recent_runs     JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at      TIMESTAMPTZ NOT NULL,
        created_by      TEXT NOT NULL,
        updated_at      TIMESTAMPTZ NOT NULL,
        updated_by      TEXT NOT NULL,
        is_removed      BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_chaos_experiments_project
        ON chaos_experiments (project_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chaos_experiment_revisions (
        experiment_id TEXT NOT NULL REFERENCES chaos_experiments (experiment_id),
        position      INTEGER NOT NULL,
        revision_id   TEXT NOT NULL,
        manifest      TEXT NOT NULL,
        weightages    JSONB NOT NULL DEFAULT '{}'::jsonb,
        updated_at    TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (experiment_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chaos_experiment_runs (
        run_id        TEXT PRIMARY KEY,
        experiment_id TEXT NOT NULL,
        project_id    TEXT NOT NULL,
        infra_id      TEXT NOT NULL,
        revision_id   TEXT NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL,
        created_by    TEXT NOT NULL,
        updated_at    TIMESTAMPTZ NOT NULL,
        updated_by    TEXT NOT NULL,
        is_removed    BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_chaos_experiment_runs_experiment
        ON chaos_experiment_runs (experiment_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chaos_infrastructures (
        infra_id   TEXT PRIMARY KEY,
        project_id TEXT NOT NULL,
        is_active  BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
];

/// Create every table and index the repositories need. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), RepositoryError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to apply schema: {}", e)))?;
    }
    info!(statements = SCHEMA_STATEMENTS.len(), "Chaos schema is up to date");
    Ok(())
}
