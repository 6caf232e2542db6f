//! Postgres-backed store for pipeline audit records

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::ingest::models::ProcessingRun;

use super::RunStore;

#[derive(Debug, Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw row shape; status is stored as text and parsed on the way out.
#[derive(Debug, sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    period_label: String,
    status: String,
    error_message: Option<String>,
    records_processed: i64,
    records_filtered: i64,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RunRow> for ProcessingRun {
    type Error = anyhow::Error;

    fn try_from(row: RunRow) -> Result<Self> {
        Ok(ProcessingRun {
            id: row.id,
            period_label: row.period_label,
            status: row.status.parse()?,
            error_message: row.error_message,
            records_processed: row.records_processed,
            records_filtered: row.records_filtered,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create(&self, run: &ProcessingRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processing_runs
                (id, period_label, status, error_message,
                 records_processed, records_filtered, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(run.id)
        .bind(&run.period_label)
        .bind(run.status.as_str())
        .bind(&run.error_message)
        .bind(run.records_processed)
        .bind(run.records_filtered)
        .bind(run.started_at)
        .bind(run.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, run: &ProcessingRun) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE processing_runs
            SET status = $2,
                error_message = $3,
                records_processed = $4,
                records_filtered = $5,
                completed_at = $6
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(run.status.as_str())
        .bind(&run.error_message)
        .bind(run.records_processed)
        .bind(run.records_filtered)
        .bind(run.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ProcessingRun>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, period_label, status, error_message,
                   records_processed, records_filtered, started_at, completed_at
            FROM processing_runs
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProcessingRun::try_from).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingRun>> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, period_label, status, error_message,
                   records_processed, records_filtered, started_at, completed_at
            FROM processing_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProcessingRun::try_from).transpose()
    }
}
