//! Postgres-backed store for monthly region aggregates

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::debug;

use crate::ingest::models::RegionConsumption;

use super::ConsumptionStore;

#[derive(Debug, Clone)]
pub struct PgConsumptionStore {
    pool: PgPool,
}

impl PgConsumptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConsumptionStore for PgConsumptionStore {
    async fn count_for_month(&self, month: NaiveDate) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM region_consumption WHERE month = $1",
        )
        .bind(month)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn replace_month(&self, month: NaiveDate, rows: &[RegionConsumption]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        // Delete-before-insert keeps at most one live row set per month even
        // though there is no unique constraint on (region, month).
        let deleted = sqlx::query("DELETE FROM region_consumption WHERE month = $1")
            .bind(month)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO region_consumption
                    (id, region, category, month, total_consumption,
                     record_count, processed_at, source_file)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(row.id)
            .bind(&row.region)
            .bind(&row.category)
            .bind(row.month)
            .bind(row.total_consumption)
            .bind(row.record_count)
            .bind(row.processed_at)
            .bind(&row.source_file)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(%month, deleted, inserted = rows.len(), "replaced month aggregates");
        Ok(deleted)
    }

    async fn fetch_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RegionConsumption>> {
        let rows = sqlx::query_as::<_, RegionConsumption>(
            r#"
            SELECT id, region, category, month, total_consumption,
                   record_count, processed_at, source_file
            FROM region_consumption
            WHERE month >= $1 AND month <= $2
            ORDER BY month, region
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn latest_month(&self) -> Result<Option<NaiveDate>> {
        let month: Option<NaiveDate> =
            sqlx::query_scalar("SELECT MAX(month) FROM region_consumption")
                .fetch_one(&self.pool)
                .await?;

        Ok(month)
    }
}
