//! PostgreSQL read models
//!
//! One `*_views` table per aggregate type plus `projection_cursors`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::AggregateType;

use super::{ProjectionError, ReadModelStore, ViewRow};

type ViewRowTuple = (Uuid, String, Value, i64, Uuid, DateTime<Utc>);

fn view_table(aggregate_type: AggregateType) -> &'static str {
    match aggregate_type {
        AggregateType::Order => "order_views",
        AggregateType::Delivery => "delivery_views",
        AggregateType::Payment => "payment_views",
        AggregateType::Restaurant => "restaurant_views",
    }
}

fn into_view_row(aggregate_type: AggregateType, row: ViewRowTuple) -> ViewRow {
    let (aggregate_id, status, data, last_version, last_event_id, updated_at) = row;
    ViewRow {
        aggregate_type,
        aggregate_id,
        status,
        data,
        last_version,
        last_event_id,
        updated_at,
    }
}

#[derive(Debug, Clone)]
pub struct PgReadModelStore {
    pool: PgPool,
}

impl PgReadModelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadModelStore for PgReadModelStore {
    async fn load_row(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<Option<ViewRow>, ProjectionError> {
        let sql = format!(
            "SELECT aggregate_id, status, data, last_version, last_event_id, updated_at \
             FROM {} WHERE aggregate_id = $1",
            view_table(aggregate_type)
        );

        let row: Option<ViewRowTuple> = sqlx::query_as(&sql)
            .bind(aggregate_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| into_view_row(aggregate_type, row)))
    }

    async fn upsert_row(&self, row: &ViewRow) -> Result<bool, ProjectionError> {
        let table = view_table(row.aggregate_type);
        let sql = format!(
            r#"
            INSERT INTO {table} (aggregate_id, status, data, last_version, last_event_id, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (aggregate_id) DO UPDATE SET
                status = EXCLUDED.status,
                data = EXCLUDED.data,
                last_version = EXCLUDED.last_version,
                last_event_id = EXCLUDED.last_event_id,
                updated_at = EXCLUDED.updated_at
            WHERE {table}.last_version < EXCLUDED.last_version
            "#
        );

        let result = sqlx::query(&sql)
            .bind(row.aggregate_id)
            .bind(&row.status)
            .bind(&row.data)
            .bind(row.last_version)
            .bind(row.last_event_id)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_status(
        &self,
        aggregate_type: AggregateType,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ViewRow>, ProjectionError> {
        let sql = format!(
            "SELECT aggregate_id, status, data, last_version, last_event_id, updated_at \
             FROM {} WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY updated_at DESC LIMIT $2",
            view_table(aggregate_type)
        );

        let rows: Vec<ViewRowTuple> = sqlx::query_as(&sql)
            .bind(status)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| into_view_row(aggregate_type, row))
            .collect())
    }

    async fn load_cursor(&self, name: &str) -> Result<i64, ProjectionError> {
        let position: Option<i64> =
            sqlx::query_scalar("SELECT position FROM projection_cursors WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(position.unwrap_or(0))
    }

    async fn save_cursor(&self, name: &str, position: i64) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO projection_cursors (name, position, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (name) DO UPDATE SET position = EXCLUDED.position, updated_at = NOW()
            "#,
        )
        .bind(name)
        .bind(position)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset(&self, name: &str) -> Result<(), ProjectionError> {
        let mut tx = self.pool.begin().await?;

        for aggregate_type in AggregateType::ALL {
            sqlx::query(&format!("DELETE FROM {}", view_table(aggregate_type)))
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM projection_cursors WHERE name = $1")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(projection = name, "Read models reset");
        Ok(())
    }
}
