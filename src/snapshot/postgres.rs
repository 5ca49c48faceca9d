use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::AggregateType;
use crate::event_store::StoreError;

use super::{Snapshot, SnapshotStore};

/// Snapshot store backed by the `snapshots` table
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn load(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, StoreError> {
        let row: Option<(Value, i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT state, version, created_at
            FROM snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(aggregate_type.as_str())
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(state, version, created_at)| Snapshot {
            aggregate_type,
            aggregate_id,
            state,
            version,
            created_at,
        }))
    }

    async fn save(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        state: Value,
        version: i64,
    ) -> Result<bool, StoreError> {
        // The WHERE on the conflict arm makes the highest version win regardless of arrival order
        let result = sqlx::query(
            r#"
            INSERT INTO snapshots (id, aggregate_type, aggregate_id, state, version)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_type, aggregate_id)
            DO UPDATE SET state = EXCLUDED.state,
                          version = EXCLUDED.version,
                          created_at = NOW()
            WHERE snapshots.version < EXCLUDED.version
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(aggregate_type.as_str())
        .bind(aggregate_id)
        .bind(state)
        .bind(version)
        .execute(&self.pool)
        .await?;

        let saved = result.rows_affected() > 0;
        if saved {
            tracing::info!(
                aggregate_type = %aggregate_type,
                aggregate_id = %aggregate_id,
                version,
                "Snapshot saved"
            );
        }

        Ok(saved)
    }

    async fn delete(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM snapshots WHERE aggregate_type = $1 AND aggregate_id = $2")
            .bind(aggregate_type.as_str())
            .bind(aggregate_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
