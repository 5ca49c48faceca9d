//! PostgreSQL event log
//!
//! Optimistic concurrency is enforced inside one transaction: the head
//! version is checked, then every event is inserted with its assigned
//! version. The unique `(aggregate_id, version)` index turns a racing
//! writer that passed the check into a conflict at insert time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::AggregateType;

use super::{EventLog, NewEvent, StoreError, StoredEvent};

/// Advisory lock key serializing appends to the global log
const APPEND_LOCK_KEY: i64 = 0x6576_656e_7473;

type EventRow = (
    Uuid,
    i64,
    String,
    Uuid,
    String,
    serde_json::Value,
    Option<serde_json::Value>,
    i64,
    DateTime<Utc>,
    Option<String>,
);

const SELECT_EVENTS: &str = r#"
    SELECT id, position, aggregate_type, aggregate_id, "type", payload, metadata,
           version, created_at, created_by
    FROM events
"#;

fn into_stored_event(row: EventRow) -> Result<StoredEvent, StoreError> {
    let (
        id,
        position,
        aggregate_type,
        aggregate_id,
        event_type,
        payload,
        metadata,
        version,
        created_at,
        created_by,
    ) = row;

    let aggregate_type = aggregate_type
        .parse()
        .map_err(|e: crate::domain::UnknownAggregateType| {
            StoreError::InvalidEventData(e.to_string())
        })?;

    Ok(StoredEvent {
        id,
        position,
        aggregate_type,
        aggregate_id,
        event_type,
        payload,
        metadata,
        version,
        created_at,
        created_by,
    })
}

/// Event log backed by the `events` table
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Create a new event store with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Highest version of a stream inside an open transaction
    async fn head_version(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<i64, StoreError> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(version) FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(aggregate_type.as_str())
        .bind(aggregate_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(version.unwrap_or(0))
    }

    async fn try_append(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current_version = Self::head_version(&mut tx, aggregate_type, aggregate_id).await?;
        if current_version != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                aggregate_type,
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        // Held until commit, so positions become visible in the order they were taken
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let mut appended = Vec::with_capacity(events.len());

        for (offset, event) in (1_i64..).zip(events) {
            let id = Uuid::new_v4();
            let version = expected_version + offset;

            let (position, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
                r#"
                INSERT INTO events (
                    id, aggregate_type, aggregate_id, "type",
                    payload, metadata, version, created_by
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING position, created_at
                "#,
            )
            .bind(id)
            .bind(aggregate_type.as_str())
            .bind(aggregate_id)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(&event.metadata)
            .bind(version)
            .bind(&event.created_by)
            .fetch_one(&mut *tx)
            .await?;

            appended.push(StoredEvent {
                id,
                position,
                aggregate_type,
                aggregate_id,
                event_type: event.event_type,
                payload: event.payload,
                metadata: event.metadata,
                version,
                created_at,
                created_by: event.created_by,
            });
        }

        tx.commit().await?;

        Ok(appended)
    }
}

fn is_unique_violation(error: &StoreError) -> bool {
    match error {
        StoreError::Unavailable(sqlx::Error::Database(db_error)) => db_error.is_unique_violation(),
        _ => false,
    }
}

#[async_trait]
impl EventLog for PgEventStore {
    async fn append(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        match self
            .try_append(aggregate_type, aggregate_id, expected_version, events)
            .await
        {
            Ok(appended) => {
                tracing::debug!(
                    aggregate_type = %aggregate_type,
                    aggregate_id = %aggregate_id,
                    from_version = expected_version + 1,
                    count = appended.len(),
                    "Events appended"
                );
                Ok(appended)
            }
            // Another writer inserted the same version between our check and insert
            Err(e) if is_unique_violation(&e) => {
                let actual = self.current_version(aggregate_type, aggregate_id).await?;
                Err(StoreError::ConcurrencyConflict {
                    aggregate_type,
                    aggregate_id,
                    expected: expected_version,
                    actual,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn read_stream(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let sql = format!(
            "{SELECT_EVENTS} WHERE aggregate_type = $1 AND aggregate_id = $2 AND version > $3 ORDER BY version ASC"
        );

        sqlx::query_as::<_, EventRow>(&sql)
            .bind(aggregate_type.as_str())
            .bind(aggregate_id)
            .bind(from_version)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(into_stored_event)
            .collect()
    }

    async fn read_all(
        &self,
        from_position: i64,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let sql = format!("{SELECT_EVENTS} WHERE position > $1 ORDER BY position ASC LIMIT $2");

        sqlx::query_as::<_, EventRow>(&sql)
            .bind(from_position)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(into_stored_event)
            .collect()
    }

    async fn current_version(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<i64, StoreError> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(version) FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(aggregate_type.as_str())
        .bind(aggregate_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(version.unwrap_or(0))
    }
}
