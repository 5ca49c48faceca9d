//! Event Store module
//!
//! Append-only, ordered storage of domain events keyed by
//! `(aggregate type, aggregate id, version)`, plus a global write-order
//! position used by projectors.

mod error;
mod memory;
mod postgres;
pub mod repository;

pub use error::StoreError;
pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;
pub use repository::{AggregateRepository, Loaded, DEFAULT_SNAPSHOT_INTERVAL};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{AggregateType, CommandContext, DomainEvent};

/// Event as persisted in the log
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub id: Uuid,
    /// Global write-order position, monotonic across all aggregates
    pub position: i64,
    pub aggregate_type: AggregateType,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub metadata: Option<Value>,
    /// 1-based, contiguous per aggregate
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl StoredEvent {
    /// Parse the payload back into its tagged union.
    ///
    /// The `type` column is authoritative; unknown kinds decode to the
    /// union's pass-through arm.
    pub fn decode<E: DomainEvent>(&self) -> Result<E, StoreError> {
        let mut payload = match &self.payload {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(StoreError::InvalidEventData(format!(
                    "payload of {} v{} is not an object: {}",
                    self.aggregate_id, self.version, other
                )))
            }
        };
        payload.insert("type".to_string(), Value::String(self.event_type.clone()));
        Ok(serde_json::from_value(Value::Object(payload))?)
    }
}

/// Event waiting to be appended; id, version and position are assigned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_type: String,
    pub payload: Value,
    pub metadata: Option<Value>,
    pub created_by: Option<String>,
}

impl NewEvent {
    /// Serialize a domain event for storage. The `type` tag moves to its own column.
    pub fn from_event<E: DomainEvent>(
        event: &E,
        context: &CommandContext,
    ) -> Result<Self, StoreError> {
        let mut payload = serde_json::to_value(event)?;
        if let Value::Object(map) = &mut payload {
            map.remove("type");
        }

        Ok(Self {
            event_type: event.event_type().to_string(),
            payload,
            metadata: context.to_metadata(),
            created_by: context.created_by(),
        })
    }
}

/// Durable, append-only event log
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append `events` after `expected_version`.
    ///
    /// Assigns versions `expected_version + 1 ..= expected_version + n` and
    /// commits all of them or none. Fails with
    /// [`StoreError::ConcurrencyConflict`] when the stream head moved.
    async fn append(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<NewEvent>,
    ) -> Result<Vec<StoredEvent>, StoreError>;

    /// Events of one stream with `version > from_version`, in version order
    async fn read_stream(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, StoreError>;

    /// Up to `limit` events with `position > from_position`, in position order
    async fn read_all(&self, from_position: i64, limit: i64)
        -> Result<Vec<StoredEvent>, StoreError>;

    /// Highest stored version of a stream (0 when empty)
    async fn current_version(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<i64, StoreError>;
}
