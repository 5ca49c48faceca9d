//! Snapshot Store
//!
//! Advisory cache of folded aggregate state. A snapshot can be lost,
//! dropped or raced at any time; it only ever saves replay work.

mod memory;
mod postgres;

pub use memory::InMemorySnapshotStore;
pub use postgres::PgSnapshotStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::AggregateType;
use crate::event_store::StoreError;

/// Folded state of one aggregate at a known version
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub aggregate_type: AggregateType,
    pub aggregate_id: Uuid,
    pub state: Value,
    /// Version of the last event folded into `state`
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Latest snapshot of an aggregate, if any
    async fn load(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, StoreError>;

    /// Store a snapshot unless one at the same or a higher version exists.
    ///
    /// Returns `false` when the write was ignored.
    async fn save(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        state: Value,
        version: i64,
    ) -> Result<bool, StoreError>;

    async fn delete(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<(), StoreError>;
}
