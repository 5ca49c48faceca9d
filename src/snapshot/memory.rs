use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::AggregateType;
use crate::event_store::StoreError;

use super::{Snapshot, SnapshotStore};

type SnapshotKey = (AggregateType, Uuid);

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<SnapshotKey, Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a snapshot without the version guard.
    ///
    /// Lets tests plant stale or corrupt snapshots.
    pub fn put(&self, snapshot: Snapshot) {
        self.lock()
            .insert((snapshot.aggregate_type, snapshot.aggregate_id), snapshot);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SnapshotKey, Snapshot>> {
        self.snapshots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.lock().get(&(aggregate_type, aggregate_id)).cloned())
    }

    async fn save(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        state: Value,
        version: i64,
    ) -> Result<bool, StoreError> {
        let mut snapshots = self.lock();
        let key = (aggregate_type, aggregate_id);

        if let Some(existing) = snapshots.get(&key) {
            if existing.version >= version {
                return Ok(false);
            }
        }

        snapshots.insert(
            key,
            Snapshot {
                aggregate_type,
                aggregate_id,
                state,
                version,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn delete(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<(), StoreError> {
        self.lock().remove(&(aggregate_type, aggregate_id));
        Ok(())
    }
}
