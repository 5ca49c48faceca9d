//! In-memory event log
//!
//! Same contract as the Postgres store. The mutex stands in for the
//! database transaction; it is never held across an await point.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::AggregateType;

use super::{EventLog, NewEvent, StoreError, StoredEvent};

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Mutex<Vec<StoredEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored event in position order
    pub fn all_events(&self) -> Vec<StoredEvent> {
        self.lock().clone()
    }

    /// Number of events stored for one aggregate
    pub fn count_for(&self, aggregate_id: Uuid) -> usize {
        self.lock()
            .iter()
            .filter(|event| event.aggregate_id == aggregate_id)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredEvent>> {
        // A poisoned lock only means a panicking test thread; the data is still consistent
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn head(
        events: &[StoredEvent],
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> i64 {
        events
            .iter()
            .filter(|e| e.aggregate_type == aggregate_type && e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventLog for InMemoryEventStore {
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

        let mut log = self.lock();

        let current_version = Self::head(&log, aggregate_type, aggregate_id);
        if current_version != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                aggregate_type,
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let first_position = log.last().map(|e| e.position).unwrap_or(0) + 1;
        let created_at = Utc::now();

        let appended: Vec<StoredEvent> = (0_i64..)
            .zip(events)
            .map(|(offset, event)| StoredEvent {
                id: Uuid::new_v4(),
                position: first_position + offset,
                aggregate_type,
                aggregate_id,
                event_type: event.event_type,
                payload: event.payload,
                metadata: event.metadata,
                version: expected_version + offset + 1,
                created_at,
                created_by: event.created_by,
            })
            .collect();

        log.extend(appended.iter().cloned());
        Ok(appended)
    }

    async fn read_stream(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let mut stream: Vec<StoredEvent> = self
            .lock()
            .iter()
            .filter(|e| {
                e.aggregate_type == aggregate_type
                    && e.aggregate_id == aggregate_id
                    && e.version > from_version
            })
            .cloned()
            .collect();
        stream.sort_by_key(|e| e.version);
        Ok(stream)
    }

    async fn read_all(
        &self,
        from_position: i64,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self
            .lock()
            .iter()
            .filter(|e| e.position > from_position)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn current_version(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<i64, StoreError> {
        Ok(Self::head(&self.lock(), aggregate_type, aggregate_id))
    }
}
