//! Projector
//!
//! Reads the global log from a persisted cursor and folds each event into
//! the read-model row of its aggregate. Delivery is at-least-once: the
//! cursor is saved after the row, so a crash in between re-applies the
//! event, and the row's `last_version` guard makes that a no-op.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::aggregate::{Aggregate, Delivery, Order, Payment, Restaurant};
use crate::domain::AggregateType;
use crate::event_store::{EventLog, StoredEvent};

use super::{ProjectionError, ReadModelStore, ViewRow};

/// Name of the projection maintaining the `*_views` tables
pub const DEFAULT_PROJECTION: &str = "read_models";

const DEFAULT_BATCH_SIZE: i64 = 256;
const DEFAULT_GAP_GRACE: Duration = Duration::from_secs(2);

/// Outcome of one projector pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectorReport {
    /// Events folded into a row
    pub applied: usize,
    /// Events already reflected in their row
    pub skipped: usize,
    /// Cursor after the pass
    pub position: i64,
    /// Position of the event that failed to apply
    pub failed_at: Option<i64>,
    pub error: Option<String>,
    /// Set when the pass stopped at a position gap that may still be filled
    pub waiting_on_gap: bool,
}

impl ProjectorReport {
    pub fn processed(&self) -> usize {
        self.applied + self.skipped
    }
}

#[derive(Clone)]
pub struct Projector {
    events: Arc<dyn EventLog>,
    store: Arc<dyn ReadModelStore>,
    name: String,
    batch_size: i64,
    gap_grace: Duration,
}

impl Projector {
    pub fn new(events: Arc<dyn EventLog>, store: Arc<dyn ReadModelStore>) -> Self {
        Self {
            events,
            store,
            name: DEFAULT_PROJECTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            gap_grace: DEFAULT_GAP_GRACE,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// How long a hole in the position sequence is waited on before it is
    /// treated as a rolled-back write
    pub fn with_gap_grace(mut self, gap_grace: Duration) -> Self {
        self.gap_grace = gap_grace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> Arc<dyn ReadModelStore> {
        Arc::clone(&self.store)
    }

    /// Last applied global position
    pub async fn position(&self) -> Result<i64, ProjectionError> {
        self.store.load_cursor(&self.name).await
    }

    /// Apply at most one batch of events after the cursor.
    ///
    /// A failing event is logged and stops the pass without moving the
    /// cursor; the next pass retries it.
    pub async fn run_once(&self) -> Result<ProjectorReport, ProjectionError> {
        let cursor = self.store.load_cursor(&self.name).await?;
        let batch = self.events.read_all(cursor, self.batch_size).await?;

        let mut report = ProjectorReport {
            position: cursor,
            ..Default::default()
        };

        for event in &batch {
            if event.position != report.position + 1 && self.gap_is_fresh(event) {
                tracing::debug!(
                    projection = %self.name,
                    expected = report.position + 1,
                    found = event.position,
                    "Waiting on position gap"
                );
                report.waiting_on_gap = true;
                break;
            }

            match self.apply(event).await {
                Ok(true) => report.applied += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        projection = %self.name,
                        position = event.position,
                        aggregate_type = %event.aggregate_type,
                        aggregate_id = %event.aggregate_id,
                        version = event.version,
                        error = %e,
                        "Projection apply failed, will retry"
                    );
                    report.failed_at = Some(event.position);
                    report.error = Some(e.to_string());
                    return Ok(report);
                }
            }

            self.store.save_cursor(&self.name, event.position).await?;
            report.position = event.position;
        }

        if report.processed() > 0 {
            tracing::debug!(
                projection = %self.name,
                applied = report.applied,
                skipped = report.skipped,
                position = report.position,
                "Projection advanced"
            );
        }

        Ok(report)
    }

    /// Run passes until the cursor reaches the end of the log
    pub async fn catch_up(&self) -> Result<ProjectorReport, ProjectionError> {
        let mut total = ProjectorReport::default();

        loop {
            let report = self.run_once().await?;
            total.applied += report.applied;
            total.skipped += report.skipped;
            total.position = report.position;

            if let Some(position) = report.failed_at {
                return Err(ProjectionError::ApplyFailed {
                    position,
                    message: report.error.unwrap_or_default(),
                });
            }

            let exhausted = i64::try_from(report.processed()).unwrap_or(i64::MAX) < self.batch_size;
            if exhausted || report.waiting_on_gap {
                total.waiting_on_gap = report.waiting_on_gap;
                return Ok(total);
            }
        }
    }

    /// Drop every row and the cursor, then replay the whole log
    pub async fn rebuild(&self) -> Result<ProjectorReport, ProjectionError> {
        tracing::info!(projection = %self.name, "Rebuilding read models");
        self.store.reset(&self.name).await?;
        self.catch_up().await
    }

    /// Gaps left by transactions still in flight close within the grace period
    fn gap_is_fresh(&self, event: &StoredEvent) -> bool {
        let age = Utc::now().signed_duration_since(event.created_at);
        age.to_std().map_or(true, |age| age < self.gap_grace)
    }

    async fn apply(&self, event: &StoredEvent) -> Result<bool, ProjectionError> {
        match event.aggregate_type {
            AggregateType::Order => self.project::<Order>(event).await,
            AggregateType::Delivery => self.project::<Delivery>(event).await,
            AggregateType::Payment => self.project::<Payment>(event).await,
            AggregateType::Restaurant => self.project::<Restaurant>(event).await,
        }
    }

    async fn project<A: Aggregate>(&self, event: &StoredEvent) -> Result<bool, ProjectionError> {
        let row = self
            .store
            .load_row(A::AGGREGATE_TYPE, event.aggregate_id)
            .await?;

        let (state, last_version) = match row {
            Some(row) => (serde_json::from_value::<A>(row.data)?, row.last_version),
            None => (A::default(), 0),
        };

        if event.version <= last_version {
            return Ok(false);
        }

        // Versions committed behind the cursor are read back from the stream
        let backlog = if event.version > last_version + 1 {
            self.backfill::<A>(event, last_version).await?
        } else {
            Vec::new()
        };

        let mut state = state;
        for stored in backlog.iter().chain(std::iter::once(event)) {
            state = state.apply(&stored.decode::<A::Event>()?);
        }

        let row = ViewRow {
            aggregate_type: A::AGGREGATE_TYPE,
            aggregate_id: event.aggregate_id,
            status: state.status_label().to_string(),
            data: serde_json::to_value(&state)?,
            last_version: event.version,
            last_event_id: event.id,
            updated_at: event.created_at,
        };

        self.store.upsert_row(&row).await
    }

    /// Stream events strictly between the row's version and `event`
    async fn backfill<A: Aggregate>(
        &self,
        event: &StoredEvent,
        last_version: i64,
    ) -> Result<Vec<StoredEvent>, ProjectionError> {
        let backlog: Vec<StoredEvent> = self
            .events
            .read_stream(A::AGGREGATE_TYPE, event.aggregate_id, last_version)
            .await?
            .into_iter()
            .take_while(|stored| stored.version < event.version)
            .collect();

        let contiguous = backlog
            .iter()
            .zip(last_version + 1..)
            .all(|(stored, expected)| stored.version == expected);
        let complete = backlog
            .last()
            .map_or(last_version, |stored| stored.version)
            == event.version - 1;

        if !contiguous || !complete {
            return Err(ProjectionError::OutOfOrder {
                aggregate_type: A::AGGREGATE_TYPE,
                aggregate_id: event.aggregate_id,
                expected: last_version + 1,
                found: backlog.first().map_or(event.version, |stored| stored.version),
            });
        }

        tracing::warn!(
            projection = %self.name,
            aggregate_type = %A::AGGREGATE_TYPE,
            aggregate_id = %event.aggregate_id,
            from_version = last_version + 1,
            to_version = event.version - 1,
            "Back-filling versions committed behind the cursor"
        );

        Ok(backlog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::{InMemoryEventStore, NewEvent};
    use crate::projection::InMemoryReadModelStore;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use uuid::Uuid;

    /// Log whose positions are set by the test, for position gap scenarios
    struct FixedLog(std::sync::Mutex<Vec<StoredEvent>>);

    impl FixedLog {
        fn new(events: Vec<StoredEvent>) -> Self {
            Self(std::sync::Mutex::new(events))
        }

        /// Make a write visible, keeping the log ordered by position
        fn commit(&self, event: StoredEvent) {
            let mut events = self.0.lock().unwrap();
            events.push(event);
            events.sort_by_key(|e| e.position);
        }
    }

    #[async_trait]
    impl EventLog for FixedLog {
        async fn append(
            &self,
            _: AggregateType,
            _: Uuid,
            _: i64,
            _: Vec<NewEvent>,
        ) -> Result<Vec<StoredEvent>, crate::event_store::StoreError> {
            Ok(vec![])
        }

        async fn read_stream(
            &self,
            aggregate_type: AggregateType,
            aggregate_id: Uuid,
            from_version: i64,
        ) -> Result<Vec<StoredEvent>, crate::event_store::StoreError> {
            let mut stream: Vec<StoredEvent> = self
                .0
                .lock()
                .unwrap()
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
        ) -> Result<Vec<StoredEvent>, crate::event_store::StoreError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.position > from_position)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn current_version(
            &self,
            _: AggregateType,
            _: Uuid,
        ) -> Result<i64, crate::event_store::StoreError> {
            Ok(0)
        }
    }

    fn restaurant_created(position: i64, age: ChronoDuration) -> StoredEvent {
        let id = Uuid::new_v4();
        StoredEvent {
            id: Uuid::new_v4(),
            position,
            aggregate_type: AggregateType::Restaurant,
            aggregate_id: id,
            event_type: "RestaurantCreated".to_string(),
            payload: json!({
                "restaurant_id": id,
                "name": "Taqueria",
                "address": "2 Side St",
                "phone": "555-0111",
                "email": "hola@taqueria.test",
                "logo": null,
                "description": null,
                "created_at": Utc::now() - age,
            }),
            metadata: None,
            version: 1,
            created_at: Utc::now() - age,
            created_by: None,
        }
    }

    fn restaurant_followup(
        created: &StoredEvent,
        position: i64,
        version: i64,
        event_type: &str,
    ) -> StoredEvent {
        let at = Utc::now();
        let payload = match event_type {
            "RestaurantClosed" => json!({ "closed_at": at }),
            _ => json!({ "opened_at": at }),
        };
        StoredEvent {
            id: Uuid::new_v4(),
            position,
            event_type: event_type.to_string(),
            payload,
            version,
            created_at: at,
            ..created.clone()
        }
    }

    #[tokio::test]
    async fn test_fresh_gap_holds_the_cursor() {
        let log = FixedLog::new(vec![
            restaurant_created(1, ChronoDuration::zero()),
            restaurant_created(3, ChronoDuration::zero()),
        ]);
        let projector = Projector::new(Arc::new(log), Arc::new(InMemoryReadModelStore::new()))
            .with_gap_grace(Duration::from_secs(60));

        let report = projector.run_once().await.unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.position, 1);
        assert!(report.waiting_on_gap);
    }

    #[tokio::test]
    async fn test_old_gap_is_skipped() {
        let log = FixedLog::new(vec![
            restaurant_created(1, ChronoDuration::minutes(5)),
            restaurant_created(3, ChronoDuration::minutes(5)),
        ]);
        let projector = Projector::new(Arc::new(log), Arc::new(InMemoryReadModelStore::new()))
            .with_gap_grace(Duration::from_secs(1));

        let report = projector.run_once().await.unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(report.position, 3);
        assert!(!report.waiting_on_gap);
    }

    #[tokio::test]
    async fn test_late_commit_behind_cursor_is_backfilled() {
        let first = restaurant_created(1, ChronoDuration::seconds(10));
        let other = restaurant_created(3, ChronoDuration::seconds(10));
        let log = Arc::new(FixedLog::new(vec![first.clone(), other]));
        let store = Arc::new(InMemoryReadModelStore::new());
        let projector = Projector::new(log.clone(), store.clone())
            .with_gap_grace(Duration::from_secs(1));

        let report = projector.run_once().await.unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(report.position, 3);

        // Position 2 commits after the cursor moved past it
        log.commit(restaurant_followup(&first, 2, 2, "RestaurantClosed"));
        log.commit(restaurant_followup(&first, 4, 3, "RestaurantOpened"));

        let report = projector.run_once().await.unwrap();
        assert_eq!(report.failed_at, None);
        assert_eq!(report.applied, 1);
        assert_eq!(report.position, 4);

        let row = store
            .load_row(AggregateType::Restaurant, first.aggregate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.last_version, 3);
        assert_eq!(row.status, "open");
        assert_eq!(row.data["version"], 3);
    }

    #[tokio::test]
    async fn test_missing_stream_version_is_out_of_order() {
        let first = restaurant_created(1, ChronoDuration::minutes(5));
        let log = Arc::new(FixedLog::new(vec![
            first.clone(),
            restaurant_followup(&first, 2, 3, "RestaurantClosed"),
        ]));
        let projector = Projector::new(log, Arc::new(InMemoryReadModelStore::new()));

        let report = projector.run_once().await.unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.position, 1);
        assert_eq!(report.failed_at, Some(2));
    }

    #[tokio::test]
    async fn test_projects_restaurant_row() {
        let events = Arc::new(InMemoryEventStore::new());
        let store = Arc::new(InMemoryReadModelStore::new());
        let id = Uuid::new_v4();
        let created = restaurant_created(0, ChronoDuration::zero());

        let mut payload = created.payload.clone();
        payload["restaurant_id"] = json!(id);
        events
            .append(
                AggregateType::Restaurant,
                id,
                0,
                vec![NewEvent {
                    event_type: created.event_type.clone(),
                    payload,
                    metadata: None,
                    created_by: None,
                }],
            )
            .await
            .unwrap();

        let projector = Projector::new(events, store.clone());
        let report = projector.run_once().await.unwrap();
        assert_eq!(report.applied, 1);

        let row = store
            .load_row(AggregateType::Restaurant, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "open");
        assert_eq!(row.last_version, 1);
        assert_eq!(row.data["name"], "Taqueria");
        assert_eq!(projector.position().await.unwrap(), 1);
    }
}
