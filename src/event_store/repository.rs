//! Aggregate Repository
//!
//! Loads aggregates from snapshot + event tail and persists newly decided
//! events with optimistic concurrency. Conflicts are returned to the caller
//! untouched; only the command layer can safely re-run business logic.

use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::domain::CommandContext;
use crate::snapshot::SnapshotStore;

use super::{EventLog, NewEvent, StoreError, StoredEvent};

/// Default number of events between snapshots
pub const DEFAULT_SNAPSHOT_INTERVAL: i64 = 50;

/// Aggregate state together with the snapshot it was rebuilt from
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<A> {
    pub state: A,
    /// Version of the snapshot used, 0 when replayed from scratch
    pub snapshot_version: i64,
}

/// Repository over an event log and a snapshot cache
#[derive(Clone)]
pub struct AggregateRepository {
    events: Arc<dyn EventLog>,
    snapshots: Arc<dyn SnapshotStore>,
    snapshot_interval: i64,
}

impl AggregateRepository {
    /// Create a new repository with the default snapshot interval
    pub fn new(events: Arc<dyn EventLog>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            events,
            snapshots,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }

    /// Snapshot every `interval` events; zero or negative disables snapshots
    pub fn with_snapshot_interval(mut self, interval: i64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn event_log(&self) -> Arc<dyn EventLog> {
        Arc::clone(&self.events)
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Current state of an aggregate (default state at version 0 if it has no events)
    pub async fn load<A: Aggregate>(&self, aggregate_id: Uuid) -> Result<A, StoreError> {
        Ok(self.load_tracked::<A>(aggregate_id).await?.state)
    }

    /// Current state of an aggregate, `None` when its stream is empty
    pub async fn load_existing<A: Aggregate>(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Option<A>, StoreError> {
        let state = self.load::<A>(aggregate_id).await?;
        Ok((state.version() > 0).then_some(state))
    }

    /// Load and remember which snapshot the state was built from
    pub async fn load_tracked<A: Aggregate>(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Loaded<A>, StoreError> {
        if let Some(snapshot_state) = self.load_snapshot::<A>(aggregate_id).await {
            let snapshot_version = snapshot_state.version();
            let tail = self
                .events
                .read_stream(A::AGGREGATE_TYPE, aggregate_id, snapshot_version)
                .await?;

            // An empty tail is only trustworthy if the stream really ends at the snapshot
            let stale = tail.is_empty()
                && self
                    .events
                    .current_version(A::AGGREGATE_TYPE, aggregate_id)
                    .await?
                    != snapshot_version;

            if !stale {
                return Ok(Loaded {
                    state: replay(snapshot_state, &tail)?,
                    snapshot_version,
                });
            }

            tracing::warn!(
                aggregate_type = %A::AGGREGATE_TYPE,
                aggregate_id = %aggregate_id,
                snapshot_version,
                "Snapshot is ahead of the event stream, replaying from scratch"
            );
        }

        let stream = self
            .events
            .read_stream(A::AGGREGATE_TYPE, aggregate_id, 0)
            .await?;

        Ok(Loaded {
            state: replay(A::default(), &stream)?,
            snapshot_version: 0,
        })
    }

    /// Usable snapshot state, if any. Unreadable snapshots are discarded.
    async fn load_snapshot<A: Aggregate>(&self, aggregate_id: Uuid) -> Option<A> {
        let snapshot = match self.snapshots.load(A::AGGREGATE_TYPE, aggregate_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(
                    aggregate_id = %aggregate_id,
                    error = %e,
                    "Snapshot load failed, replaying from scratch"
                );
                return None;
            }
        };

        match serde_json::from_value::<A>(snapshot.state) {
            Ok(state) if state.version() == snapshot.version && state.id() == aggregate_id => {
                Some(state)
            }
            Ok(_) => {
                tracing::warn!(
                    aggregate_id = %aggregate_id,
                    version = snapshot.version,
                    "Snapshot state does not match its key, discarding"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    aggregate_id = %aggregate_id,
                    version = snapshot.version,
                    error = %e,
                    "Snapshot could not be decoded, discarding"
                );
                None
            }
        }
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Append events after `expected_version`.
    ///
    /// Refreshes the snapshot when enough events piled up since the last one.
    pub async fn save<A: Aggregate>(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[A::Event],
        context: &CommandContext,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let recorded = self
            .append::<A>(aggregate_id, expected_version, events, context)
            .await?;

        if let Some(last) = recorded.last() {
            if self.snapshot_interval > 0 && last.version >= self.snapshot_interval {
                // Rebuild from the log so the snapshot never includes unsaved state
                match self.load_tracked::<A>(aggregate_id).await {
                    Ok(loaded) => self.refresh_snapshot(&loaded.state, loaded.snapshot_version).await,
                    Err(e) => tracing::warn!(
                        aggregate_id = %aggregate_id,
                        error = %e,
                        "Could not reload aggregate for snapshot"
                    ),
                }
            }
        }

        Ok(recorded)
    }

    /// Append decided events on top of a loaded state and return the folded result
    pub async fn commit<A: Aggregate>(
        &self,
        loaded: Loaded<A>,
        events: &[A::Event],
        context: &CommandContext,
    ) -> Result<A, StoreError> {
        let aggregate_id = if loaded.state.is_created() {
            loaded.state.id()
        } else {
            // Creation: the id lives in the first event
            A::default().fold(events).id()
        };

        self.append::<A>(aggregate_id, loaded.state.version(), events, context)
            .await?;

        let state = loaded.state.fold(events);
        self.refresh_snapshot(&state, loaded.snapshot_version).await;
        Ok(state)
    }

    async fn append<A: Aggregate>(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[A::Event],
        context: &CommandContext,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let new_events = events
            .iter()
            .map(|event| NewEvent::from_event(event, context))
            .collect::<Result<Vec<_>, _>>()?;

        self.events
            .append(A::AGGREGATE_TYPE, aggregate_id, expected_version, new_events)
            .await
    }

    /// Save a snapshot if the gap since `snapshot_version` reached the interval.
    /// Failures are logged; snapshots are advisory.
    async fn refresh_snapshot<A: Aggregate>(&self, state: &A, snapshot_version: i64) {
        if self.snapshot_interval <= 0
            || state.version() - snapshot_version < self.snapshot_interval
        {
            return;
        }

        let result = match serde_json::to_value(state) {
            Ok(value) => {
                self.snapshots
                    .save(A::AGGREGATE_TYPE, state.id(), value, state.version())
                    .await
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::warn!(
                aggregate_type = %A::AGGREGATE_TYPE,
                aggregate_id = %state.id(),
                version = state.version(),
                error = %e,
                "Snapshot refresh failed"
            );
        }
    }
}

/// Fold stored events onto a state, checking version contiguity
fn replay<A: Aggregate>(mut state: A, events: &[StoredEvent]) -> Result<A, StoreError> {
    for stored in events {
        if stored.version != state.version() + 1 {
            return Err(StoreError::InvalidEventData(format!(
                "{} {} expected version {}, found {}",
                stored.aggregate_type,
                stored.aggregate_id,
                state.version() + 1,
                stored.version
            )));
        }
        let event: A::Event = stored.decode()?;
        state = state.apply(&event);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Order, OrderCommand, OrderStatus};
    use crate::domain::AggregateType;
    use crate::event_store::InMemoryEventStore;
    use crate::snapshot::{InMemorySnapshotStore, Snapshot};
    use chrono::Utc;

    fn repository(interval: i64) -> (AggregateRepository, Arc<InMemorySnapshotStore>) {
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let repository =
            AggregateRepository::new(Arc::new(InMemoryEventStore::new()), snapshots.clone())
                .with_snapshot_interval(interval);
        (repository, snapshots)
    }

    async fn create_order(repository: &AggregateRepository) -> Order {
        let loaded = repository.load_tracked::<Order>(Uuid::new_v4()).await.unwrap();
        let events = loaded
            .state
            .decide(OrderCommand::Create {
                order_id: Uuid::new_v4(),
                user_id: "u1".to_string(),
                restaurant_id: "r1".to_string(),
                items: vec![],
            })
            .unwrap();
        repository
            .commit(loaded, &events, &CommandContext::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_unknown_aggregate_is_empty() {
        let (repository, _) = repository(0);
        let id = Uuid::new_v4();

        let order: Order = repository.load(id).await.unwrap();
        assert_eq!(order.version(), 0);
        assert!(repository.load_existing::<Order>(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_then_load() {
        let (repository, _) = repository(0);
        let order = create_order(&repository).await;

        let loaded: Order = repository.load(order.id()).await.unwrap();
        assert_eq!(loaded, order);
        assert_eq!(loaded.status(), OrderStatus::Pending);
        assert_eq!(loaded.version(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_written_after_interval() {
        let (repository, snapshots) = repository(2);
        let order = create_order(&repository).await;
        assert!(snapshots.is_empty());

        let events = order.decide(OrderCommand::Confirm).unwrap();
        repository
            .save::<Order>(order.id(), 1, &events, &CommandContext::new())
            .await
            .unwrap();

        let snapshot = snapshots
            .load(AggregateType::Order, order.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.version, 2);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_discarded() {
        let (repository, snapshots) = repository(0);
        let order = create_order(&repository).await;

        snapshots.put(Snapshot {
            aggregate_type: AggregateType::Order,
            aggregate_id: order.id(),
            state: serde_json::json!({"garbage": true}),
            version: 1,
            created_at: Utc::now(),
        });

        let loaded: Order = repository.load(order.id()).await.unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn test_snapshot_ahead_of_stream_is_ignored() {
        let (repository, snapshots) = repository(0);
        let order = create_order(&repository).await;

        let mut ahead = serde_json::to_value(&order).unwrap();
        ahead["version"] = serde_json::json!(9);
        snapshots.put(Snapshot {
            aggregate_type: AggregateType::Order,
            aggregate_id: order.id(),
            state: ahead,
            version: 9,
            created_at: Utc::now(),
        });

        let loaded: Order = repository.load(order.id()).await.unwrap();
        assert_eq!(loaded.version(), 1);
    }

    #[tokio::test]
    async fn test_save_propagates_conflict() {
        let (repository, _) = repository(0);
        let order = create_order(&repository).await;
        let events = order.decide(OrderCommand::Confirm).unwrap();

        let result = repository
            .save::<Order>(order.id(), 0, &events, &CommandContext::new())
            .await;

        assert!(matches!(result, Err(StoreError::ConcurrencyConflict { actual: 1, .. })));
    }
}
