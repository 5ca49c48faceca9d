//! Common test utilities
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use food_delivery_core::domain::AggregateType;
use food_delivery_core::event_store::{AggregateRepository, InMemoryEventStore};
use food_delivery_core::handlers::CommandService;
use food_delivery_core::projection::{
    InMemoryReadModelStore, ProjectionError, Projector, ReadModelStore, ViewRow,
};
use food_delivery_core::snapshot::InMemorySnapshotStore;

/// In-memory wiring of the whole core
pub struct Harness {
    pub events: Arc<InMemoryEventStore>,
    pub snapshots: Arc<InMemorySnapshotStore>,
    pub read_models: Arc<InMemoryReadModelStore>,
    pub repository: AggregateRepository,
    pub service: CommandService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_snapshot_interval(food_delivery_core::event_store::DEFAULT_SNAPSHOT_INTERVAL)
    }

    pub fn with_snapshot_interval(interval: i64) -> Self {
        let events = Arc::new(InMemoryEventStore::new());
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let read_models = Arc::new(InMemoryReadModelStore::new());

        let repository = AggregateRepository::new(events.clone(), snapshots.clone())
            .with_snapshot_interval(interval);
        let service = CommandService::new(repository.clone(), 3);

        Self {
            events,
            snapshots,
            read_models,
            repository,
            service,
        }
    }

    pub fn projector(&self) -> Projector {
        Projector::new(self.events.clone(), self.read_models.clone())
    }
}

/// Read model store that rejects rows of chosen aggregates
pub struct FailingReadModelStore {
    inner: InMemoryReadModelStore,
    poisoned: Mutex<HashSet<Uuid>>,
}

impl FailingReadModelStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryReadModelStore::new(),
            poisoned: Mutex::new(HashSet::new()),
        }
    }

    pub fn poison(&self, aggregate_id: Uuid) {
        self.poisoned.lock().unwrap().insert(aggregate_id);
    }

    pub fn heal(&self, aggregate_id: Uuid) {
        self.poisoned.lock().unwrap().remove(&aggregate_id);
    }
}

#[async_trait]
impl ReadModelStore for FailingReadModelStore {
    async fn load_row(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<Option<ViewRow>, ProjectionError> {
        self.inner.load_row(aggregate_type, aggregate_id).await
    }

    async fn upsert_row(&self, row: &ViewRow) -> Result<bool, ProjectionError> {
        if self.poisoned.lock().unwrap().contains(&row.aggregate_id) {
            return Err(ProjectionError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.upsert_row(row).await
    }

    async fn list_by_status(
        &self,
        aggregate_type: AggregateType,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ViewRow>, ProjectionError> {
        self.inner.list_by_status(aggregate_type, status, limit).await
    }

    async fn load_cursor(&self, name: &str) -> Result<i64, ProjectionError> {
        self.inner.load_cursor(name).await
    }

    async fn save_cursor(&self, name: &str, position: i64) -> Result<(), ProjectionError> {
        self.inner.save_cursor(name, position).await
    }

    async fn reset(&self, name: &str) -> Result<(), ProjectionError> {
        self.inner.reset(name).await
    }
}

/// Connect to the test database and clear every table
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    food_delivery_core::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query(
        "TRUNCATE TABLE events, snapshots, order_views, delivery_views, payment_views, \
         restaurant_views, projection_cursors",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}
