use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::AggregateType;

use super::{ProjectionError, ReadModelStore, ViewRow};

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<(AggregateType, Uuid), ViewRow>,
    cursors: HashMap<String, i64>,
}

/// Read models kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryReadModelStore {
    tables: Mutex<Tables>,
}

impl InMemoryReadModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReadModelStore for InMemoryReadModelStore {
    async fn load_row(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<Option<ViewRow>, ProjectionError> {
        Ok(self.lock().rows.get(&(aggregate_type, aggregate_id)).cloned())
    }

    async fn upsert_row(&self, row: &ViewRow) -> Result<bool, ProjectionError> {
        let mut tables = self.lock();
        let key = (row.aggregate_type, row.aggregate_id);

        if let Some(existing) = tables.rows.get(&key) {
            if existing.last_version >= row.last_version {
                return Ok(false);
            }
        }

        tables.rows.insert(key, row.clone());
        Ok(true)
    }

    async fn list_by_status(
        &self,
        aggregate_type: AggregateType,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ViewRow>, ProjectionError> {
        let mut rows: Vec<ViewRow> = self
            .lock()
            .rows
            .values()
            .filter(|row| row.aggregate_type == aggregate_type)
            .filter(|row| status.map_or(true, |s| row.status == s))
            .cloned()
            .collect();

        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn load_cursor(&self, name: &str) -> Result<i64, ProjectionError> {
        Ok(self.lock().cursors.get(name).copied().unwrap_or(0))
    }

    async fn save_cursor(&self, name: &str, position: i64) -> Result<(), ProjectionError> {
        self.lock().cursors.insert(name.to_string(), position);
        Ok(())
    }

    async fn reset(&self, name: &str) -> Result<(), ProjectionError> {
        let mut tables = self.lock();
        tables.rows.clear();
        tables.cursors.remove(name);
        Ok(())
    }
}
