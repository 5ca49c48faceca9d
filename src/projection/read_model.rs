//! Read model rows
//!
//! One row per aggregate, holding the folded state as JSON and the
//! version of the last event applied to it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::AggregateType;

use super::ProjectionError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewRow {
    pub aggregate_type: AggregateType,
    pub aggregate_id: Uuid,
    pub status: String,
    pub data: Value,
    /// Dedup guard: events at or below this version are already applied
    pub last_version: i64,
    pub last_event_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReadModelStore: Send + Sync {
    async fn load_row(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    ) -> Result<Option<ViewRow>, ProjectionError>;

    /// Insert or replace a row if `row.last_version` is newer than the stored one.
    ///
    /// Returns `false` when the stored row was already at or past that version.
    async fn upsert_row(&self, row: &ViewRow) -> Result<bool, ProjectionError>;

    /// Most recently updated rows of one type, optionally filtered by status
    async fn list_by_status(
        &self,
        aggregate_type: AggregateType,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ViewRow>, ProjectionError>;

    /// Last applied global position of a projection (0 if never run)
    async fn load_cursor(&self, name: &str) -> Result<i64, ProjectionError>;

    async fn save_cursor(&self, name: &str, position: i64) -> Result<(), ProjectionError>;

    /// Drop every row and the named cursor
    async fn reset(&self, name: &str) -> Result<(), ProjectionError>;
}
