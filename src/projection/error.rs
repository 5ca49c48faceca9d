use uuid::Uuid;

use crate::domain::AggregateType;
use crate::event_store::StoreError;

/// Projection error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Row and event disagree on the next version of the aggregate
    #[error("Out of order event for {aggregate_type} {aggregate_id}: expected version {expected}, found {found}")]
    OutOfOrder {
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        expected: i64,
        found: i64,
    },

    /// An event could not be applied; the cursor stays before it
    #[error("Failed to apply event at position {position}: {message}")]
    ApplyFailed { position: i64, message: String },
}
