//! Store Errors
//!
//! Error types shared by the event log and snapshot store.

use uuid::Uuid;

use crate::domain::AggregateType;

/// Errors that can occur in the durable stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Optimistic concurrency conflict
    #[error("Concurrency conflict for {aggregate_type} {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    /// Durable store I/O failure
    #[error("Store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data does not match the expected shape
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),
}

impl StoreError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::Unavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_is_retryable() {
        let conflict = StoreError::ConcurrencyConflict {
            aggregate_type: AggregateType::Order,
            aggregate_id: Uuid::new_v4(),
            expected: 3,
            actual: 4,
        };
        assert!(conflict.is_retryable());
        assert!(conflict.is_concurrency_conflict());
        assert!(conflict.to_string().contains("expected version 3, found 4"));

        let invalid = StoreError::InvalidEventData("missing payload".to_string());
        assert!(!invalid.is_retryable());
        assert!(!invalid.is_concurrency_conflict());
    }
}
