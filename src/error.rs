//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AggregateType, DomainError};
use crate::event_store::StoreError;
use crate::projection::ProjectionError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
    },

    /// Optimistic concurrency retries exhausted
    #[error("Concurrency conflict on {aggregate_type} {aggregate_id} after {attempts} attempts")]
    ConcurrencyConflict {
        aggregate_type: AggregateType,
        aggregate_id: Uuid,
        attempts: u32,
    },

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code, also used in command responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound { .. } => "not_found",
            AppError::ConcurrencyConflict { .. } => "concurrency_conflict",
            AppError::Domain(DomainError::InvalidAmount(_)) => "invalid_amount",
            AppError::Domain(DomainError::AlreadyExists { .. }) => "already_exists",
            AppError::Domain(DomainError::InvalidTransition { .. }) => "invalid_transition",
            AppError::Domain(_) => "business_rule_violation",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Projection(_) => "projection_error",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
            AppError::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Projection(_) | AppError::Internal(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Infrastructure failures the caller may retry unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable(_) | AppError::ConcurrencyConflict { .. }
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict {
                aggregate_type,
                aggregate_id,
                ..
            } => AppError::ConcurrencyConflict {
                aggregate_type,
                aggregate_id,
                attempts: 1,
            },
            StoreError::Unavailable(e) => AppError::StoreUnavailable(e.to_string()),
            StoreError::Serialization(e) => AppError::Internal(e.to_string()),
            StoreError::InvalidEventData(msg) => AppError::Internal(msg),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: String,
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
            }
            AppError::Projection(e) => {
                tracing::error!("Projection error: {:?}", e);
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
            }
            _ => {}
        }

        // Server-side details stay in the log
        let message = if status.is_server_error() {
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            success: false,
            message,
            error_code: self.error_code().to_string(),
            retryable: self.is_retryable(),
        };

        (status, Json(body)).into_response()
    }
}
