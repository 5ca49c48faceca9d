//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// Business rule violations raised by an aggregate's `decide`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The aggregate stream already has events
    #[error("{aggregate} already exists")]
    AlreadyExists { aggregate: &'static str },

    /// The command needs an existing aggregate
    #[error("{aggregate} has not been created")]
    NotCreated { aggregate: &'static str },

    /// Status does not allow the requested transition
    #[error("Cannot {action} {aggregate} in status '{status}'")]
    InvalidTransition {
        aggregate: &'static str,
        status: &'static str,
        action: &'static str,
    },

    /// Invalid amount (zero, negative, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Business rule violation
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),
}

impl DomainError {
    pub fn invalid_transition(
        aggregate: &'static str,
        status: &'static str,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            aggregate,
            status,
            action,
        }
    }

    pub fn rule(message: impl Into<String>) -> Self {
        Self::BusinessRuleViolation(message.into())
    }
}
