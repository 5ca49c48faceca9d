//! Food delivery core
//!
//! Event-sourced command side and read-model projections for orders,
//! deliveries, payments and restaurants.

pub mod aggregate;
pub mod api;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod jobs;
pub mod projection;
pub mod snapshot;

pub mod config;
pub mod db;
pub mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{AggregateType, CommandContext, DomainError};
