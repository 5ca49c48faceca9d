//! Projection module
//!
//! Turns the global event log into queryable read-model rows.
//! Rows are owned by the projector and can be rebuilt from the log at any time.

mod error;
mod memory;
mod postgres;
mod projector;
mod read_model;

pub use error::ProjectionError;
pub use memory::InMemoryReadModelStore;
pub use postgres::PgReadModelStore;
pub use projector::{Projector, ProjectorReport, DEFAULT_PROJECTION};
pub use read_model::{ReadModelStore, ViewRow};
