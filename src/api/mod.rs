//! API module
//!
//! Thin HTTP adapter over the two interfaces the core exposes: submit a
//! command and receive the entity, or query a read model.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use crate::handlers::CommandService;
use crate::projection::ReadModelStore;

pub use routes::create_router;

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub commands: CommandService,
    pub read_models: Arc<dyn ReadModelStore>,
}

impl AppState {
    pub fn new(commands: CommandService, read_models: Arc<dyn ReadModelStore>) -> Self {
        Self {
            commands,
            read_models,
        }
    }
}
