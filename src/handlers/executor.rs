//! Command Executor
//!
//! Bounded `load → decide → commit` loop shared by every handler. Only
//! optimistic concurrency conflicts are retried, and each retry re-runs
//! `decide` against freshly loaded state.

use std::time::Duration;

use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::domain::CommandContext;
use crate::error::{AppError, AppResult};
use crate::event_store::{AggregateRepository, StoreError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct CommandExecutor {
    repository: AggregateRepository,
    max_attempts: u32,
}

impl CommandExecutor {
    pub fn new(repository: AggregateRepository) -> Self {
        Self {
            repository,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn repository(&self) -> &AggregateRepository {
        &self.repository
    }

    /// Run a creation command against a fresh stream
    pub async fn create<A>(
        &self,
        aggregate_id: Uuid,
        command: A::Command,
        context: &CommandContext,
    ) -> AppResult<A>
    where
        A: Aggregate,
        A::Command: Clone,
    {
        self.execute::<A>(aggregate_id, command, context, false).await
    }

    /// Run a command against an existing aggregate; `NotFound` if it has no events
    pub async fn update<A>(
        &self,
        aggregate_id: Uuid,
        command: A::Command,
        context: &CommandContext,
    ) -> AppResult<A>
    where
        A: Aggregate,
        A::Command: Clone,
    {
        self.execute::<A>(aggregate_id, command, context, true).await
    }

    /// Fail with `NotFound` unless the aggregate has events
    pub async fn require_exists<A: Aggregate>(&self, aggregate_id: Uuid) -> AppResult<A> {
        self.repository
            .load_existing::<A>(aggregate_id)
            .await?
            .ok_or(AppError::NotFound {
                aggregate_type: A::AGGREGATE_TYPE,
                aggregate_id,
            })
    }

    async fn execute<A>(
        &self,
        aggregate_id: Uuid,
        command: A::Command,
        context: &CommandContext,
        must_exist: bool,
    ) -> AppResult<A>
    where
        A: Aggregate,
        A::Command: Clone,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let loaded = self.repository.load_tracked::<A>(aggregate_id).await?;
            if must_exist && loaded.state.version() == 0 {
                return Err(AppError::NotFound {
                    aggregate_type: A::AGGREGATE_TYPE,
                    aggregate_id,
                });
            }

            let events = loaded.state.decide(command.clone())?;
            if events.is_empty() {
                return Ok(loaded.state);
            }

            match self.repository.commit(loaded, &events, context).await {
                Ok(state) => {
                    tracing::debug!(
                        aggregate_type = %A::AGGREGATE_TYPE,
                        aggregate_id = %aggregate_id,
                        version = state.version(),
                        events = events.len(),
                        "Command committed"
                    );
                    return Ok(state);
                }
                Err(StoreError::ConcurrencyConflict { .. }) if attempt < self.max_attempts => {
                    let delay = Duration::from_millis(20 * u64::from(attempt));
                    tracing::warn!(
                        aggregate_type = %A::AGGREGATE_TYPE,
                        aggregate_id = %aggregate_id,
                        "Concurrency conflict, retrying (attempt {}/{})",
                        attempt,
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(StoreError::ConcurrencyConflict { .. }) => {
                    return Err(AppError::ConcurrencyConflict {
                        aggregate_type: A::AGGREGATE_TYPE,
                        aggregate_id,
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
