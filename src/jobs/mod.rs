//! Background Jobs
//!
//! Long-running tasks started next to the HTTP server. Currently the
//! projector loop that keeps read models up to date with the event log.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::projection::{ProjectionError, Projector, ProjectorReport};

// =========================================================================
// Projector Job
// =========================================================================

/// Configuration for the projector job
#[derive(Debug, Clone)]
pub struct ProjectorJobConfig {
    /// Pause between passes once the projector has caught up
    pub poll_interval: Duration,
}

impl Default for ProjectorJobConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Drives a [`Projector`] until shutdown is signalled
pub struct ProjectorJob {
    projector: Projector,
    config: ProjectorJobConfig,
}

impl ProjectorJob {
    pub fn new(projector: Projector) -> Self {
        Self {
            projector,
            config: ProjectorJobConfig::default(),
        }
    }

    pub fn with_config(projector: Projector, config: ProjectorJobConfig) -> Self {
        Self { projector, config }
    }

    /// Start the job in the background.
    /// The task ends after `shutdown` turns `true` or its sender is dropped.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(projection = %self.projector.name(), "Projector job started");

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.drain().await {
                        tracing::error!(error = %e, "Projector pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(projection = %self.projector.name(), "Projector job stopped");
    }

    /// Keep running passes while full batches come back
    async fn drain(&self) -> Result<ProjectorReport, ProjectionError> {
        let report = self.projector.catch_up().await;

        // Apply failures are already logged by the projector with full context
        if let Err(ProjectionError::ApplyFailed { position, .. }) = &report {
            tracing::debug!(position, "Projector will retry failed event on next tick");
        }

        report
    }

    /// Run a single pass (for manual trigger or testing)
    pub async fn run_once(&self) -> Result<ProjectorReport, ProjectionError> {
        self.projector.run_once().await
    }
}
