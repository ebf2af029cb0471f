//! Delayed-publish scheduler port.

use crate::messaging::domain::{ScheduleName, ScheduleRequest};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for scheduler transport operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// One-shot schedule registration offered by the scheduler service.
#[async_trait]
pub trait SchedulerTransport: Send + Sync {
    /// Registers a schedule that publishes to its target topic once.
    async fn create_one_shot_schedule(
        &self,
        request: &ScheduleRequest,
    ) -> SchedulerResult<ScheduleName>;
}

/// Errors returned by scheduler transport adapters.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// A schedule with the same name already exists in the group.
    #[error("schedule {0} already exists")]
    Conflict(ScheduleName),

    /// Opaque scheduler or network failure.
    #[error("scheduler transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl SchedulerError {
    /// Wraps a scheduler or network error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
