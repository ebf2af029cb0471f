//! Injectable wait used between bind retries.

use async_trait::async_trait;
use std::time::Duration;

/// Suspends the caller for a duration.
#[async_trait]
pub trait Delayer: Send + Sync {
    /// Waits for `duration`.
    async fn delay(&self, duration: Duration);
}
