//! Wall-clock [`Delayer`] backed by the tokio timer.

use crate::messaging::ports::Delayer;
use async_trait::async_trait;
use std::time::Duration;

/// Production [`Delayer`] that sleeps on the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelayer;

impl TokioDelayer {
    /// Creates a tokio-backed delayer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Delayer for TokioDelayer {
    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
