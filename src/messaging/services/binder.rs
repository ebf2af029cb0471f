//! Topic binding with bounded linear backoff.

use crate::messaging::{
    domain::{QueueUrl, TopicArn},
    ports::{Delayer, PubSubResult, PubSubTransport},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Total bind attempts before the last failure is returned.
pub const MAX_BIND_ATTEMPTS: u32 = 3;

/// Wait added per failed attempt; attempt `n` is followed by `n` steps.
pub const BIND_BACKOFF_STEP: Duration = Duration::from_millis(1000);

/// Binds freshly created queues to topics, retrying while the broker catches
/// up with the new resources.
pub struct RetryingTopicBinder<P, D>
where
    P: PubSubTransport,
    D: Delayer,
{
    pubsub: Arc<P>,
    delayer: Arc<D>,
}

impl<P, D> RetryingTopicBinder<P, D>
where
    P: PubSubTransport,
    D: Delayer,
{
    /// Creates a binder.
    #[must_use]
    pub const fn new(pubsub: Arc<P>, delayer: Arc<D>) -> Self {
        Self { pubsub, delayer }
    }

    /// Binds `queue_url` to `topic_arn`.
    ///
    /// After failed attempt `n` the binder waits `n` seconds and tries again,
    /// up to [`MAX_BIND_ATTEMPTS`] attempts in total.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt unchanged once every attempt
    /// has failed.
    pub async fn bind(&self, topic_arn: &TopicArn, queue_url: &QueueUrl) -> PubSubResult<()> {
        let mut attempt = 1;
        loop {
            match self.pubsub.bind_queue(topic_arn, queue_url).await {
                Ok(()) => {
                    debug!(
                        topic_arn = %topic_arn,
                        queue_url = %queue_url,
                        attempt,
                        "queue bound to topic"
                    );
                    return Ok(());
                }
                Err(err) if attempt < MAX_BIND_ATTEMPTS => {
                    let backoff = BIND_BACKOFF_STEP * attempt;
                    warn!(
                        topic_arn = %topic_arn,
                        queue_url = %queue_url,
                        attempt,
                        backoff_ms = backoff.as_millis(),
                        error = %err,
                        "queue bind failed; retrying"
                    );
                    self.delayer.delay(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        topic_arn = %topic_arn,
                        queue_url = %queue_url,
                        attempt,
                        error = %err,
                        "queue bind failed; giving up"
                    );
                    return Err(err);
                }
            }
        }
    }
}
