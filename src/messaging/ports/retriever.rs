//! Subscription queue lookup port used by the consumption loops.

use super::{PubSubError, QueueError, SerializationError};
use crate::messaging::domain::{QueueUrl, Subscription};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for queue provisioning.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Resolves, and creates on first use, the queues behind a subscription.
#[async_trait]
pub trait QueueUrlRetriever: Send + Sync {
    /// Returns the subscription's queue URL, creating the queue, its
    /// dead-letter queue, and the topic binding when the queue is missing.
    async fn get_or_create_queue(
        &self,
        subscription: &Subscription,
    ) -> ProvisioningResult<QueueUrl>;

    /// Returns the URL of the subscription's dead-letter queue.
    async fn dead_letter_queue_url(
        &self,
        subscription: &Subscription,
    ) -> ProvisioningResult<QueueUrl>;
}

/// Errors raised while provisioning subscription queues.
#[derive(Debug, Clone, Error)]
pub enum ProvisioningError {
    /// The subscribed topic does not exist in the broker.
    #[error("unable to find topic: {name}")]
    TopicNotFound {
        /// Broker name that was looked up.
        name: String,
    },

    /// A queue operation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A topic operation failed, including exhausted bind retries.
    #[error(transparent)]
    PubSub(#[from] PubSubError),

    /// The redrive policy could not be encoded.
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
