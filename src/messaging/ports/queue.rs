//! Queue-side broker port.

use crate::messaging::domain::{
    QueueAttribute, QueueAttributes, QueueUrl, ReceiptHandle, ReceivedMessage,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for queue transport operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue operations offered by the queue service.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Creates a queue, returning its URL. Creating an existing queue with
    /// the same attributes returns the existing URL.
    async fn create_queue(&self, name: &str, attributes: &QueueAttributes) -> QueueResult<QueueUrl>;

    /// Looks a queue up by name.
    ///
    /// Adapters must report a missing queue as [`QueueError::NotFound`].
    async fn get_queue_url(&self, name: &str) -> QueueResult<QueueUrl>;

    /// Reads one attribute of a queue.
    async fn get_queue_attribute(
        &self,
        queue_url: &QueueUrl,
        attribute: QueueAttribute,
    ) -> QueueResult<String>;

    /// Long-polls for up to `max_messages` messages, waiting at most
    /// `wait_seconds` when the queue is empty.
    ///
    /// Returns an empty batch early when `cancellation` fires.
    async fn receive(
        &self,
        queue_url: &QueueUrl,
        max_messages: u32,
        wait_seconds: u32,
        cancellation: &CancellationToken,
    ) -> QueueResult<Vec<ReceivedMessage>>;

    /// Deletes the given deliveries in one request.
    async fn delete_batch(
        &self,
        queue_url: &QueueUrl,
        receipt_handles: &[ReceiptHandle],
    ) -> QueueResult<()>;
}

/// Errors returned by queue transport adapters.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// No queue with the given name exists.
    #[error("queue {name} does not exist")]
    NotFound {
        /// Queue name that was looked up.
        name: String,
    },

    /// The queue URL does not refer to an existing queue.
    #[error("queue {0} does not exist")]
    UnknownQueue(QueueUrl),

    /// The queue does not carry the requested attribute.
    #[error("queue {queue_url} has no attribute {attribute}")]
    MissingAttribute {
        /// Queue that was inspected.
        queue_url: QueueUrl,
        /// Attribute that was requested.
        attribute: QueueAttribute,
    },

    /// Opaque broker or network failure.
    #[error("queue transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl QueueError {
    /// Wraps a broker or network error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Returns `true` when the error reports a missing queue name.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
