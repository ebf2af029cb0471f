//! Topic-side broker port.

use crate::messaging::domain::{QueueUrl, TopicArn, WireEnvelope};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for pub/sub transport operations.
pub type PubSubResult<T> = Result<T, PubSubError>;

/// Topic operations offered by the pub/sub broker.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Publishes an envelope to a topic.
    async fn publish(&self, topic_arn: &TopicArn, envelope: &WireEnvelope) -> PubSubResult<()>;

    /// Looks a topic up by its broker name, returning `None` when absent.
    async fn find_topic(&self, name: &str) -> PubSubResult<Option<TopicArn>>;

    /// Subscribes a queue to a topic so that published envelopes are
    /// delivered to it.
    async fn bind_queue(&self, topic_arn: &TopicArn, queue_url: &QueueUrl) -> PubSubResult<()>;
}

/// Errors returned by pub/sub transport adapters.
#[derive(Debug, Clone, Error)]
pub enum PubSubError {
    /// The topic does not exist in the broker.
    #[error("topic {0} does not exist")]
    TopicNotFound(TopicArn),

    /// The queue does not exist in the broker.
    #[error("queue {0} does not exist")]
    QueueNotFound(QueueUrl),

    /// Opaque broker or network failure.
    #[error("pub/sub transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl PubSubError {
    /// Wraps a broker or network error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
