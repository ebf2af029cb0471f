//! Lazy creation of subscription queues and their dead-letter queues.

use super::{RetryingTopicBinder, TopicArnCache};
use crate::messaging::{
    config::MessagingConfig,
    domain::{QueueArn, QueueAttribute, QueueAttributes, QueueUrl, RedrivePolicy, Subscription},
    ports::{
        Delayer, MessageSerializer, ProvisioningResult, PubSubTransport, QueueTransport,
        QueueUrlRetriever,
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// [`QueueUrlRetriever`] that creates a subscription's queues on first use.
///
/// A missing queue is provisioned by resolving the topic, creating the
/// dead-letter queue, creating the primary queue with a redrive policy and
/// visibility timeout from [`MessagingConfig`], and binding the primary
/// queue to the topic.
///
/// Two callers provisioning the same subscription at once are not
/// coordinated. Queue creation is idempotent in the broker, so the race at
/// worst produces a redundant bind.
pub struct QueueProvisioner<Q, P, S, D>
where
    Q: QueueTransport,
    P: PubSubTransport,
    S: MessageSerializer,
    D: Delayer,
{
    queues: Arc<Q>,
    topics: Arc<TopicArnCache<P>>,
    binder: RetryingTopicBinder<P, D>,
    serializer: Arc<S>,
    config: Arc<MessagingConfig>,
}

impl<Q, P, S, D> QueueProvisioner<Q, P, S, D>
where
    Q: QueueTransport,
    P: PubSubTransport,
    S: MessageSerializer,
    D: Delayer,
{
    /// Creates a provisioner.
    #[must_use]
    pub const fn new(
        queues: Arc<Q>,
        topics: Arc<TopicArnCache<P>>,
        binder: RetryingTopicBinder<P, D>,
        serializer: Arc<S>,
        config: Arc<MessagingConfig>,
    ) -> Self {
        Self {
            queues,
            topics,
            binder,
            serializer,
            config,
        }
    }

    async fn provision(
        &self,
        subscription: &Subscription,
        queue_name: &str,
    ) -> ProvisioningResult<QueueUrl> {
        let environment = self.config.environment();
        let topic_arn = self
            .topics
            .resolve(environment, subscription.topic())
            .await?;

        let dead_letter_name = subscription.dead_letter_queue_name(environment);
        let dead_letter_url = self
            .queues
            .create_queue(&dead_letter_name, &QueueAttributes::new())
            .await?;
        let dead_letter_arn = self
            .queues
            .get_queue_attribute(&dead_letter_url, QueueAttribute::QueueArn)
            .await?;

        let policy = RedrivePolicy::new(
            QueueArn::new(dead_letter_arn),
            self.config.dead_letter_after_attempts(),
        );
        let attributes = QueueAttributes::from([
            (
                QueueAttribute::RedrivePolicy,
                self.serializer.serialize(&policy)?,
            ),
            (
                QueueAttribute::VisibilityTimeout,
                self.config.visibility_timeout_seconds().to_string(),
            ),
        ]);
        let queue_url = self.queues.create_queue(queue_name, &attributes).await?;

        self.binder.bind(&topic_arn, &queue_url).await?;
        info!(
            subscription = %subscription,
            queue = queue_name,
            dead_letter_queue = %dead_letter_name,
            "provisioned subscription queue"
        );
        Ok(queue_url)
    }
}

#[async_trait]
impl<Q, P, S, D> QueueUrlRetriever for QueueProvisioner<Q, P, S, D>
where
    Q: QueueTransport,
    P: PubSubTransport,
    S: MessageSerializer,
    D: Delayer,
{
    async fn get_or_create_queue(
        &self,
        subscription: &Subscription,
    ) -> ProvisioningResult<QueueUrl> {
        let queue_name = subscription.queue_name(self.config.environment());
        match self.queues.get_queue_url(&queue_name).await {
            Ok(queue_url) => {
                debug!(queue = %queue_name, "subscription queue exists");
                Ok(queue_url)
            }
            Err(err) if err.is_not_found() => {
                info!(queue = %queue_name, "subscription queue missing; provisioning");
                self.provision(subscription, &queue_name).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn dead_letter_queue_url(
        &self,
        subscription: &Subscription,
    ) -> ProvisioningResult<QueueUrl> {
        let queue_name = subscription.dead_letter_queue_name(self.config.environment());
        Ok(self.queues.get_queue_url(&queue_name).await?)
    }
}
