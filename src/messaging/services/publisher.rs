//! Immediate and scheduled publishing.

use super::{
    MapperError, MessageMapper, MessagingEvent, MessagingEvents, ResolveError, TopicArnCache,
};
use crate::messaging::{
    config::MessagingConfig,
    domain::{Message, ScheduleName},
    ports::{MessageSerializer, PubSubError, PubSubTransport, SchedulerError, SchedulerTransport},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Result type for publisher operations.
pub type PublisherResult<T> = Result<T, PublisherError>;

/// Errors returned to callers of [`MessagePublisher`].
#[derive(Debug, Clone, Error)]
pub enum PublisherError {
    /// The topic identifier could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The message could not be mapped.
    #[error(transparent)]
    Mapping(#[from] MapperError),

    /// The broker rejected the publish.
    #[error(transparent)]
    PubSub(#[from] PubSubError),

    /// The scheduler rejected the registration.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Scheduling was requested but no scheduler role is configured.
    #[error("scheduling requires a scheduler role; set schedulerRoleArn")]
    SchedulerNotConfigured,
}

/// Publishes messages to their topics, now or at a future time.
pub struct MessagePublisher<P, K, S, C>
where
    P: PubSubTransport,
    K: SchedulerTransport,
    S: MessageSerializer,
    C: Clock + Send + Sync,
{
    pubsub: Arc<P>,
    scheduler: Arc<K>,
    topics: Arc<TopicArnCache<P>>,
    mapper: MessageMapper<S, C>,
    clock: Arc<C>,
    config: Arc<MessagingConfig>,
    events: MessagingEvents,
}

impl<P, K, S, C> MessagePublisher<P, K, S, C>
where
    P: PubSubTransport,
    K: SchedulerTransport,
    S: MessageSerializer,
    C: Clock + Send + Sync,
{
    /// Creates a publisher.
    #[must_use]
    pub fn new(
        pubsub: Arc<P>,
        scheduler: Arc<K>,
        topics: Arc<TopicArnCache<P>>,
        serializer: Arc<S>,
        clock: Arc<C>,
        config: Arc<MessagingConfig>,
        events: MessagingEvents,
    ) -> Self {
        let mapper = MessageMapper::new(serializer, Arc::clone(&clock), Arc::clone(&config));
        Self {
            pubsub,
            scheduler,
            topics,
            mapper,
            clock,
            config,
            events,
        }
    }

    /// Publishes `message` and returns a copy stamped with its publish time.
    ///
    /// The caller's message is left untouched. A
    /// [`MessagingEvent::MessagePublished`] event follows every accepted
    /// publish; its `elapsed` covers mapping and the broker send, not topic
    /// resolution.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError`] when the topic cannot be resolved, the body
    /// cannot be serialized, or the broker rejects the publish.
    pub async fn publish<T>(&self, message: &Message<T>) -> PublisherResult<Message<T>>
    where
        T: Serialize + Clone,
    {
        let topic_arn = self
            .topics
            .resolve(self.config.environment(), message.topic())
            .await?;

        let started = Instant::now();
        let stamped = message.clone().with_published_at(Some(self.clock.utc()));
        let envelope = self.mapper.to_wire_envelope(&stamped)?;
        self.pubsub.publish(&topic_arn, &envelope).await?;

        let elapsed = started.elapsed();
        info!(
            topic = %message.topic(),
            message_id = %message.message_id(),
            elapsed_ms = elapsed.as_millis(),
            "message published"
        );
        self.events.emit(MessagingEvent::MessagePublished {
            topic: message.topic().clone(),
            elapsed,
        });
        Ok(stamped)
    }

    /// Registers `message` to be published once at `publish_at`, returning
    /// the schedule name.
    ///
    /// A [`MessagingEvent::MessageScheduled`] event follows every accepted
    /// registration.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::SchedulerNotConfigured`] without contacting
    /// the broker when no scheduler role is configured, and other
    /// [`PublisherError`] variants when resolution, mapping, or registration
    /// fails.
    pub async fn schedule<T>(
        &self,
        message: &Message<T>,
        publish_at: DateTime<Utc>,
    ) -> PublisherResult<ScheduleName>
    where
        T: Serialize + Clone,
    {
        let role_arn = self
            .config
            .scheduler_role_arn()
            .ok_or(PublisherError::SchedulerNotConfigured)?;

        let topic_arn = self
            .topics
            .resolve(self.config.environment(), message.topic())
            .await?;

        let started = Instant::now();
        let stamped = message.clone().with_published_at(Some(self.clock.utc()));
        let request = self
            .mapper
            .to_schedule_request(&topic_arn, &stamped, publish_at, role_arn)?;
        let schedule_name = self.scheduler.create_one_shot_schedule(&request).await?;

        let elapsed = started.elapsed();
        info!(
            topic = %message.topic(),
            schedule = %schedule_name,
            publish_at = %publish_at,
            elapsed_ms = elapsed.as_millis(),
            "message scheduled"
        );
        self.events.emit(MessagingEvent::MessageScheduled {
            topic: message.topic().clone(),
            publish_at,
            elapsed,
        });
        Ok(schedule_name)
    }
}
