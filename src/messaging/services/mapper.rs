//! Conversion between typed messages and broker envelopes.

use crate::messaging::{
    config::MessagingConfig,
    domain::{
        ActionAfterCompletion, CORRELATION_ID_ATTRIBUTE, FlexibleTimeWindow, MESSAGE_ID_ATTRIBUTE,
        Message, MessageId, NotificationEnvelope, PUBLISHED_AT_ATTRIBUTE, ReceivedMessage,
        ScheduleName, ScheduleRequest, ScheduleTarget, Topic, TopicArn, WireEnvelope,
        at_expression, schedule_group_name,
    },
    ports::{MessageSerializer, SerializationError},
};
use chrono::{DateTime, SecondsFormat, Utc};
use mockable::Clock;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Result type for outbound mapping.
pub type MapperResult<T> = Result<T, MapperError>;

/// Errors raised while mapping an outbound message.
#[derive(Debug, Clone, Error)]
pub enum MapperError {
    /// The message has not been stamped with a publish time.
    #[error("message {0} has no publish time")]
    MissingPublishedAt(MessageId),

    /// The body could not be serialized.
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// A received message could not be turned into a typed [`Message`].
///
/// Terminal for the delivery: the message is left on the queue for the
/// broker to redeliver or dead-letter.
#[derive(Debug, Clone, Error)]
#[error("error deserializing message on topic {topic}; data: {payload}")]
pub struct DeserializationError {
    topic: Topic,
    payload: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl DeserializationError {
    fn new(
        topic: &Topic,
        payload: &str,
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            topic: topic.clone(),
            payload: payload.to_owned(),
            source,
        }
    }

    /// Returns the topic the message arrived on.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns the text that failed to decode.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Maps [`Message`] values to wire envelopes and schedule requests, and raw
/// deliveries back to messages.
pub struct MessageMapper<S, C>
where
    S: MessageSerializer,
    C: Clock + Send + Sync,
{
    serializer: Arc<S>,
    clock: Arc<C>,
    config: Arc<MessagingConfig>,
}

impl<S, C> MessageMapper<S, C>
where
    S: MessageSerializer,
    C: Clock + Send + Sync,
{
    /// Creates a mapper.
    #[must_use]
    pub const fn new(serializer: Arc<S>, clock: Arc<C>, config: Arc<MessagingConfig>) -> Self {
        Self {
            serializer,
            clock,
            config,
        }
    }

    /// Serializes the body of a stamped message and attaches its identifier,
    /// publish time, and non-empty correlation ID as attributes.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::MissingPublishedAt`] for an unstamped message
    /// and [`MapperError::Serialization`] when the body cannot be encoded.
    pub fn to_wire_envelope<T>(&self, message: &Message<T>) -> MapperResult<WireEnvelope>
    where
        T: Serialize,
    {
        let published_at = message
            .published_at()
            .ok_or_else(|| MapperError::MissingPublishedAt(message.message_id().clone()))?;

        let mut envelope = WireEnvelope::new(self.serializer.serialize(message.body())?)
            .with_attribute(MESSAGE_ID_ATTRIBUTE, message.message_id().as_str())
            .with_attribute(
                PUBLISHED_AT_ATTRIBUTE,
                published_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            );
        if !message.correlation_id().is_empty() {
            envelope = envelope.with_attribute(CORRELATION_ID_ATTRIBUTE, message.correlation_id());
        }
        Ok(envelope)
    }

    /// Decodes a queue delivery into a message on `topic`, stamping
    /// `received_at` with the current time.
    ///
    /// A missing message ID yields a fresh one, a missing correlation ID
    /// yields an empty one, and a missing publish time leaves
    /// `published_at` unset.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializationError`] when the notification or body cannot
    /// be decoded, the body is empty or `null`, or the publish time is not
    /// RFC 3339.
    pub fn from_wire_envelope<T>(
        &self,
        topic: &Topic,
        delivery: &ReceivedMessage,
    ) -> Result<Message<T>, DeserializationError>
    where
        T: DeserializeOwned,
    {
        let notification: NotificationEnvelope = self.decode(topic, &delivery.body)?;
        let body: T = self.decode(topic, &notification.message)?;

        let message_id = notification
            .attribute(MESSAGE_ID_ATTRIBUTE)
            .map_or_else(MessageId::new, MessageId::from_string);
        let correlation_id = notification
            .attribute(CORRELATION_ID_ATTRIBUTE)
            .unwrap_or_default()
            .to_owned();
        let published_at = notification
            .attribute(PUBLISHED_AT_ATTRIBUTE)
            .filter(|timestamp| !timestamp.is_empty())
            .map(|timestamp| {
                DateTime::parse_from_rfc3339(timestamp)
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(|err| {
                        DeserializationError::new(topic, &delivery.body, Some(Arc::new(err)))
                    })
            })
            .transpose()?;

        Ok(Message::with_id(message_id, topic.clone(), body)
            .with_correlation_id(correlation_id)
            .with_published_at(published_at)
            .with_received_at(Some(self.clock.utc())))
    }

    /// Builds a one-shot schedule that publishes the message body to
    /// `topic_arn` at `publish_at`, assuming `role_arn`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::Serialization`] when the body cannot be encoded.
    pub fn to_schedule_request<T>(
        &self,
        topic_arn: &TopicArn,
        message: &Message<T>,
        publish_at: DateTime<Utc>,
        role_arn: &str,
    ) -> MapperResult<ScheduleRequest>
    where
        T: Serialize,
    {
        Ok(ScheduleRequest {
            name: ScheduleName::new(Uuid::new_v4().to_string()),
            group_name: schedule_group_name(self.config.environment()),
            schedule_expression: at_expression(publish_at),
            fire_at: publish_at,
            target: ScheduleTarget {
                topic_arn: topic_arn.clone(),
                input: self.serializer.serialize(message.body())?,
                role_arn: role_arn.to_owned(),
            },
            action_after_completion: ActionAfterCompletion::Delete,
            flexible_time_window: FlexibleTimeWindow::Off,
        })
    }

    fn decode<T>(&self, topic: &Topic, text: &str) -> Result<T, DeserializationError>
    where
        T: DeserializeOwned,
    {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Err(DeserializationError::new(topic, text, None));
        }
        self.serializer
            .deserialize(text)
            .map_err(|err| DeserializationError::new(topic, text, Some(Arc::new(err))))
    }
}
