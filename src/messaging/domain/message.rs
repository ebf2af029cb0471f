//! Typed message envelope exchanged by publishers and subscribers.

use super::{MessageId, Topic};
use chrono::{DateTime, Utc};
use std::hash::{Hash, Hasher};

/// A typed payload published on, or received from, a [`Topic`].
///
/// Messages are immutable snapshots. Publishing yields a new instance with
/// [`published_at`](Self::published_at) set; the caller's instance is never
/// modified. Two messages are equal when their identifiers are equal.
///
/// # Examples
///
/// ```
/// use switchyard::messaging::domain::{Message, Topic};
///
/// let topic = Topic::new("billing", "invoice-paid", 1).expect("valid topic");
/// let message = Message::new(topic, "hello").with_correlation_id("request-42");
///
/// assert_eq!(message.correlation_id(), "request-42");
/// assert!(message.published_at().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Message<T> {
    message_id: MessageId,
    correlation_id: String,
    topic: Topic,
    body: T,
    published_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
}

impl<T> Message<T> {
    /// Creates a message with a fresh identifier and no correlation ID.
    #[must_use]
    pub fn new(topic: Topic, body: T) -> Self {
        Self::with_id(MessageId::new(), topic, body)
    }

    pub(crate) const fn with_id(message_id: MessageId, topic: Topic, body: T) -> Self {
        Self {
            message_id,
            correlation_id: String::new(),
            topic,
            body,
            published_at: None,
            received_at: None,
        }
    }

    /// Returns a copy carrying the given correlation ID.
    #[must_use]
    pub fn with_correlation_id(self, correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ..self
        }
    }

    #[must_use]
    pub(crate) fn with_published_at(self, published_at: Option<DateTime<Utc>>) -> Self {
        Self {
            published_at,
            ..self
        }
    }

    #[must_use]
    pub(crate) fn with_received_at(self, received_at: Option<DateTime<Utc>>) -> Self {
        Self {
            received_at,
            ..self
        }
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Returns the correlation ID, empty when none was supplied.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Returns the topic.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns the payload.
    #[must_use]
    pub const fn body(&self) -> &T {
        &self.body
    }

    /// Consumes the message and returns its payload.
    #[must_use]
    pub fn into_body(self) -> T {
        self.body
    }

    /// Returns when the publisher handed the message to the broker.
    #[must_use]
    pub const fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// Returns when the subscriber received the message.
    #[must_use]
    pub const fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }
}

impl<T> PartialEq for Message<T> {
    fn eq(&self, other: &Self) -> bool {
        self.message_id == other.message_id
    }
}

impl<T> Eq for Message<T> {}

impl<T> Hash for Message<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.message_id.hash(state);
    }
}

/// Builder for fully specified messages, mainly for exercising handlers in
/// tests.
///
/// Unlike [`Message::new`], every field may be set, including the timestamps
/// that are otherwise only assigned during publishing and receiving.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use switchyard::messaging::domain::{MessageBuilder, MessageId, Topic};
///
/// let topic = Topic::new("billing", "invoice-paid", 1).expect("valid topic");
/// let message = MessageBuilder::new(topic)
///     .with_message_id(MessageId::from_string("fixed-id"))
///     .with_received_at(Some(Utc::now()))
///     .build(42_u32);
///
/// assert_eq!(message.message_id().as_str(), "fixed-id");
/// assert_eq!(*message.body(), 42);
/// ```
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message_id: MessageId,
    topic: Topic,
    correlation_id: String,
    published_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    /// Starts a builder for a message on `topic` with a fresh identifier.
    #[must_use]
    pub fn new(topic: Topic) -> Self {
        Self {
            message_id: MessageId::new(),
            topic,
            correlation_id: String::new(),
            published_at: None,
            received_at: None,
        }
    }

    /// Sets the message identifier.
    #[must_use]
    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = message_id;
        self
    }

    /// Sets the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = topic;
        self
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Sets the publish timestamp.
    #[must_use]
    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Sets the receive timestamp.
    #[must_use]
    pub fn with_received_at(mut self, received_at: Option<DateTime<Utc>>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Builds a message around `body`.
    #[must_use]
    pub fn build<T>(self, body: T) -> Message<T> {
        Message {
            message_id: self.message_id,
            correlation_id: self.correlation_id,
            topic: self.topic,
            body,
            published_at: self.published_at,
            received_at: self.received_at,
        }
    }
}
