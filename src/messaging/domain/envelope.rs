//! Wire-level envelopes exchanged with the broker.
//!
//! Publishing sends a [`WireEnvelope`] to a topic. The broker fans it out to
//! every bound queue wrapped in a [`NotificationEnvelope`], which consumers
//! then receive as the body of a [`ReceivedMessage`].

use super::ReceiptHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute carrying the application message identifier.
pub const MESSAGE_ID_ATTRIBUTE: &str = "MessageId";

/// Attribute carrying the RFC 3339 publish timestamp.
pub const PUBLISHED_AT_ATTRIBUTE: &str = "PublishedAt";

/// Attribute carrying the correlation identifier, present only when set.
pub const CORRELATION_ID_ATTRIBUTE: &str = "CorrelationId";

/// Data type of every attribute this crate writes.
pub const STRING_ATTRIBUTE_TYPE: &str = "String";

/// Serialized body plus out-of-band string attributes, as sent to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WireEnvelope {
    /// Serialized message body.
    pub body: String,
    /// String attributes keyed by attribute name.
    pub attributes: BTreeMap<String, String>,
}

impl WireEnvelope {
    /// Creates an envelope with no attributes.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Returns a copy carrying an additional attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A topic notification as delivered into a subscribed queue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationEnvelope {
    /// Notification kind, `Notification` for published messages.
    #[serde(default)]
    pub r#type: String,
    /// Broker-assigned notification identifier.
    #[serde(default)]
    pub message_id: String,
    /// Topic the notification was published on.
    #[serde(default)]
    pub topic_arn: String,
    /// Serialized message body.
    pub message: String,
    /// RFC 3339 time the broker accepted the notification.
    #[serde(default)]
    pub timestamp: String,
    /// Attributes forwarded from the published envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_attributes: Option<BTreeMap<String, NotificationAttribute>>,
}

impl NotificationEnvelope {
    /// Returns the value of a forwarded attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.message_attributes
            .as_ref()
            .and_then(|attributes| attributes.get(name))
            .map(|attribute| attribute.value.as_str())
    }
}

/// A single forwarded attribute within a [`NotificationEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationAttribute {
    /// Attribute data type.
    #[serde(default)]
    pub r#type: String,
    /// Attribute value.
    #[serde(default)]
    pub value: String,
}

impl NotificationAttribute {
    /// Creates a string attribute.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            r#type: STRING_ATTRIBUTE_TYPE.to_owned(),
            value: value.into(),
        }
    }
}

/// One raw delivery from a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Broker-assigned identifier of the queue message.
    pub broker_message_id: String,
    /// Handle used to delete this delivery.
    pub receipt_handle: ReceiptHandle,
    /// Raw message body.
    pub body: String,
}
