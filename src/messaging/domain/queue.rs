//! Queue attributes and the redrive policy linking a queue to its
//! dead-letter queue.

use super::QueueArn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Queue attributes this crate reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueAttribute {
    /// Resource identifier of the queue.
    QueueArn,
    /// JSON-encoded [`RedrivePolicy`].
    RedrivePolicy,
    /// Seconds a received message stays hidden from other consumers.
    VisibilityTimeout,
}

impl QueueAttribute {
    /// Returns the broker's name for the attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueueArn => "QueueArn",
            Self::RedrivePolicy => "RedrivePolicy",
            Self::VisibilityTimeout => "VisibilityTimeout",
        }
    }
}

impl fmt::Display for QueueAttribute {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Attribute map supplied when creating a queue.
pub type QueueAttributes = BTreeMap<QueueAttribute, String>;

/// Broker-side rule moving a message to the dead-letter queue once it has
/// been received more than `max_receive_count` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    /// Dead-letter queue receiving exhausted messages.
    pub dead_letter_target_arn: QueueArn,
    /// Receives allowed before a message is dead-lettered.
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    /// Creates a redrive policy.
    #[must_use]
    pub const fn new(dead_letter_target_arn: QueueArn, max_receive_count: u32) -> Self {
        Self {
            dead_letter_target_arn,
            max_receive_count,
        }
    }
}
