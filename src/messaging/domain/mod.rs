//! Domain model for topic-based messaging.
//!
//! Contains the naming rules for topics and subscriptions, the typed message
//! envelope, broker identifiers, and the wire-level shapes exchanged with the
//! broker. Nothing here performs I/O.

mod envelope;
mod environment;
mod error;
mod ids;
mod message;
mod names;
mod queue;
mod schedule;
mod subscription;
mod topic;

pub use envelope::{
    CORRELATION_ID_ATTRIBUTE, MESSAGE_ID_ATTRIBUTE, NotificationAttribute, NotificationEnvelope,
    PUBLISHED_AT_ATTRIBUTE, ReceivedMessage, STRING_ATTRIBUTE_TYPE, WireEnvelope,
};
pub use environment::{Environment, MAX_ENVIRONMENT_LENGTH};
pub use error::ValidationError;
pub use ids::{MessageId, QueueArn, QueueUrl, ReceiptHandle, ScheduleName, TopicArn};
pub use message::{Message, MessageBuilder};
pub use names::{NAME_PATTERN, is_valid_name};
pub use queue::{QueueAttribute, QueueAttributes, RedrivePolicy};
pub use schedule::{
    ActionAfterCompletion, FlexibleTimeWindow, ScheduleRequest, ScheduleTarget, at_expression,
    schedule_group_name,
};
pub use subscription::{MAX_SUBSCRIPTION_NAME_LENGTH, Subscription};
pub use topic::{MAX_TOPIC_NAME_LENGTH, Topic};
