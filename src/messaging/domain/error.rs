//! Error types for topic, subscription, and environment validation.

use super::names::NAME_PATTERN;
use thiserror::Error;

/// Errors returned while constructing messaging domain values.
///
/// Every variant names the offending parameter through
/// [`ValidationError::parameter`] and states the rule it broke.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The publisher component of a topic does not match the name pattern.
    #[error("publisher name must match pattern: {pattern} (parameter 'publisher')", pattern = NAME_PATTERN)]
    InvalidPublisher(String),

    /// The event name component of a topic does not match the name pattern.
    #[error("event name must match pattern: {pattern} (parameter 'event_name')", pattern = NAME_PATTERN)]
    InvalidEventName(String),

    /// The topic version is negative.
    #[error("version may not be negative (parameter 'version')")]
    NegativeVersion(i32),

    /// The canonical topic name exceeds its length limit.
    #[error("the topic name '{name}' exceeds the {limit} character limit")]
    TopicNameTooLong {
        /// Canonical topic name that was rejected.
        name: String,
        /// Maximum permitted length.
        limit: usize,
    },

    /// A canonical topic string could not be split into its components.
    #[error("'{0}' is not a canonical topic name (expected publisher.event-name.vN)")]
    MalformedTopicName(String),

    /// The subscriber component of a subscription does not match the name
    /// pattern.
    #[error("subscriber name must match pattern: {pattern} (parameter 'subscriber')", pattern = NAME_PATTERN)]
    InvalidSubscriber(String),

    /// The process component of a subscription does not match the name
    /// pattern.
    #[error("process name must match pattern: {pattern} (parameter 'process')", pattern = NAME_PATTERN)]
    InvalidProcess(String),

    /// The combined subscription name exceeds its length limit.
    #[error("the subscription name '{name}' exceeds the {limit} character limit")]
    SubscriptionNameTooLong {
        /// Subscription name that was rejected.
        name: String,
        /// Maximum permitted length.
        limit: usize,
    },

    /// The environment name is empty or contains characters outside
    /// `[a-z0-9]`.
    #[error(
        "environment '{0}' must contain only lowercase letters and digits (parameter 'environment')"
    )]
    InvalidEnvironment(String),

    /// The environment name exceeds its length limit.
    #[error("environment {name} must not exceed {limit} characters")]
    EnvironmentTooLong {
        /// Environment name that was rejected.
        name: String,
        /// Maximum permitted length.
        limit: usize,
    },
}

impl ValidationError {
    /// Returns the name of the constructor parameter the error refers to.
    #[must_use]
    pub const fn parameter(&self) -> &'static str {
        match self {
            Self::InvalidPublisher(_) => "publisher",
            Self::InvalidEventName(_) => "event_name",
            Self::NegativeVersion(_) => "version",
            Self::TopicNameTooLong { .. } | Self::MalformedTopicName(_) => "topic",
            Self::InvalidSubscriber(_) => "subscriber",
            Self::InvalidProcess(_) => "process",
            Self::SubscriptionNameTooLong { .. } => "subscription",
            Self::InvalidEnvironment(_) | Self::EnvironmentTooLong { .. } => "environment",
        }
    }
}
