//! A consumer's named binding to a topic.

use super::{Environment, Topic, ValidationError, names::is_valid_name};
use std::fmt;

/// Maximum length of the `subscriber.process` subscription name.
pub const MAX_SUBSCRIPTION_NAME_LENGTH: usize = 36;

/// Suffix appended to a subscription's queue name to form its dead-letter
/// queue name.
const DEAD_LETTER_SUFFIX: &str = "_dl";

/// A consumer's binding to a [`Topic`].
///
/// `subscriber` is the consuming bounded context and `process` the logical
/// handler. Together with the topic and an environment they form a globally
/// unique queue name.
///
/// # Examples
///
/// ```
/// use switchyard::messaging::domain::{Subscription, Topic};
///
/// let topic = Topic::new("monolith", "user-signed-in", 1).expect("valid topic");
/// let subscription =
///     Subscription::new(topic, "job-costing", "sign-in-handler").expect("valid subscription");
///
/// assert_eq!(subscription.subscription_name(), "job-costing.sign-in-handler");
/// assert_eq!(
///     subscription.to_string(),
///     "monolith.user-signed-in.v1.job-costing.sign-in-handler"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    topic: Topic,
    subscriber: String,
    process: String,
    subscription_name: String,
}

impl Subscription {
    /// Creates a validated subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSubscriber`] or
    /// [`ValidationError::InvalidProcess`] when a component does not match
    /// the name pattern, and [`ValidationError::SubscriptionNameTooLong`]
    /// when `subscriber.process` exceeds [`MAX_SUBSCRIPTION_NAME_LENGTH`].
    pub fn new(
        topic: Topic,
        subscriber: impl Into<String>,
        process: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let subscriber = subscriber.into();
        let process = process.into();

        if !is_valid_name(&subscriber) {
            return Err(ValidationError::InvalidSubscriber(subscriber));
        }
        if !is_valid_name(&process) {
            return Err(ValidationError::InvalidProcess(process));
        }

        let subscription_name = format!("{subscriber}.{process}");
        if subscription_name.len() > MAX_SUBSCRIPTION_NAME_LENGTH {
            return Err(ValidationError::SubscriptionNameTooLong {
                name: subscription_name,
                limit: MAX_SUBSCRIPTION_NAME_LENGTH,
            });
        }

        Ok(Self {
            topic,
            subscriber,
            process,
            subscription_name,
        })
    }

    /// Returns the subscribed topic.
    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns the consuming bounded context.
    #[must_use]
    pub fn subscriber(&self) -> &str {
        &self.subscriber
    }

    /// Returns the logical handler name.
    #[must_use]
    pub fn process(&self) -> &str {
        &self.process
    }

    /// Returns `subscriber.process`.
    #[must_use]
    pub fn subscription_name(&self) -> &str {
        &self.subscription_name
    }

    /// Returns the environment-scoped queue name for this subscription.
    #[must_use]
    pub fn queue_name(&self, environment: &Environment) -> String {
        format!(
            "{}_{}_{}",
            self.topic.queue_name_prefix(environment),
            self.subscriber,
            self.process
        )
    }

    /// Returns the environment-scoped dead-letter queue name.
    #[must_use]
    pub fn dead_letter_queue_name(&self, environment: &Environment) -> String {
        format!("{}{DEAD_LETTER_SUFFIX}", self.queue_name(environment))
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}", self.topic, self.subscription_name)
    }
}
