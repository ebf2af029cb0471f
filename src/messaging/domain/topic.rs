//! Versioned, structured topic names.

use super::{Environment, ValidationError, names::is_valid_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a canonical topic name.
pub const MAX_TOPIC_NAME_LENGTH: usize = 37;

/// Logical, versioned event stream owned by a publishing bounded context.
///
/// The canonical form is `publisher.event-name.vN`. Topics are immutable and
/// compare by value.
///
/// # Examples
///
/// ```
/// use switchyard::messaging::domain::Topic;
///
/// let topic = Topic::new("job-costing", "job-updated", 2).expect("valid topic");
/// assert_eq!(topic.to_string(), "job-costing.job-updated.v2");
///
/// let parsed: Topic = "job-costing.job-updated.v2".parse().expect("canonical name");
/// assert_eq!(parsed, topic);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic {
    publisher: String,
    event_name: String,
    version: u32,
    canonical: String,
}

impl Topic {
    /// Creates a validated topic.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPublisher`] or
    /// [`ValidationError::InvalidEventName`] when a component does not match
    /// the name pattern, [`ValidationError::NegativeVersion`] for a negative
    /// version, and [`ValidationError::TopicNameTooLong`] when the canonical
    /// name exceeds [`MAX_TOPIC_NAME_LENGTH`].
    pub fn new(
        publisher: impl Into<String>,
        event_name: impl Into<String>,
        version: i32,
    ) -> Result<Self, ValidationError> {
        let publisher = publisher.into();
        let event_name = event_name.into();

        if !is_valid_name(&publisher) {
            return Err(ValidationError::InvalidPublisher(publisher));
        }
        if !is_valid_name(&event_name) {
            return Err(ValidationError::InvalidEventName(event_name));
        }
        let version = u32::try_from(version)
            .map_err(|_| ValidationError::NegativeVersion(version))?;

        let canonical = format!("{publisher}.{event_name}.v{version}");
        if canonical.len() > MAX_TOPIC_NAME_LENGTH {
            return Err(ValidationError::TopicNameTooLong {
                name: canonical,
                limit: MAX_TOPIC_NAME_LENGTH,
            });
        }

        Ok(Self {
            publisher,
            event_name,
            version,
            canonical,
        })
    }

    /// Returns the owning bounded context.
    #[must_use]
    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Returns the event name.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Returns the schema version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the canonical `publisher.event-name.vN` form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Returns the name used to look the topic up in the broker,
    /// `"{environment}:{topic}"`.
    ///
    /// The same string keys the resolved-identifier cache.
    #[must_use]
    pub fn lookup_name(&self, environment: &Environment) -> String {
        format!("{environment}:{}", self.canonical)
    }

    /// Returns the environment-scoped prefix shared by every queue bound to
    /// this topic.
    ///
    /// Queue names only admit letters, digits, hyphens, and underscores, so
    /// components are joined with underscores.
    #[must_use]
    pub fn queue_name_prefix(&self, environment: &Environment) -> String {
        format!(
            "{environment}_{}_{}_v{}",
            self.publisher, self.event_name, self.version
        )
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.canonical)
    }
}

impl FromStr for Topic {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedTopicName(value.to_owned());

        let mut parts = value.split('.');
        let (Some(publisher), Some(event_name), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let version = version
            .strip_prefix('v')
            .and_then(|digits| digits.parse::<i32>().ok())
            .ok_or_else(malformed)?;

        Self::new(publisher, event_name, version)
    }
}

impl TryFrom<String> for Topic {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.canonical
    }
}
