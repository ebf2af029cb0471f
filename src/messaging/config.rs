//! Runtime settings shared by the publisher, provisioner, and subscriber.

use crate::messaging::domain::{Environment, ValidationError};
use serde::Deserialize;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Default number of messages requested per long poll.
pub const DEFAULT_MAX_NUMBER_OF_MESSAGES: u32 = 10;

/// Default long-poll wait in seconds.
pub const DEFAULT_LONG_POLLING_SECONDS: u32 = 20;

/// Default number of receives before a message is dead-lettered.
pub const DEFAULT_DEAD_LETTER_AFTER_ATTEMPTS: u32 = 5;

/// Default queue visibility timeout in seconds.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECONDS: u32 = 30;

const MAX_NUMBER_OF_MESSAGES_RANGE: RangeInclusive<u32> = 1..=10;
const LONG_POLLING_SECONDS_RANGE: RangeInclusive<u32> = 0..=20;
const MAX_VISIBILITY_TIMEOUT_SECONDS: u32 = 43_200;

/// Messaging configuration supplied by the host application.
///
/// Keys are camelCase when read from JSON; every key but `environment` is
/// optional.
///
/// # Examples
///
/// ```
/// use switchyard::messaging::MessagingConfig;
///
/// let config = MessagingConfig::from_json(r#"{"environment":"dev","longPollingSeconds":5}"#)
///     .expect("valid configuration");
///
/// assert_eq!(config.environment().as_str(), "dev");
/// assert_eq!(config.long_polling_seconds(), 5);
/// assert_eq!(config.max_number_of_messages(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingConfig {
    environment: Environment,
    #[serde(default = "default_max_number_of_messages")]
    max_number_of_messages: u32,
    #[serde(default = "default_long_polling_seconds")]
    long_polling_seconds: u32,
    #[serde(default = "default_dead_letter_after_attempts")]
    dead_letter_after_attempts: u32,
    #[serde(default = "default_visibility_timeout_seconds")]
    visibility_timeout_seconds: u32,
    #[serde(default)]
    scheduler_role_arn: Option<String>,
}

const fn default_max_number_of_messages() -> u32 {
    DEFAULT_MAX_NUMBER_OF_MESSAGES
}

const fn default_long_polling_seconds() -> u32 {
    DEFAULT_LONG_POLLING_SECONDS
}

const fn default_dead_letter_after_attempts() -> u32 {
    DEFAULT_DEAD_LETTER_AFTER_ATTEMPTS
}

const fn default_visibility_timeout_seconds() -> u32 {
    DEFAULT_VISIBILITY_TIMEOUT_SECONDS
}

impl MessagingConfig {
    /// Creates a configuration with default settings for `environment`.
    #[must_use]
    pub const fn new(environment: Environment) -> Self {
        Self {
            environment,
            max_number_of_messages: DEFAULT_MAX_NUMBER_OF_MESSAGES,
            long_polling_seconds: DEFAULT_LONG_POLLING_SECONDS,
            dead_letter_after_attempts: DEFAULT_DEAD_LETTER_AFTER_ATTEMPTS,
            visibility_timeout_seconds: DEFAULT_VISIBILITY_TIMEOUT_SECONDS,
            scheduler_role_arn: None,
        }
    }

    /// Creates a configuration with default settings for a named
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Environment`] when the name is not a valid
    /// environment.
    pub fn for_environment(name: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(Environment::new(name)?))
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or an invalid
    /// environment, and the [`validate`](Self::validate) errors for settings
    /// out of range.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the number of messages requested per long poll.
    #[must_use]
    pub const fn with_max_number_of_messages(mut self, value: u32) -> Self {
        self.max_number_of_messages = value;
        self
    }

    /// Sets the long-poll wait in seconds.
    #[must_use]
    pub const fn with_long_polling_seconds(mut self, value: u32) -> Self {
        self.long_polling_seconds = value;
        self
    }

    /// Sets how many receives a message gets before it is dead-lettered.
    #[must_use]
    pub const fn with_dead_letter_after_attempts(mut self, value: u32) -> Self {
        self.dead_letter_after_attempts = value;
        self
    }

    /// Sets the visibility timeout of newly created queues.
    #[must_use]
    pub const fn with_visibility_timeout_seconds(mut self, value: u32) -> Self {
        self.visibility_timeout_seconds = value;
        self
    }

    /// Sets the identity the scheduler assumes for delayed publishes.
    #[must_use]
    pub fn with_scheduler_role_arn(mut self, value: impl Into<String>) -> Self {
        self.scheduler_role_arn = Some(value.into());
        self
    }

    /// Checks every numeric setting against the broker's limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "maxNumberOfMessages",
            self.max_number_of_messages,
            &MAX_NUMBER_OF_MESSAGES_RANGE,
        )?;
        check_range(
            "longPollingSeconds",
            self.long_polling_seconds,
            &LONG_POLLING_SECONDS_RANGE,
        )?;
        check_range(
            "deadLetterAfterAttempts",
            self.dead_letter_after_attempts,
            &(1..=1000),
        )?;
        check_range(
            "visibilityTimeoutSeconds",
            self.visibility_timeout_seconds,
            &(0..=MAX_VISIBILITY_TIMEOUT_SECONDS),
        )
    }

    /// Returns the deployment environment.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns the number of messages requested per long poll.
    #[must_use]
    pub const fn max_number_of_messages(&self) -> u32 {
        self.max_number_of_messages
    }

    /// Returns the long-poll wait in seconds.
    #[must_use]
    pub const fn long_polling_seconds(&self) -> u32 {
        self.long_polling_seconds
    }

    /// Returns the dead-letter threshold.
    #[must_use]
    pub const fn dead_letter_after_attempts(&self) -> u32 {
        self.dead_letter_after_attempts
    }

    /// Returns the visibility timeout of newly created queues.
    #[must_use]
    pub const fn visibility_timeout_seconds(&self) -> u32 {
        self.visibility_timeout_seconds
    }

    /// Returns the scheduler identity, if delayed publishing is configured.
    #[must_use]
    pub fn scheduler_role_arn(&self) -> Option<&str> {
        self.scheduler_role_arn.as_deref()
    }
}

fn check_range(
    key: &'static str,
    value: u32,
    range: &RangeInclusive<u32>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange {
        key,
        value,
        min: *range.start(),
        max: *range.end(),
    })
}

/// Errors raised while loading messaging configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid configuration JSON.
    #[error("invalid messaging configuration: {0}")]
    Parse(String),

    /// The environment name is invalid.
    #[error(transparent)]
    Environment(#[from] ValidationError),

    /// A numeric setting is outside the range the broker accepts.
    #[error("{key} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Configuration key.
        key: &'static str,
        /// Rejected value.
        value: u32,
        /// Smallest accepted value.
        min: u32,
        /// Largest accepted value.
        max: u32,
    },
}
