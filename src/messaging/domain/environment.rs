//! Deployment environment that scopes every broker resource name.

use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an environment name.
///
/// Queue names embed the environment, topic, and subscription, and the
/// broker caps queue names at 80 characters.
pub const MAX_ENVIRONMENT_LENGTH: usize = 3;

/// Validated environment name such as `dev`, `qa`, or `prd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Environment(String);

impl Environment {
    /// Creates a validated environment name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEnvironment`] when the name is empty
    /// or contains characters outside `[a-z0-9]`, and
    /// [`ValidationError::EnvironmentTooLong`] when it exceeds
    /// [`MAX_ENVIRONMENT_LENGTH`].
    ///
    /// # Examples
    ///
    /// ```
    /// use switchyard::messaging::domain::Environment;
    ///
    /// let environment = Environment::new("dev").expect("valid environment");
    /// assert_eq!(environment.as_str(), "dev");
    /// assert!(Environment::new("staging").is_err());
    /// ```
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let name = value.into();

        let is_valid = !name.is_empty()
            && name
                .bytes()
                .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit());
        if !is_valid {
            return Err(ValidationError::InvalidEnvironment(name));
        }

        if name.len() > MAX_ENVIRONMENT_LENGTH {
            return Err(ValidationError::EnvironmentTooLong {
                name,
                limit: MAX_ENVIRONMENT_LENGTH,
            });
        }

        Ok(Self(name))
    }

    /// Returns the environment name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Environment {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Environment> for String {
    fn from(environment: Environment) -> Self {
        environment.0
    }
}

impl AsRef<str> for Environment {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
