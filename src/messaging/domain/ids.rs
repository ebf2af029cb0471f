//! Identifier newtypes for messages and broker resources.
//!
//! Broker identifiers are opaque strings assigned by the broker. Wrapping
//! them keeps a topic ARN from being passed where a queue URL is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the owned identifier string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }
    };
}

string_identifier!(
    /// Broker-assigned identifier of a topic.
    TopicArn
);

string_identifier!(
    /// Broker-assigned address of a queue, used for every queue operation.
    QueueUrl
);

string_identifier!(
    /// Broker-assigned resource identifier of a queue, used in redrive
    /// policies and topic bindings.
    QueueArn
);

string_identifier!(
    /// Handle for one delivery of a message, used to delete it.
    ReceiptHandle
);

string_identifier!(
    /// Name of a registered one-shot schedule.
    ScheduleName
);

/// Application-level message identifier carried across retries.
///
/// Identifiers created here are random UUIDs; identifiers read off the wire
/// are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Creates a new random message identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an identifier received from the broker.
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generates a new random identifier, like [`MessageId::new`].
impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
