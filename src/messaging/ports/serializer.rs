//! Message body serialization port.

use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use thiserror::Error;

/// Result type for serializer operations.
pub type SerializationResult<T> = Result<T, SerializationError>;

/// Converts message bodies to and from text.
///
/// Implementations must read field names case-insensitively and write them
/// with a lowercase first letter.
pub trait MessageSerializer: Send + Sync {
    /// Serializes a value to text.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Serialize`] when the value cannot be
    /// represented.
    fn serialize<T>(&self, value: &T) -> SerializationResult<String>
    where
        T: Serialize + ?Sized;

    /// Deserializes text into a value.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Deserialize`] when the text is malformed
    /// or does not match `T`.
    fn deserialize<T>(&self, text: &str) -> SerializationResult<T>
    where
        T: DeserializeOwned;
}

/// Errors returned by serializers.
#[derive(Debug, Clone, Error)]
pub enum SerializationError {
    /// A value could not be serialized.
    #[error("failed to serialize value: {0}")]
    Serialize(Arc<dyn std::error::Error + Send + Sync>),

    /// Text could not be deserialized.
    #[error("failed to deserialize value: {0}")]
    Deserialize(Arc<dyn std::error::Error + Send + Sync>),
}

impl SerializationError {
    /// Wraps a serialization failure.
    pub fn serialize(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Serialize(Arc::new(err))
    }

    /// Wraps a deserialization failure.
    pub fn deserialize(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Deserialize(Arc::new(err))
    }
}
