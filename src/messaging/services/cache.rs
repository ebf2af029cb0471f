//! Memoized topic identifier lookups.

use crate::messaging::{
    domain::{Environment, Topic, TopicArn},
    ports::{ProvisioningError, PubSubError, PubSubTransport},
};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Result type for topic resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while resolving a topic identifier.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The broker has no topic with the looked-up name.
    #[error("unable to find topic: {name}")]
    NotFound {
        /// Broker name that was looked up.
        name: String,
    },

    /// The lookup itself failed.
    #[error(transparent)]
    Transport(#[from] PubSubError),
}

impl From<ResolveError> for ProvisioningError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { name } => Self::TopicNotFound { name },
            ResolveError::Transport(source) => Self::PubSub(source),
        }
    }
}

/// Process-lifetime cache of topic identifiers keyed by
/// `"{environment}:{topic}"`.
///
/// Entries are never evicted. Concurrent misses for the same key may each
/// query the broker; the last write wins, which is harmless because a name
/// always resolves to the same identifier. Failed lookups are not cached.
pub struct TopicArnCache<P>
where
    P: PubSubTransport,
{
    pubsub: Arc<P>,
    entries: DashMap<String, TopicArn>,
}

impl<P> TopicArnCache<P>
where
    P: PubSubTransport,
{
    /// Creates an empty cache over a pub/sub transport.
    #[must_use]
    pub fn new(pubsub: Arc<P>) -> Self {
        Self {
            pubsub,
            entries: DashMap::new(),
        }
    }

    /// Returns the identifier of `topic` in `environment`, asking the broker
    /// only on the first successful call for that key.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when the broker has no such topic
    /// and [`ResolveError::Transport`] when the lookup fails.
    pub async fn resolve(
        &self,
        environment: &Environment,
        topic: &Topic,
    ) -> ResolveResult<TopicArn> {
        let name = topic.lookup_name(environment);
        if let Some(arn) = self.entries.get(&name).map(|entry| entry.value().clone()) {
            return Ok(arn);
        }

        debug!(topic = %name, "topic identifier not cached; querying broker");
        let arn = self
            .pubsub
            .find_topic(&name)
            .await?
            .ok_or_else(|| ResolveError::NotFound { name: name.clone() })?;
        self.entries.insert(name, arn.clone());
        Ok(arn)
    }

    /// Seeds the cache, for example from a deployment manifest.
    pub fn insert(&self, key: impl Into<String>, arn: TopicArn) {
        self.entries.insert(key.into(), arn);
    }

    /// Returns `true` when `key` has been resolved.
    #[must_use]
    pub fn is_cached(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of resolved entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
