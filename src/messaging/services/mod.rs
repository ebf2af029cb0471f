//! Orchestration services for publishing, provisioning, and consuming.

mod binder;
mod cache;
mod events;
mod mapper;
mod provisioner;
mod publisher;
mod subscriber;

pub use binder::{BIND_BACKOFF_STEP, MAX_BIND_ATTEMPTS, RetryingTopicBinder};
pub use cache::{ResolveError, ResolveResult, TopicArnCache};
pub use events::{DEFAULT_EVENT_CAPACITY, MessagingEvent, MessagingEvents};
pub use mapper::{DeserializationError, MapperError, MapperResult, MessageMapper};
pub use provisioner::QueueProvisioner;
pub use publisher::{MessagePublisher, PublisherError, PublisherResult};
pub use subscriber::{
    HandlerError, HandlerResult, LOOP_ERROR_BACKOFF, LoopKey, LoopKind, MessageSubscriber,
    ProcessingError, SubscriberError, SubscriberResult,
};
