//! Port contracts between the messaging services and the broker.

mod delayer;
mod pubsub;
mod queue;
mod retriever;
mod scheduler;
mod serializer;

pub use delayer::Delayer;
pub use pubsub::{PubSubError, PubSubResult, PubSubTransport};
pub use queue::{QueueError, QueueResult, QueueTransport};
pub use retriever::{ProvisioningError, ProvisioningResult, QueueUrlRetriever};
pub use scheduler::{SchedulerError, SchedulerResult, SchedulerTransport};
pub use serializer::{MessageSerializer, SerializationError, SerializationResult};
