//! Shared wiring for in-memory messaging integration tests.

use mockable::DefaultClock;
use rstest::fixture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use switchyard::messaging::{
    MessagingConfig,
    adapters::{InMemoryBroker, JsonSerializer, TokioDelayer},
    domain::{Subscription, Topic, TopicArn},
    services::{
        MessagePublisher, MessageSubscriber, MessagingEvents, QueueProvisioner,
        RetryingTopicBinder, TopicArnCache,
    },
};
use tokio::sync::mpsc;

/// Publisher wired to the in-memory broker.
pub type TestPublisher =
    MessagePublisher<InMemoryBroker, InMemoryBroker, JsonSerializer, DefaultClock>;

/// Provisioner wired to the in-memory broker.
pub type TestProvisioner =
    QueueProvisioner<InMemoryBroker, InMemoryBroker, JsonSerializer, TokioDelayer>;

/// Subscriber wired to the in-memory broker.
pub type TestSubscriber =
    MessageSubscriber<InMemoryBroker, TestProvisioner, JsonSerializer, DefaultClock>;

/// Body used by the round-trip scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Greeting {
    pub data: String,
}

impl Greeting {
    pub fn new(data: &str) -> Self {
        Self {
            data: data.to_owned(),
        }
    }
}

/// Publisher, subscriber, and broker sharing one configuration.
pub struct MessagingStack {
    pub broker: Arc<InMemoryBroker>,
    pub config: Arc<MessagingConfig>,
    pub events: MessagingEvents,
    pub publisher: TestPublisher,
    pub subscriber: TestSubscriber,
}

impl MessagingStack {
    /// Wires every component to a fresh broker.
    pub fn new(config: MessagingConfig) -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        let config = Arc::new(config);
        let events = MessagingEvents::default();
        let serializer = Arc::new(JsonSerializer::new());
        let clock = Arc::new(DefaultClock);
        let topics = Arc::new(TopicArnCache::new(Arc::clone(&broker)));

        let publisher = MessagePublisher::new(
            Arc::clone(&broker),
            Arc::clone(&broker),
            Arc::clone(&topics),
            Arc::clone(&serializer),
            Arc::clone(&clock),
            Arc::clone(&config),
            events.clone(),
        );
        let provisioner = QueueProvisioner::new(
            Arc::clone(&broker),
            topics,
            RetryingTopicBinder::new(Arc::clone(&broker), Arc::new(TokioDelayer::new())),
            Arc::clone(&serializer),
            Arc::clone(&config),
        );
        let subscriber = MessageSubscriber::new(
            Arc::clone(&broker),
            Arc::new(provisioner),
            serializer,
            clock,
            Arc::clone(&config),
            events.clone(),
        );

        Self {
            broker,
            config,
            events,
            publisher,
            subscriber,
        }
    }

    /// Creates `topic` in the broker under this stack's environment.
    pub fn create_topic(&self, topic: &Topic) -> TopicArn {
        self.broker
            .create_topic(&topic.lookup_name(self.config.environment()))
            .expect("topic creation should succeed")
    }
}

/// Configuration with short long polls so loops notice cancellation quickly.
#[fixture]
pub fn config() -> MessagingConfig {
    MessagingConfig::for_environment("dev")
        .expect("valid environment")
        .with_long_polling_seconds(1)
}

/// Topic used by the round-trip scenarios.
#[fixture]
pub fn topic() -> Topic {
    Topic::new("pub", "evt", 1).expect("valid topic")
}

/// Subscription on [`topic`].
#[fixture]
pub fn subscription(topic: Topic) -> Subscription {
    Subscription::new(topic, "consumer", "greeter").expect("valid subscription")
}

/// Waits up to five seconds for the next value on `receiver`.
pub async fn next_within<T>(receiver: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("value should arrive within five seconds")
        .expect("channel should stay open")
}
