//! Publish-to-handler round trips through the in-memory broker.

use super::helpers::{Greeting, MessagingStack, config, next_within, subscription, topic};
use chrono::{Duration as ChronoDuration, Utc};
use rstest::rstest;
use switchyard::messaging::{
    MessagingConfig,
    domain::{Message, Subscription, Topic},
    services::{HandlerResult, MessagingEvent},
};
use tokio::sync::mpsc;

fn forward_to(
    sender: mpsc::UnboundedSender<Message<Greeting>>,
) -> impl Fn(Message<Greeting>) -> std::future::Ready<HandlerResult> + Send + Sync + 'static {
    move |message| {
        let result: HandlerResult = sender.send(message).map_err(|err| err.to_string().into());
        std::future::ready(result)
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn published_message_reaches_the_handler(
    config: MessagingConfig,
    topic: Topic,
    subscription: Subscription,
) {
    let stack = MessagingStack::new(config);
    stack.create_topic(&topic);
    let (sender, mut receiver) = mpsc::unbounded_channel();
    stack
        .subscriber
        .subscribe(subscription, forward_to(sender))
        .await
        .expect("subscribe succeeds");

    let message =
        Message::new(topic.clone(), Greeting::new("hello")).with_correlation_id("trace-1");
    let published = stack
        .publisher
        .publish(&message)
        .await
        .expect("publish succeeds");
    let received = next_within(&mut receiver).await;
    stack
        .subscriber
        .shutdown()
        .await
        .expect("shutdown succeeds");

    assert_eq!(received.body(), &Greeting::new("hello"));
    assert_eq!(received.message_id(), message.message_id());
    assert_eq!(received.correlation_id(), "trace-1");
    assert_eq!(received.topic(), &topic);
    let published_at = received.published_at().expect("publish time is carried");
    assert_eq!(Some(published_at), published.published_at());
    assert!((Utc::now() - published_at).abs() < ChronoDuration::seconds(1));
    assert!(received.received_at().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handled_messages_are_removed_from_the_queue(
    config: MessagingConfig,
    topic: Topic,
    subscription: Subscription,
) {
    let stack = MessagingStack::new(config);
    stack.create_topic(&topic);
    let queue_name = subscription.queue_name(stack.config.environment());
    let mut events = stack.events.subscribe();
    let (sender, mut receiver) = mpsc::unbounded_channel();
    stack
        .subscriber
        .subscribe(subscription, forward_to(sender))
        .await
        .expect("subscribe succeeds");

    stack
        .publisher
        .publish(&Message::new(topic, Greeting::new("hello")))
        .await
        .expect("publish succeeds");
    next_within(&mut receiver).await;
    stack
        .subscriber
        .shutdown()
        .await
        .expect("shutdown succeeds");

    assert_eq!(stack.broker.queue_depth(&queue_name).expect("depth"), 0);
    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            MessagingEvent::MessagePublished { .. } => "published",
            MessagingEvent::MessageReceived { .. } => "received",
            MessagingEvent::MessageScheduled { .. } => "scheduled",
            MessagingEvent::Exception { .. } => "exception",
        });
    }
    assert_eq!(kinds, vec!["published", "received"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_subscription_gets_its_own_copy(config: MessagingConfig, topic: Topic) {
    let stack = MessagingStack::new(config);
    stack.create_topic(&topic);
    let (first_sender, mut first) = mpsc::unbounded_channel();
    let (second_sender, mut second) = mpsc::unbounded_channel();
    for (process, sender) in [("audit", first_sender), ("notify", second_sender)] {
        let subscription =
            Subscription::new(topic.clone(), "consumer", process).expect("valid subscription");
        stack
            .subscriber
            .subscribe(subscription, forward_to(sender))
            .await
            .expect("subscribe succeeds");
    }

    let message = Message::new(topic, Greeting::new("fan-out"));
    stack
        .publisher
        .publish(&message)
        .await
        .expect("publish succeeds");
    let audited = next_within(&mut first).await;
    let notified = next_within(&mut second).await;
    stack
        .subscriber
        .shutdown()
        .await
        .expect("shutdown succeeds");

    assert_eq!(audited.message_id(), message.message_id());
    assert_eq!(notified.message_id(), message.message_id());
    assert_eq!(
        stack
            .subscriber
            .active_subscriptions()
            .expect("registry")
            .len(),
        0
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn scheduled_messages_arrive_once_fired(
    config: MessagingConfig,
    topic: Topic,
    subscription: Subscription,
) {
    let stack = MessagingStack::new(config.with_scheduler_role_arn("arn:memory:role:scheduler"));
    stack.create_topic(&topic);
    let (sender, mut receiver) = mpsc::unbounded_channel();
    stack
        .subscriber
        .subscribe(subscription, forward_to(sender))
        .await
        .expect("subscribe succeeds");
    let publish_at = Utc::now() + ChronoDuration::minutes(5);

    let message = Message::new(topic, Greeting::new("later"));
    stack
        .publisher
        .schedule(&message, publish_at)
        .await
        .expect("schedule succeeds");
    let fired = stack
        .broker
        .fire_due_schedules(publish_at)
        .await
        .expect("schedule fires");
    let received = next_within(&mut receiver).await;
    stack
        .subscriber
        .shutdown()
        .await
        .expect("shutdown succeeds");

    assert_eq!(fired, 1);
    assert_eq!(received.body(), &Greeting::new("later"));
    assert_ne!(received.message_id(), message.message_id());
    assert_eq!(received.published_at(), None);
}
