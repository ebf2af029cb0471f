//! Redelivery limits and dead-letter consumption.

use super::helpers::{Greeting, MessagingStack, config, next_within, subscription, topic};
use rstest::rstest;
use switchyard::messaging::{
    MessagingConfig,
    domain::{MESSAGE_ID_ATTRIBUTE, Message, NotificationEnvelope, Subscription, Topic},
    services::{HandlerError, HandlerResult, MessagingEvent, ProcessingError},
};
use tokio::sync::mpsc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeatedly_failing_messages_are_dead_lettered(
    config: MessagingConfig,
    topic: Topic,
    subscription: Subscription,
) {
    let stack = MessagingStack::new(
        config
            .with_visibility_timeout_seconds(0)
            .with_dead_letter_after_attempts(2),
    );
    stack.create_topic(&topic);
    let mut events = stack.events.subscribe();
    stack
        .subscriber
        .subscribe(subscription.clone(), |_message: Message<Greeting>| async {
            Err::<(), HandlerError>("greeting rejected".into())
        })
        .await
        .expect("subscribe succeeds");
    let (sender, mut dead_letters) = mpsc::unbounded_channel();
    stack
        .subscriber
        .subscribe_to_dead_letters(subscription.clone(), move |body: String| {
            let result: HandlerResult = sender.send(body).map_err(|err| err.to_string().into());
            std::future::ready(result)
        })
        .await
        .expect("dead-letter subscribe succeeds");

    let message = Message::new(topic, Greeting::new("poison"));
    stack
        .publisher
        .publish(&message)
        .await
        .expect("publish succeeds");
    let body = next_within(&mut dead_letters).await;
    stack
        .subscriber
        .shutdown()
        .await
        .expect("shutdown succeeds");

    let notification: NotificationEnvelope =
        serde_json::from_str(&body).expect("dead letter is a notification");
    assert_eq!(
        notification.attribute(MESSAGE_ID_ATTRIBUTE),
        Some(message.message_id().as_str())
    );
    assert_eq!(notification.message, r#"{"data":"poison"}"#);
    let queue_name = subscription.queue_name(stack.config.environment());
    let dead_letter_name = subscription.dead_letter_queue_name(stack.config.environment());
    assert_eq!(stack.broker.queue_depth(&queue_name).expect("depth"), 0);
    assert_eq!(stack.broker.queue_depth(&dead_letter_name).expect("depth"), 0);

    let mut handler_failures = 0;
    while let Ok(event) = events.try_recv() {
        if let MessagingEvent::Exception { error, .. } = event
            && matches!(error.as_ref(), ProcessingError::Handler(_))
        {
            handler_failures += 1;
        }
    }
    assert_eq!(handler_failures, 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dead_letter_subscription_requires_provisioned_queues(
    config: MessagingConfig,
    topic: Topic,
    subscription: Subscription,
) {
    let stack = MessagingStack::new(config);
    stack.create_topic(&topic);

    let result = stack
        .subscriber
        .subscribe_to_dead_letters(subscription, |_body: String| {
            std::future::ready(Ok::<(), HandlerError>(()))
        })
        .await;

    assert!(result.is_err());
    assert!(
        stack
            .subscriber
            .active_subscriptions()
            .expect("registry")
            .is_empty()
    );
}
