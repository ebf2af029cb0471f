//! Tests for supervised consumption loops.

use super::mocks::{FixedClock, MockRetriever, ScriptedQueue, delivery};
use crate::messaging::{
    adapters::JsonSerializer,
    config::MessagingConfig,
    domain::{
        Environment, Message, QueueUrl, ReceiptHandle, ReceivedMessage, Subscription, Topic,
    },
    ports::{ProvisioningError, QueueError},
    services::{
        HandlerError, HandlerResult, LoopKey, LoopKind, MessageSubscriber, MessagingEvent,
        MessagingEvents, ProcessingError, SubscriberError,
    },
};
use rstest::{fixture, rstest};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct OrderPlaced {
    id: u32,
}

type Subscriber = MessageSubscriber<ScriptedQueue, MockRetriever, JsonSerializer, FixedClock>;

#[fixture]
fn subscription() -> Subscription {
    let topic = Topic::new("shop", "order-placed", 1).expect("valid topic");
    Subscription::new(topic, "billing", "invoicer").expect("valid subscription")
}

fn retriever(expected_calls: usize) -> MockRetriever {
    let mut retriever = MockRetriever::new();
    retriever
        .expect_get_or_create_queue()
        .times(expected_calls)
        .returning(|_| Ok(QueueUrl::new("scripted://orders")));
    retriever
        .expect_dead_letter_queue_url()
        .returning(|_| Ok(QueueUrl::new("scripted://orders_dl")));
    retriever
}

fn subscriber(
    queue: &Arc<ScriptedQueue>,
    retriever: MockRetriever,
    events: &MessagingEvents,
) -> Subscriber {
    let environment = Environment::new("dev").expect("valid environment");
    MessageSubscriber::new(
        Arc::clone(queue),
        Arc::new(retriever),
        Arc::new(JsonSerializer::new()),
        Arc::new(FixedClock::at(2026, 7, 8, 9, 10, 11)),
        Arc::new(MessagingConfig::new(environment)),
        events.clone(),
    )
}

fn order(handle: &str, id: u32) -> ReceivedMessage {
    delivery(handle, &format!("{{\"id\":{id}}}"), &[])
}

fn recording_handler(
    seen: &Arc<Mutex<Vec<u32>>>,
) -> impl Fn(Message<OrderPlaced>) -> std::future::Ready<HandlerResult> + Send + Sync + 'static {
    let seen = Arc::clone(seen);
    move |message| {
        seen.lock().expect("seen lock").push(message.body().id);
        std::future::ready(Ok(()))
    }
}

fn drain_events(receiver: &mut broadcast::Receiver<MessagingEvent>) -> Vec<MessagingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn exceptions(events: &[MessagingEvent]) -> Vec<Arc<ProcessingError>> {
    events
        .iter()
        .filter_map(|event| match event {
            MessagingEvent::Exception { error, .. } => Some(Arc::clone(error)),
            _ => None,
        })
        .collect()
}

fn received_count(events: &[MessagingEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, MessagingEvent::MessageReceived { .. }))
        .count()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_successfully_handled_messages_are_deleted(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::with_batches([Ok(vec![
        order("handle-1", 1),
        delivery("handle-2", "null", &[]),
        order("handle-3", 3),
    ])]));
    let events = MessagingEvents::default();
    let mut receiver = events.subscribe();
    let subscriber = subscriber(&queue, retriever(1), &events);
    let seen = Arc::new(Mutex::new(Vec::new()));

    subscriber
        .subscribe(subscription, recording_handler(&seen))
        .await
        .expect("subscribe succeeds");
    queue.wait_for_receives(2).await;
    subscriber.shutdown().await.expect("shutdown succeeds");

    assert_eq!(*seen.lock().expect("seen lock"), vec![1, 3]);
    assert_eq!(
        queue.deletes(),
        vec![vec![ReceiptHandle::new("handle-1"), ReceiptHandle::new("handle-3")]]
    );
    let events = drain_events(&mut receiver);
    let errors = exceptions(&events);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].as_ref(), ProcessingError::Deserialization(_)));
    assert_eq!(received_count(&events), 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_handlers_leave_messages_on_the_queue(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::with_batches([Ok(vec![order("handle-1", 1)])]));
    let events = MessagingEvents::default();
    let mut receiver = events.subscribe();
    let subscriber = subscriber(&queue, retriever(1), &events);

    subscriber
        .subscribe(subscription, |_message: Message<OrderPlaced>| async {
            Err::<(), HandlerError>("inventory unavailable".into())
        })
        .await
        .expect("subscribe succeeds");
    queue.wait_for_receives(2).await;
    subscriber.shutdown().await.expect("shutdown succeeds");

    assert!(queue.deletes().is_empty());
    let events = drain_events(&mut receiver);
    let errors = exceptions(&events);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "message handler failed: inventory unavailable");
    assert_eq!(received_count(&events), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handler_panics_are_contained(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::with_batches([
        Ok(vec![order("handle-1", 1)]),
        Ok(vec![order("handle-2", 2)]),
    ]));
    let events = MessagingEvents::default();
    let mut receiver = events.subscribe();
    let subscriber = subscriber(&queue, retriever(1), &events);

    subscriber
        .subscribe(subscription, |message: Message<OrderPlaced>| async move {
            assert_ne!(message.body().id, 1, "order 1 is poisoned");
            Ok::<(), HandlerError>(())
        })
        .await
        .expect("subscribe succeeds");
    queue.wait_for_receives(3).await;
    subscriber.shutdown().await.expect("shutdown succeeds");

    assert_eq!(queue.deletes(), vec![vec![ReceiptHandle::new("handle-2")]]);
    let errors = exceptions(&drain_events(&mut receiver));
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0].as_ref(),
        ProcessingError::HandlerPanicked(message) if message.contains("order 1 is poisoned")
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handlers_panicking_before_returning_a_future_are_contained(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::with_batches([
        Ok(vec![order("handle-1", 1)]),
        Ok(vec![order("handle-2", 2)]),
    ]));
    let events = MessagingEvents::default();
    let mut receiver = events.subscribe();
    let subscriber = subscriber(&queue, retriever(1), &events);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handled = Arc::clone(&seen);

    subscriber
        .subscribe(subscription.clone(), move |message: Message<OrderPlaced>| {
            assert_ne!(message.body().id, 1, "order 1 is poisoned");
            handled.lock().expect("seen lock").push(message.body().id);
            std::future::ready(Ok::<(), HandlerError>(()))
        })
        .await
        .expect("subscribe succeeds");
    queue.wait_for_receives(3).await;

    assert_eq!(
        subscriber.active_subscriptions().expect("registry"),
        vec![LoopKey::new(subscription, LoopKind::Messages)]
    );
    subscriber.shutdown().await.expect("shutdown succeeds");
    assert_eq!(*seen.lock().expect("seen lock"), vec![2]);
    assert_eq!(queue.deletes(), vec![vec![ReceiptHandle::new("handle-2")]]);
    let events = drain_events(&mut receiver);
    let errors = exceptions(&events);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].as_ref(), ProcessingError::HandlerPanicked(_)));
    assert_eq!(received_count(&events), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dead_letter_handlers_panicking_synchronously_are_contained(subscription: Subscription) {
    let poisoned = order("handle-1", 1);
    let poisoned_body = poisoned.body.clone();
    let queue = Arc::new(ScriptedQueue::with_batches([
        Ok(vec![poisoned]),
        Ok(vec![order("handle-2", 2)]),
    ]));
    let events = MessagingEvents::default();
    let mut receiver = events.subscribe();
    let subscriber = subscriber(&queue, retriever(0), &events);
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&bodies);

    subscriber
        .subscribe_to_dead_letters(subscription, move |body: String| {
            assert_ne!(body, poisoned_body, "dead letter 1 is poisoned");
            recorded.lock().expect("bodies lock").push(body);
            std::future::ready(Ok::<(), HandlerError>(()))
        })
        .await
        .expect("dead-letter subscribe succeeds");
    queue.wait_for_receives(3).await;
    subscriber.shutdown().await.expect("shutdown succeeds");

    assert_eq!(bodies.lock().expect("bodies lock").len(), 1);
    assert_eq!(queue.deletes(), vec![vec![ReceiptHandle::new("handle-2")]]);
    let errors = exceptions(&drain_events(&mut receiver));
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].as_ref(), ProcessingError::HandlerPanicked(_)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn receive_failures_are_reported_and_polling_resumes(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::with_batches([
        Err(QueueError::transport(std::io::Error::other("connection reset"))),
        Ok(vec![order("handle-1", 1)]),
    ]));
    let events = MessagingEvents::default();
    let mut receiver = events.subscribe();
    let subscriber = subscriber(&queue, retriever(1), &events);
    let seen = Arc::new(Mutex::new(Vec::new()));

    subscriber
        .subscribe(subscription, recording_handler(&seen))
        .await
        .expect("subscribe succeeds");
    queue.wait_for_receives(3).await;
    subscriber.shutdown().await.expect("shutdown succeeds");

    assert_eq!(*seen.lock().expect("seen lock"), vec![1]);
    let errors = exceptions(&drain_events(&mut receiver));
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].as_ref(), ProcessingError::Receive(_)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dead_letter_loops_receive_raw_bodies(subscription: Subscription) {
    let dead_letter = order("handle-9", 9);
    let raw_body = dead_letter.body.clone();
    let queue = Arc::new(ScriptedQueue::with_batches([Ok(vec![dead_letter])]));
    let events = MessagingEvents::default();
    let subscriber = subscriber(&queue, retriever(0), &events);
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&bodies);

    subscriber
        .subscribe_to_dead_letters(subscription.clone(), move |body: String| {
            recorded.lock().expect("bodies lock").push(body);
            std::future::ready(Ok(()))
        })
        .await
        .expect("dead-letter subscribe succeeds");
    queue.wait_for_receives(2).await;

    assert_eq!(
        subscriber.active_subscriptions().expect("registry"),
        vec![LoopKey::new(subscription, LoopKind::DeadLetters)]
    );
    subscriber.shutdown().await.expect("shutdown succeeds");
    assert_eq!(*bodies.lock().expect("bodies lock"), vec![raw_body]);
    assert_eq!(queue.deletes(), vec![vec![ReceiptHandle::new("handle-9")]]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_subscriptions_are_rejected(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::default());
    let events = MessagingEvents::default();
    let subscriber = subscriber(&queue, retriever(1), &events);
    let seen = Arc::new(Mutex::new(Vec::new()));

    subscriber
        .subscribe(subscription.clone(), recording_handler(&seen))
        .await
        .expect("first subscribe succeeds");
    let second = subscriber
        .subscribe(subscription.clone(), recording_handler(&seen))
        .await;

    assert!(matches!(
        second,
        Err(SubscriberError::AlreadySubscribed { kind: LoopKind::Messages, .. })
    ));
    subscriber.shutdown().await.expect("shutdown succeeds");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unsubscribe_stops_the_loop_and_frees_the_key(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::default());
    let events = MessagingEvents::default();
    let subscriber = subscriber(&queue, retriever(2), &events);
    let seen = Arc::new(Mutex::new(Vec::new()));

    subscriber
        .subscribe(subscription.clone(), recording_handler(&seen))
        .await
        .expect("subscribe succeeds");
    let stopped = subscriber
        .unsubscribe(&subscription)
        .await
        .expect("unsubscribe succeeds");

    assert_eq!(stopped, 1);
    assert!(
        subscriber
            .active_subscriptions()
            .expect("registry")
            .is_empty()
    );
    subscriber
        .subscribe(subscription, recording_handler(&seen))
        .await
        .expect("resubscribe succeeds");
    subscriber.shutdown().await.expect("shutdown succeeds");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shut_down_subscribers_refuse_new_loops(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::default());
    let events = MessagingEvents::default();
    let subscriber = subscriber(&queue, retriever(1), &events);
    let seen = Arc::new(Mutex::new(Vec::new()));
    subscriber
        .subscribe(subscription.clone(), recording_handler(&seen))
        .await
        .expect("subscribe succeeds");

    subscriber.shutdown().await.expect("shutdown succeeds");
    let result = subscriber
        .subscribe(subscription, recording_handler(&seen))
        .await;

    assert!(
        subscriber
            .active_subscriptions()
            .expect("registry")
            .is_empty()
    );
    assert!(matches!(result, Err(SubscriberError::ShutDown)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn provisioning_failures_prevent_the_loop(subscription: Subscription) {
    let queue = Arc::new(ScriptedQueue::default());
    let events = MessagingEvents::default();
    let mut retriever = MockRetriever::new();
    retriever.expect_get_or_create_queue().times(1).returning(|_| {
        Err(ProvisioningError::TopicNotFound {
            name: "dev:shop.order-placed.v1".to_owned(),
        })
    });
    let subscriber = subscriber(&queue, retriever, &events);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let result = subscriber
        .subscribe(subscription, recording_handler(&seen))
        .await;

    assert_eq!(
        result.expect_err("provisioning fails").to_string(),
        "unable to find topic: dev:shop.order-placed.v1"
    );
    assert!(
        subscriber
            .active_subscriptions()
            .expect("registry")
            .is_empty()
    );
    assert_eq!(queue.receive_calls(), 0);
}
