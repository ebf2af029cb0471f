//! Supervised consumption loops for subscriptions and their dead-letter
//! queues.

use super::{DeserializationError, MessageMapper, MessagingEvent, MessagingEvents};
use crate::messaging::{
    config::MessagingConfig,
    domain::{Message, QueueUrl, ReceiptHandle, ReceivedMessage, Subscription},
    ports::{MessageSerializer, ProvisioningError, QueueError, QueueTransport, QueueUrlRetriever},
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use mockable::Clock;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a failed receive or delete before the loop polls again.
pub const LOOP_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Error type handlers return to reject a message.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by message handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Result type for subscriber operations.
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// A failure inside a running consumption loop, reported through
/// [`MessagingEvent::Exception`].
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The delivery could not be decoded.
    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    /// The handler returned an error.
    #[error("message handler failed: {0}")]
    Handler(Arc<dyn std::error::Error + Send + Sync>),

    /// The handler panicked.
    #[error("message handler panicked: {0}")]
    HandlerPanicked(String),

    /// Polling the queue failed.
    #[error("failed to receive messages: {0}")]
    Receive(#[source] QueueError),

    /// Deleting processed messages failed.
    #[error("failed to delete processed messages: {0}")]
    Delete(#[source] QueueError),
}

/// Which queue of a subscription a loop consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    /// The subscription's primary queue, delivering typed messages.
    Messages,
    /// The subscription's dead-letter queue, delivering raw bodies.
    DeadLetters,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Messages => "messages",
            Self::DeadLetters => "dead letters",
        })
    }
}

/// Identity of one supervised loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoopKey {
    subscription: Subscription,
    kind: LoopKind,
}

impl LoopKey {
    /// Creates a loop key.
    #[must_use]
    pub const fn new(subscription: Subscription, kind: LoopKind) -> Self {
        Self { subscription, kind }
    }

    /// Returns the subscription the loop serves.
    #[must_use]
    pub const fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Returns which queue the loop consumes.
    #[must_use]
    pub const fn kind(&self) -> LoopKind {
        self.kind
    }
}

/// Errors returned by [`MessageSubscriber`] operations.
#[derive(Debug, Clone, Error)]
pub enum SubscriberError {
    /// The subscription's queue could not be provisioned or found.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// A loop of the same kind is already running for the subscription.
    #[error("{kind} loop for subscription {subscription} is already running")]
    AlreadySubscribed {
        /// Subscription that was requested again.
        subscription: Subscription,
        /// Loop kind that was requested again.
        kind: LoopKind,
    },

    /// The subscriber has been shut down.
    #[error("subscriber has been shut down")]
    ShutDown,

    /// The loop registry is unusable.
    #[error("subscriber registry error: {0}")]
    Registry(Arc<dyn std::error::Error + Send + Sync>),
}

impl SubscriberError {
    fn registry(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Registry(Arc::new(err))
    }
}

struct LoopHandle {
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

/// State shared between the subscriber and its spawned loops.
struct Consumer<Q, S, C>
where
    Q: QueueTransport,
    S: MessageSerializer,
    C: Clock + Send + Sync,
{
    queues: Arc<Q>,
    mapper: MessageMapper<S, C>,
    clock: Arc<C>,
    config: Arc<MessagingConfig>,
    events: MessagingEvents,
}

/// Runs one background consumption loop per subscription.
///
/// Each loop long-polls its queue, hands every delivery to the handler in
/// turn, and deletes the deliveries that were handled successfully in one
/// batch before polling again. Failed deliveries stay on the queue, so the
/// broker redelivers them after the visibility timeout and eventually moves
/// them to the dead-letter queue. Errors inside a loop are reported as
/// [`MessagingEvent::Exception`] and never stop it.
///
/// Dropping the subscriber cancels every loop without waiting; call
/// [`shutdown`](Self::shutdown) to wait for them to finish.
pub struct MessageSubscriber<Q, R, S, C>
where
    Q: QueueTransport,
    R: QueueUrlRetriever,
    S: MessageSerializer,
    C: Clock + Send + Sync,
{
    consumer: Arc<Consumer<Q, S, C>>,
    retriever: Arc<R>,
    loops: Mutex<HashMap<LoopKey, LoopHandle>>,
    shutdown: CancellationToken,
}

impl<Q, R, S, C> MessageSubscriber<Q, R, S, C>
where
    Q: QueueTransport + 'static,
    R: QueueUrlRetriever,
    S: MessageSerializer + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a subscriber with no running loops.
    #[must_use]
    pub fn new(
        queues: Arc<Q>,
        retriever: Arc<R>,
        serializer: Arc<S>,
        clock: Arc<C>,
        config: Arc<MessagingConfig>,
        events: MessagingEvents,
    ) -> Self {
        let mapper = MessageMapper::new(serializer, Arc::clone(&clock), Arc::clone(&config));
        Self {
            consumer: Arc::new(Consumer {
                queues,
                mapper,
                clock,
                config,
                events,
            }),
            retriever,
            loops: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Provisions the subscription's queue if needed and starts a loop
    /// delivering typed messages to `handler`.
    ///
    /// Returns once the loop has been spawned.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Provisioning`] when the queue cannot be
    /// provisioned, [`SubscriberError::AlreadySubscribed`] when a message
    /// loop already runs for the subscription, and
    /// [`SubscriberError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub async fn subscribe<T, F, Fut>(
        &self,
        subscription: Subscription,
        handler: F,
    ) -> SubscriberResult<()>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(Message<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let key = LoopKey::new(subscription, LoopKind::Messages);
        self.ensure_available(&key)?;
        let queue_url = self
            .retriever
            .get_or_create_queue(key.subscription())
            .await?;

        let handler = Arc::new(handler);
        let consumer = Arc::clone(&self.consumer);
        let subscription = key.subscription().clone();
        self.spawn_loop(key, queue_url, move |delivery| {
            let consumer = Arc::clone(&consumer);
            let handler = Arc::clone(&handler);
            let subscription = subscription.clone();
            async move {
                consumer
                    .handle_message::<T, F, Fut>(&subscription, handler.as_ref(), delivery)
                    .await
            }
        })
    }

    /// Starts a loop delivering the raw bodies of the subscription's
    /// dead-letter queue to `handler`.
    ///
    /// A body is deleted from the dead-letter queue only when the handler
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Provisioning`] when the dead-letter queue
    /// does not exist, [`SubscriberError::AlreadySubscribed`] when a
    /// dead-letter loop already runs for the subscription, and
    /// [`SubscriberError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub async fn subscribe_to_dead_letters<F, Fut>(
        &self,
        subscription: Subscription,
        handler: F,
    ) -> SubscriberResult<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let key = LoopKey::new(subscription, LoopKind::DeadLetters);
        self.ensure_available(&key)?;
        let queue_url = self
            .retriever
            .dead_letter_queue_url(key.subscription())
            .await?;

        let handler = Arc::new(handler);
        let consumer = Arc::clone(&self.consumer);
        let subscription = key.subscription().clone();
        self.spawn_loop(key, queue_url, move |delivery| {
            let consumer = Arc::clone(&consumer);
            let handler = Arc::clone(&handler);
            let subscription = subscription.clone();
            async move {
                consumer
                    .handle_dead_letter(&subscription, handler.as_ref(), delivery)
                    .await
            }
        })
    }

    /// Stops every loop of `subscription` and waits for them to finish,
    /// returning how many were stopped.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Registry`] when the loop registry is
    /// poisoned.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> SubscriberResult<usize> {
        let stopped: Vec<(LoopKey, LoopHandle)> = {
            let mut loops = self.lock_loops()?;
            [LoopKind::Messages, LoopKind::DeadLetters]
                .into_iter()
                .filter_map(|kind| {
                    let key = LoopKey::new(subscription.clone(), kind);
                    loops.remove(&key).map(|handle| (key, handle))
                })
                .collect()
        };

        let count = stopped.len();
        drain(stopped).await;
        Ok(count)
    }

    /// Cancels every loop and waits for all of them to finish.
    ///
    /// The subscriber accepts no further subscriptions afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Registry`] when the loop registry is
    /// poisoned.
    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.shutdown.cancel();
        let stopped: Vec<(LoopKey, LoopHandle)> = self.lock_loops()?.drain().collect();
        info!(loops = stopped.len(), "shutting down subscriber");
        drain(stopped).await;
        Ok(())
    }

    /// Returns the keys of all loops still running.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Registry`] when the loop registry is
    /// poisoned.
    pub fn active_subscriptions(&self) -> SubscriberResult<Vec<LoopKey>> {
        let mut loops = self.lock_loops()?;
        loops.retain(|_, handle| !handle.task.is_finished());
        Ok(loops.keys().cloned().collect())
    }

    fn lock_loops(&self) -> SubscriberResult<MutexGuard<'_, HashMap<LoopKey, LoopHandle>>> {
        self.loops
            .lock()
            .map_err(|err| SubscriberError::registry(std::io::Error::other(err.to_string())))
    }

    fn ensure_available(&self, key: &LoopKey) -> SubscriberResult<()> {
        let mut loops = self.lock_loops()?;
        self.check_available(&mut loops, key)
    }

    fn check_available(
        &self,
        loops: &mut HashMap<LoopKey, LoopHandle>,
        key: &LoopKey,
    ) -> SubscriberResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(SubscriberError::ShutDown);
        }
        loops.retain(|_, handle| !handle.task.is_finished());
        if loops.contains_key(key) {
            return Err(SubscriberError::AlreadySubscribed {
                subscription: key.subscription().clone(),
                kind: key.kind(),
            });
        }
        Ok(())
    }

    fn spawn_loop<P, Fut>(
        &self,
        key: LoopKey,
        queue_url: QueueUrl,
        process: P,
    ) -> SubscriberResult<()>
    where
        P: Fn(ReceivedMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut loops = self.lock_loops()?;
        self.check_available(&mut loops, &key)?;

        let cancellation = self.shutdown.child_token();
        let consumer = Arc::clone(&self.consumer);
        let token = cancellation.clone();
        let task = tokio::spawn(consumer.run(key.clone(), queue_url, token, process));
        loops.insert(key, LoopHandle { cancellation, task });
        Ok(())
    }
}

impl<Q, R, S, C> Drop for MessageSubscriber<Q, R, S, C>
where
    Q: QueueTransport,
    R: QueueUrlRetriever,
    S: MessageSerializer,
    C: Clock + Send + Sync,
{
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn drain(stopped: Vec<(LoopKey, LoopHandle)>) {
    for (_, handle) in &stopped {
        handle.cancellation.cancel();
    }
    for (key, handle) in stopped {
        if let Err(err) = handle.task.await {
            warn!(
                subscription = %key.subscription(),
                kind = %key.kind(),
                error = %err,
                "consumption loop ended abnormally"
            );
        }
    }
}

async fn pause(cancellation: &CancellationToken) {
    tokio::select! {
        () = cancellation.cancelled() => {}
        () = tokio::time::sleep(LOOP_ERROR_BACKOFF) => {}
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

impl<Q, S, C> Consumer<Q, S, C>
where
    Q: QueueTransport,
    S: MessageSerializer,
    C: Clock + Send + Sync,
{
    async fn run<P, Fut>(
        self: Arc<Self>,
        key: LoopKey,
        queue_url: QueueUrl,
        cancellation: CancellationToken,
        process: P,
    ) where
        P: Fn(ReceivedMessage) -> Fut,
        Fut: Future<Output = bool>,
    {
        let subscription = key.subscription();
        info!(
            subscription = %subscription,
            kind = %key.kind(),
            queue_url = %queue_url,
            "consumption loop started"
        );

        while !cancellation.is_cancelled() {
            let received = match self
                .queues
                .receive(
                    &queue_url,
                    self.config.max_number_of_messages(),
                    self.config.long_polling_seconds(),
                    &cancellation,
                )
                .await
            {
                Ok(received) => received,
                Err(err) => {
                    warn!(
                        subscription = %subscription,
                        queue_url = %queue_url,
                        error = %err,
                        "receive failed"
                    );
                    self.report(subscription, ProcessingError::Receive(err));
                    pause(&cancellation).await;
                    continue;
                }
            };

            let mut processed: Vec<ReceiptHandle> = Vec::with_capacity(received.len());
            for delivery in received {
                let receipt_handle = delivery.receipt_handle.clone();
                if process(delivery).await {
                    processed.push(receipt_handle);
                }
            }
            if processed.is_empty() {
                continue;
            }

            match self.queues.delete_batch(&queue_url, &processed).await {
                Ok(()) => {
                    debug!(
                        subscription = %subscription,
                        deleted = processed.len(),
                        "deleted processed messages"
                    );
                }
                Err(err) => {
                    warn!(
                        subscription = %subscription,
                        queue_url = %queue_url,
                        error = %err,
                        "batch delete failed"
                    );
                    self.report(subscription, ProcessingError::Delete(err));
                    pause(&cancellation).await;
                }
            }
        }

        info!(subscription = %subscription, kind = %key.kind(), "consumption loop stopped");
    }

    async fn handle_message<T, F, Fut>(
        &self,
        subscription: &Subscription,
        handler: &F,
        delivery: ReceivedMessage,
    ) -> bool
    where
        T: DeserializeOwned,
        F: Fn(Message<T>) -> Fut,
        Fut: Future<Output = HandlerResult>,
    {
        let started = Instant::now();
        let message = match self
            .mapper
            .from_wire_envelope::<T>(subscription.topic(), &delivery)
        {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    subscription = %subscription,
                    broker_message_id = %delivery.broker_message_id,
                    error = %err,
                    "could not decode message"
                );
                self.report(subscription, err.into());
                self.report_received(subscription, None, self.clock.utc(), started);
                return false;
            }
        };

        let published_at = message.published_at();
        let received_at = message.received_at().unwrap_or_else(|| self.clock.utc());
        let message_id = message.message_id().clone();
        let outcome = AssertUnwindSafe(async { handler(message).await })
            .catch_unwind()
            .await;
        let handled = self.settle(subscription, outcome);
        if !handled {
            debug!(
                subscription = %subscription,
                message_id = %message_id,
                "message left for redelivery"
            );
        }
        self.report_received(subscription, published_at, received_at, started);
        handled
    }

    async fn handle_dead_letter<F, Fut>(
        &self,
        subscription: &Subscription,
        handler: &F,
        delivery: ReceivedMessage,
    ) -> bool
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = HandlerResult>,
    {
        let started = Instant::now();
        let received_at = self.clock.utc();
        let outcome = AssertUnwindSafe(async { handler(delivery.body).await })
            .catch_unwind()
            .await;
        let handled = self.settle(subscription, outcome);
        self.report_received(subscription, None, received_at, started);
        handled
    }

    fn settle(
        &self,
        subscription: &Subscription,
        outcome: Result<HandlerResult, Box<dyn Any + Send>>,
    ) -> bool {
        let error = match outcome {
            Ok(Ok(())) => return true,
            Ok(Err(err)) => ProcessingError::Handler(Arc::from(err)),
            Err(payload) => ProcessingError::HandlerPanicked(panic_message(payload.as_ref())),
        };
        warn!(subscription = %subscription, error = %error, "message handler failed");
        self.report(subscription, error);
        false
    }

    fn report_received(
        &self,
        subscription: &Subscription,
        published_at: Option<DateTime<Utc>>,
        received_at: DateTime<Utc>,
        started: Instant,
    ) {
        self.events.emit(MessagingEvent::MessageReceived {
            subscription: subscription.clone(),
            published_at,
            received_at,
            processing_time: started.elapsed(),
        });
    }

    fn report(&self, subscription: &Subscription, error: ProcessingError) {
        self.events.emit(MessagingEvent::Exception {
            subscription: subscription.clone(),
            error: Arc::new(error),
        });
    }
}
