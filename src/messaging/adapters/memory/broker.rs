//! In-process broker implementing the topic, queue, and scheduler ports.

use crate::messaging::{
    domain::{
        ActionAfterCompletion, NotificationAttribute, NotificationEnvelope, QueueArn,
        QueueAttribute, QueueAttributes, QueueUrl, ReceiptHandle, ReceivedMessage, RedrivePolicy,
        STRING_ATTRIBUTE_TYPE, ScheduleName, ScheduleRequest, TopicArn, WireEnvelope,
    },
    ports::{
        PubSubError, PubSubResult, PubSubTransport, QueueError, QueueResult, QueueTransport,
        SchedulerError, SchedulerResult, SchedulerTransport,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Interval between visibility checks while a long poll waits.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Visibility timeout applied when a queue was created without one.
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Thread-safe in-memory stand-in for the pub/sub broker, queue service, and
/// scheduler.
///
/// Topics must be created with [`create_topic`](Self::create_topic) before
/// they can be found. Queues honour the `VisibilityTimeout` and
/// `RedrivePolicy` attributes: a received message stays hidden until it is
/// deleted or its timeout lapses, and a message already received
/// `maxReceiveCount` times moves to the dead-letter queue on its next
/// receive.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<BrokerState>>,
    arrivals: Arc<Notify>,
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: HashMap<String, TopicArn>,
    bindings: HashMap<TopicArn, Vec<QueueUrl>>,
    queues: HashMap<String, StoredQueue>,
    queue_names: HashMap<QueueUrl, String>,
    published: Vec<(TopicArn, WireEnvelope)>,
    schedules: Vec<ScheduleRequest>,
    pending_bind_failures: u32,
    bind_attempts: u32,
}

#[derive(Debug)]
struct StoredQueue {
    url: QueueUrl,
    arn: QueueArn,
    attributes: QueueAttributes,
    messages: VecDeque<StoredMessage>,
}

#[derive(Debug)]
struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
    visible_at: Instant,
    receipt_handle: Option<ReceiptHandle>,
}

impl StoredMessage {
    fn new(body: String) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            body,
            receive_count: 0,
            visible_at: Instant::now(),
            receipt_handle: None,
        }
    }
}

impl StoredQueue {
    fn redrive_policy(&self) -> Option<RedrivePolicy> {
        self.attributes
            .get(&QueueAttribute::RedrivePolicy)
            .and_then(|policy| serde_json::from_str(policy).ok())
    }

    fn visibility_timeout(&self) -> Duration {
        self.attributes
            .get(&QueueAttribute::VisibilityTimeout)
            .and_then(|seconds| seconds.parse().ok())
            .map_or(DEFAULT_VISIBILITY_TIMEOUT, Duration::from_secs)
    }
}

fn poisoned(err: impl ToString) -> std::io::Error {
    std::io::Error::other(err.to_string())
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BrokerState>, std::io::Error> {
        self.state.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BrokerState>, std::io::Error> {
        self.state.write().map_err(poisoned)
    }

    /// Creates a topic with the given broker name, returning its identifier.
    /// Creating an existing topic returns the existing identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PubSubError::Transport`] when the broker state is poisoned.
    pub fn create_topic(&self, name: &str) -> PubSubResult<TopicArn> {
        let mut state = self.write().map_err(PubSubError::transport)?;
        let arn = state
            .topics
            .entry(name.to_owned())
            .or_insert_with(|| TopicArn::new(format!("arn:memory:topic:{name}")))
            .clone();
        Ok(arn)
    }

    /// Makes the next `count` bind attempts fail with a transport error.
    ///
    /// # Errors
    ///
    /// Returns [`PubSubError::Transport`] when the broker state is poisoned.
    pub fn fail_next_binds(&self, count: u32) -> PubSubResult<()> {
        let mut state = self.write().map_err(PubSubError::transport)?;
        state.pending_bind_failures = count;
        Ok(())
    }

    /// Returns how many bind attempts have been made, failed ones included.
    ///
    /// # Errors
    ///
    /// Returns [`PubSubError::Transport`] when the broker state is poisoned.
    pub fn bind_attempts(&self) -> PubSubResult<u32> {
        let state = self.read().map_err(PubSubError::transport)?;
        Ok(state.bind_attempts)
    }

    /// Returns the queues bound to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`PubSubError::Transport`] when the broker state is poisoned.
    pub fn bound_queues(&self, topic_arn: &TopicArn) -> PubSubResult<Vec<QueueUrl>> {
        let state = self.read().map_err(PubSubError::transport)?;
        Ok(state.bindings.get(topic_arn).cloned().unwrap_or_default())
    }

    /// Returns every envelope accepted by [`PubSubTransport::publish`], in
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`PubSubError::Transport`] when the broker state is poisoned.
    pub fn published(&self) -> PubSubResult<Vec<(TopicArn, WireEnvelope)>> {
        let state = self.read().map_err(PubSubError::transport)?;
        Ok(state.published.clone())
    }

    /// Returns the names of all queues, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Transport`] when the broker state is poisoned.
    pub fn queue_names(&self) -> QueueResult<Vec<String>> {
        let state = self.read().map_err(QueueError::transport)?;
        let mut names: Vec<String> = state.queues.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Returns the attributes a queue was created with.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] for an unknown queue name.
    pub fn queue_attributes(&self, name: &str) -> QueueResult<QueueAttributes> {
        let state = self.read().map_err(QueueError::transport)?;
        state
            .queues
            .get(name)
            .map(|queue| queue.attributes.clone())
            .ok_or_else(|| QueueError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Returns how many messages a queue holds, in flight or not.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] for an unknown queue name.
    pub fn queue_depth(&self, name: &str) -> QueueResult<usize> {
        let state = self.read().map_err(QueueError::transport)?;
        state
            .queues
            .get(name)
            .map(|queue| queue.messages.len())
            .ok_or_else(|| QueueError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Returns every registered schedule that has not fired.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Transport`] when the broker state is
    /// poisoned.
    pub fn schedules(&self) -> SchedulerResult<Vec<ScheduleRequest>> {
        let state = self.read().map_err(SchedulerError::transport)?;
        Ok(state.schedules.clone())
    }

    /// Fires every schedule due at or before `now` by publishing its input to
    /// its target topic, returning how many fired.
    ///
    /// Scheduled publishes carry the serialized body only, so consumers see
    /// them without message attributes. A schedule is removed only once its
    /// publish has succeeded, so a failed publish leaves it and every later
    /// due schedule registered for the next call.
    ///
    /// # Errors
    ///
    /// Returns the first [`PubSubError`] raised while publishing.
    pub async fn fire_due_schedules(&self, now: DateTime<Utc>) -> PubSubResult<usize> {
        let due: Vec<ScheduleRequest> = {
            let state = self.read().map_err(PubSubError::transport)?;
            state
                .schedules
                .iter()
                .filter(|schedule| schedule.fire_at <= now)
                .cloned()
                .collect()
        };

        for schedule in &due {
            self.publish(
                &schedule.target.topic_arn,
                &WireEnvelope::new(schedule.target.input.clone()),
            )
            .await?;
            if schedule.action_after_completion == ActionAfterCompletion::Delete {
                let mut state = self.write().map_err(PubSubError::transport)?;
                state.schedules.retain(|pending| {
                    pending.group_name != schedule.group_name || pending.name != schedule.name
                });
            }
        }
        Ok(due.len())
    }

    fn take_visible(&self, queue_url: &QueueUrl, max: usize) -> QueueResult<Vec<ReceivedMessage>> {
        let mut guard = self.write().map_err(QueueError::transport)?;
        let state = &mut *guard;

        let name = state
            .queue_names
            .get(queue_url)
            .cloned()
            .ok_or_else(|| QueueError::UnknownQueue(queue_url.clone()))?;
        let (redrive, visibility) = state
            .queues
            .get(&name)
            .map(|queue| (queue.redrive_policy(), queue.visibility_timeout()))
            .ok_or_else(|| QueueError::UnknownQueue(queue_url.clone()))?;
        let dead_letter = redrive.and_then(|policy| {
            state
                .queues
                .iter()
                .find(|(_, queue)| queue.arn == policy.dead_letter_target_arn)
                .map(|(dead_letter_name, _)| (dead_letter_name.clone(), policy.max_receive_count))
        });

        let queue = state
            .queues
            .get_mut(&name)
            .ok_or_else(|| QueueError::UnknownQueue(queue_url.clone()))?;
        let now = Instant::now();
        let mut batch = Vec::new();
        let mut exhausted = Vec::new();
        let mut index = 0;
        while index < queue.messages.len() && batch.len() < max {
            let Some(message) = queue.messages.get_mut(index) else {
                break;
            };
            if message.visible_at > now {
                index += 1;
                continue;
            }
            if dead_letter
                .as_ref()
                .is_some_and(|(_, max_receive_count)| message.receive_count >= *max_receive_count)
            {
                exhausted.extend(queue.messages.remove(index));
                continue;
            }

            let handle = ReceiptHandle::new(Uuid::new_v4().to_string());
            message.receive_count += 1;
            message.visible_at = now + visibility;
            message.receipt_handle = Some(handle.clone());
            batch.push(ReceivedMessage {
                broker_message_id: message.message_id.clone(),
                receipt_handle: handle,
                body: message.body.clone(),
            });
            index += 1;
        }

        if let Some((dead_letter_name, _)) = dead_letter
            && !exhausted.is_empty()
            && let Some(dead_letter_queue) = state.queues.get_mut(&dead_letter_name)
        {
            debug!(
                queue = %name,
                dead_letter_queue = %dead_letter_name,
                count = exhausted.len(),
                "redriving exhausted messages"
            );
            dead_letter_queue
                .messages
                .extend(exhausted.into_iter().map(|message| StoredMessage {
                    receive_count: 0,
                    visible_at: now,
                    receipt_handle: None,
                    ..message
                }));
            self.arrivals.notify_waiters();
        }

        Ok(batch)
    }
}

#[async_trait]
impl PubSubTransport for InMemoryBroker {
    async fn publish(&self, topic_arn: &TopicArn, envelope: &WireEnvelope) -> PubSubResult<()> {
        let mut guard = self.write().map_err(PubSubError::transport)?;
        let state = &mut *guard;
        if !state.topics.values().any(|arn| arn == topic_arn) {
            return Err(PubSubError::TopicNotFound(topic_arn.clone()));
        }

        let message_attributes = (!envelope.attributes.is_empty()).then(|| {
            envelope
                .attributes
                .iter()
                .map(|(name, value)| (name.clone(), NotificationAttribute::string(value.clone())))
                .collect::<BTreeMap<_, _>>()
        });
        let notification = NotificationEnvelope {
            r#type: "Notification".to_owned(),
            message_id: Uuid::new_v4().to_string(),
            topic_arn: topic_arn.to_string(),
            message: envelope.body.clone(),
            timestamp: Utc::now().to_rfc3339(),
            message_attributes,
        };
        let body = serde_json::to_string(&notification).map_err(PubSubError::transport)?;

        let bound = state.bindings.get(topic_arn).cloned().unwrap_or_default();
        for queue_url in &bound {
            let queue = state
                .queue_names
                .get(queue_url)
                .and_then(|name| state.queues.get_mut(name));
            if let Some(queue) = queue {
                queue.messages.push_back(StoredMessage::new(body.clone()));
            }
        }
        state.published.push((topic_arn.clone(), envelope.clone()));
        drop(guard);

        debug!(topic_arn = %topic_arn, fan_out = bound.len(), "published notification");
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn find_topic(&self, name: &str) -> PubSubResult<Option<TopicArn>> {
        let state = self.read().map_err(PubSubError::transport)?;
        Ok(state.topics.get(name).cloned())
    }

    async fn bind_queue(&self, topic_arn: &TopicArn, queue_url: &QueueUrl) -> PubSubResult<()> {
        let mut state = self.write().map_err(PubSubError::transport)?;
        state.bind_attempts += 1;
        if state.pending_bind_failures > 0 {
            state.pending_bind_failures -= 1;
            return Err(PubSubError::transport(std::io::Error::other(format!(
                "queue {queue_url} is not yet visible to topic {topic_arn}"
            ))));
        }
        if !state.topics.values().any(|arn| arn == topic_arn) {
            return Err(PubSubError::TopicNotFound(topic_arn.clone()));
        }
        if !state.queue_names.contains_key(queue_url) {
            return Err(PubSubError::QueueNotFound(queue_url.clone()));
        }

        let bound = state.bindings.entry(topic_arn.clone()).or_default();
        if !bound.contains(queue_url) {
            bound.push(queue_url.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl QueueTransport for InMemoryBroker {
    async fn create_queue(
        &self,
        name: &str,
        attributes: &QueueAttributes,
    ) -> QueueResult<QueueUrl> {
        let mut guard = self.write().map_err(QueueError::transport)?;
        let state = &mut *guard;
        if let Some(existing) = state.queues.get(name) {
            return Ok(existing.url.clone());
        }

        let url = QueueUrl::new(format!("memory://queues/{name}"));
        let queue = StoredQueue {
            url: url.clone(),
            arn: QueueArn::new(format!("arn:memory:queue:{name}")),
            attributes: attributes.clone(),
            messages: VecDeque::new(),
        };
        state.queues.insert(name.to_owned(), queue);
        state.queue_names.insert(url.clone(), name.to_owned());
        Ok(url)
    }

    async fn get_queue_url(&self, name: &str) -> QueueResult<QueueUrl> {
        let state = self.read().map_err(QueueError::transport)?;
        state
            .queues
            .get(name)
            .map(|queue| queue.url.clone())
            .ok_or_else(|| QueueError::NotFound {
                name: name.to_owned(),
            })
    }

    async fn get_queue_attribute(
        &self,
        queue_url: &QueueUrl,
        attribute: QueueAttribute,
    ) -> QueueResult<String> {
        let state = self.read().map_err(QueueError::transport)?;
        let queue = state
            .queue_names
            .get(queue_url)
            .and_then(|name| state.queues.get(name))
            .ok_or_else(|| QueueError::UnknownQueue(queue_url.clone()))?;

        match attribute {
            QueueAttribute::QueueArn => Ok(queue.arn.to_string()),
            other => queue
                .attributes
                .get(&other)
                .cloned()
                .ok_or_else(|| QueueError::MissingAttribute {
                    queue_url: queue_url.clone(),
                    attribute: other,
                }),
        }
    }

    async fn receive(
        &self,
        queue_url: &QueueUrl,
        max_messages: u32,
        wait_seconds: u32,
        cancellation: &CancellationToken,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        let max = usize::try_from(max_messages).unwrap_or(usize::MAX);
        let deadline = Instant::now() + Duration::from_secs(u64::from(wait_seconds));
        loop {
            let arrivals = self.arrivals.notified();
            let batch = self.take_visible(queue_url, max)?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let pause = (deadline - now).min(POLL_INTERVAL);
            tokio::select! {
                () = cancellation.cancelled() => return Ok(Vec::new()),
                () = arrivals => {}
                () = tokio::time::sleep(pause) => {}
            }
        }
    }

    async fn delete_batch(
        &self,
        queue_url: &QueueUrl,
        receipt_handles: &[ReceiptHandle],
    ) -> QueueResult<()> {
        let mut guard = self.write().map_err(QueueError::transport)?;
        let state = &mut *guard;
        let queue = state
            .queue_names
            .get(queue_url)
            .and_then(|name| state.queues.get_mut(name))
            .ok_or_else(|| QueueError::UnknownQueue(queue_url.clone()))?;

        queue.messages.retain(|message| {
            message
                .receipt_handle
                .as_ref()
                .is_none_or(|handle| !receipt_handles.contains(handle))
        });
        Ok(())
    }
}

#[async_trait]
impl SchedulerTransport for InMemoryBroker {
    async fn create_one_shot_schedule(
        &self,
        request: &ScheduleRequest,
    ) -> SchedulerResult<ScheduleName> {
        let mut state = self.write().map_err(SchedulerError::transport)?;
        let duplicate = state.schedules.iter().any(|schedule| {
            schedule.group_name == request.group_name && schedule.name == request.name
        });
        if duplicate {
            return Err(SchedulerError::Conflict(request.name.clone()));
        }

        state.schedules.push(request.clone());
        Ok(request.name.clone())
    }
}
