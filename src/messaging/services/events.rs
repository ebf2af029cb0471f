//! Observable messaging events.

use super::ProcessingError;
use crate::messaging::domain::{Subscription, Topic};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Default number of events buffered per receiver.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something the publisher or a consumption loop did.
#[derive(Debug, Clone)]
pub enum MessagingEvent {
    /// The broker accepted a published message.
    MessagePublished {
        /// Topic published to.
        topic: Topic,
        /// Time spent mapping and sending, after topic resolution.
        elapsed: Duration,
    },

    /// The scheduler accepted a delayed publish.
    MessageScheduled {
        /// Topic the message will be published to.
        topic: Topic,
        /// When the message will be published.
        publish_at: DateTime<Utc>,
        /// Time spent mapping and registering, after topic resolution.
        elapsed: Duration,
    },

    /// A consumption loop finished processing one delivery.
    MessageReceived {
        /// Subscription that received the message.
        subscription: Subscription,
        /// Publish time carried by the message, if any.
        published_at: Option<DateTime<Utc>>,
        /// When the message was received.
        received_at: DateTime<Utc>,
        /// Time spent mapping and handling the delivery.
        processing_time: Duration,
    },

    /// A consumption loop hit an error it recovered from.
    Exception {
        /// Subscription whose loop raised the error.
        subscription: Subscription,
        /// The error.
        error: Arc<ProcessingError>,
    },
}

/// Broadcast hub for [`MessagingEvent`]s.
///
/// Emitting never blocks and never fails: with no receivers the event is
/// dropped, and a receiver that falls behind loses its oldest events.
#[derive(Debug, Clone)]
pub struct MessagingEvents {
    sender: broadcast::Sender<MessagingEvent>,
}

impl MessagingEvents {
    /// Creates a hub buffering up to `capacity` events per receiver.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a receiver for events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MessagingEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sends an event to every live receiver.
    pub fn emit(&self, event: MessagingEvent) {
        // Err only means nobody is listening.
        self.sender.send(event).ok();
    }
}

impl Default for MessagingEvents {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}
