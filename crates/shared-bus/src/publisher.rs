//! # Event Publisher
//!
//! Defines the publishing side of the event bus.
//!
//! Publishing first runs the registered listeners synchronously, in
//! registration order, then broadcasts to async subscriptions. A listener
//! that returns an error or panics is logged and skipped; later listeners
//! still receive the event.

use crate::events::{EventFilter, EventTopic, NodeEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Error returned by a listener. It never stops delivery to other listeners.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("listener failed: {0}")]
pub struct ListenerError(pub String);

/// Synchronous event callback.
pub type Listener = Arc<dyn Fn(&NodeEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Handle returned by [`InMemoryEventBus::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// # Returns
    ///
    /// The number of listeners and subscriptions that received the event.
    async fn publish(&self, event: NodeEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory event bus scoped to one node.
///
/// Uses `tokio::sync::broadcast` for async subscriptions and an ordered
/// registry for synchronous listeners.
pub struct InMemoryEventBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<NodeEvent>,

    /// Listeners in registration order.
    listeners: RwLock<Vec<(ListenerId, EventTopic, Listener)>>,

    /// Next listener id.
    next_listener: AtomicU64,

    /// Active subscription count by topic.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Register a listener for a topic. `EventTopic::All` receives everything.
    pub fn on(&self, topic: EventTopic, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, topic, listener));
        debug!(topic = ?topic, listener = id.0, "Listener registered");
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _, _)| *lid != id);
        before != listeners.len()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Subscribe to events matching a filter.
    ///
    /// Returns a `Subscription` handle that can be used to receive events.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = format!("{:?}", filter.topics);

        *self
            .subscriptions
            .write()
            .entry(topic_key.clone())
            .or_insert(0) += 1;

        debug!(topics = ?filter.topics, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_key)
    }

    /// Get a stream of events matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run matching listeners in registration order. Returns how many
    /// completed without error.
    fn notify_listeners(&self, event: &NodeEvent) -> usize {
        let topic = event.topic();
        // Snapshot so listeners may call `on`/`off` without deadlocking.
        let matching: Vec<(ListenerId, Listener)> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, t, _)| t.covers(&topic))
            .map(|(id, _, l)| (*id, l.clone()))
            .collect();

        let mut delivered = 0;
        for (id, listener) in matching {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(topic = ?topic, listener = id.0, error = %e, "Listener returned error");
                }
                Err(_) => {
                    warn!(topic = ?topic, listener = id.0, "Listener panicked");
                }
            }
        }
        delivered
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: NodeEvent) -> usize {
        let topic = event.topic();

        self.events_published.fetch_add(1, Ordering::Relaxed);

        let delivered = self.notify_listeners(&event);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(
                    topic = ?topic,
                    listeners = delivered,
                    receivers = receiver_count,
                    "Event published"
                );
                delivered + receiver_count
            }
            Err(_) => {
                // No subscriptions; listeners may still have run.
                debug!(topic = ?topic, listeners = delivered, "Event published without subscribers");
                delivered
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
