//! # Shared Bus - Per-Node Event Bus
//!
//! Typed publish/subscribe scoped to one node instance. There is no
//! process-wide emitter: every node owns its bus and hands it to the
//! components that publish protocol events.
//!
//! ```text
//! ┌──────────────┐  publish()  ┌──────────────┐  on(topic)   ┌────────────┐
//! │  Lifecycle / │ ──────────▶ │  Event Bus   │ ───────────▶ │ Listeners  │
//! │  Router      │             │              │  (in order)  └────────────┘
//! └──────────────┘             │              │  subscribe() ┌────────────┐
//!                              │              │ ───────────▶ │  Streams   │
//!                              └──────────────┘              └────────────┘
//! ```
//!
//! ## Delivery
//!
//! - Listeners run synchronously in registration order.
//! - A listener that fails or panics is isolated; later listeners still run.
//! - Subscriptions are async and never block publishing.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{
    ChannelCreatedEvent, DepositEvent, EventFilter, EventTopic, NodeEvent, RejectInstallEvent,
    StateUpdatedEvent, UninstallEvent,
};
pub use publisher::{EventPublisher, InMemoryEventBus, Listener, ListenerError, ListenerId};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
