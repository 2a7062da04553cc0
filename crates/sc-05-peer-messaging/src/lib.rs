//! # SC-05 Peer Messaging Bridge
//!
//! Correlated request/response between nodes over an opaque, at-least-once
//! transport.
//!
//! **Subsystem ID:** 5
//! **Architecture:** Hexagonal (Domain + Ports/Adapters)
//!
//! ## Flow
//!
//! ```text
//! request(to, msg) ──▶ register(correlation id) ──▶ post_message(to, envelope)
//!                                                          │
//!     inbound pump ◀── on_message(me) ◀────────────────────┘
//!        │
//!        ├── Response ──▶ complete(correlation id)
//!        └── Request  ──▶ handler for MessageKind (own task) ──▶ reply
//! ```
//!
//! Undecodable messages, unknown kinds and redeliveries are logged and
//! dropped; they never stop the pump.

#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryMessagingHub;
pub use domain::{
    BridgeError, DedupError, EnvelopeBody, MessageDedupCache, MessageKind, ProtocolEnvelope,
    ProtocolMessage, ProtocolReply, ProtocolResponse, StateUpdate, TransitionDigest,
};
pub use ports::{Direction, InboundHandler, MessageObserver, MessagingService, NoopMessageObserver};
pub use service::MessagingBridge;
