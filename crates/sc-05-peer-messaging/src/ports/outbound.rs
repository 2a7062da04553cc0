//! # Outbound Ports
//!
//! The opaque peer transport, plus an observer hook for message accounting.

use crate::domain::{BridgeError, MessageKind};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::PeerIdentity;
use tokio::sync::mpsc;

/// Opaque transport between nodes.
///
/// Delivery is at least once. Messages between the same ordered pair of
/// peers arrive in the order they were posted.
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Post `message` to `to`. An error means the transport refused it.
    async fn post_message(&self, to: &PeerIdentity, message: Value) -> Result<(), BridgeError>;

    /// Mailbox of messages addressed to `peer`. A later call replaces the
    /// earlier mailbox.
    fn on_message(&self, peer: &PeerIdentity) -> mpsc::UnboundedReceiver<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Notified for every protocol request that crosses the bridge.
pub trait MessageObserver: Send + Sync {
    fn on_message(&self, kind: MessageKind, direction: Direction);
}

/// Observer that records nothing.
pub struct NoopMessageObserver;

impl MessageObserver for NoopMessageObserver {
    fn on_message(&self, _kind: MessageKind, _direction: Direction) {}
}
