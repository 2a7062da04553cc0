//! # In-Memory Messaging Hub
//!
//! Process-local transport shared by every node of a test or demo. Each
//! peer has one FIFO mailbox. Peers can be marked unreachable to simulate
//! delivery failure.

use crate::domain::BridgeError;
use crate::ports::MessagingService;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::PeerIdentity;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
pub struct InMemoryMessagingHub {
    mailboxes: RwLock<HashMap<PeerIdentity, mpsc::UnboundedSender<Value>>>,
    unreachable: RwLock<HashSet<PeerIdentity>>,
    delivered: AtomicU64,
}

impl InMemoryMessagingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (or resume) delivery to `peer`.
    pub fn set_unreachable(&self, peer: &PeerIdentity, unreachable: bool) {
        let mut set = self.unreachable.write();
        if unreachable {
            set.insert(peer.clone());
        } else {
            set.remove(peer);
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn has_mailbox(&self, peer: &PeerIdentity) -> bool {
        self.mailboxes.read().contains_key(peer)
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingHub {
    async fn post_message(&self, to: &PeerIdentity, message: Value) -> Result<(), BridgeError> {
        if self.unreachable.read().contains(to) {
            return Err(BridgeError::Transport {
                peer: to.clone(),
                reason: "peer unreachable".to_string(),
            });
        }
        let sender = self.mailboxes.read().get(to).cloned();
        let Some(sender) = sender else {
            return Err(BridgeError::Transport {
                peer: to.clone(),
                reason: "no mailbox for peer".to_string(),
            });
        };
        sender.send(message).map_err(|_| BridgeError::Transport {
            peer: to.clone(),
            reason: "mailbox closed".to_string(),
        })?;
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_message(&self, peer: &PeerIdentity) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.mailboxes.write().insert(peer.clone(), tx).is_some() {
            debug!(peer = %peer, "[sc-05] Mailbox replaced");
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fifo_delivery() {
        let hub = InMemoryMessagingHub::new();
        let mut inbox = hub.on_message(&"bob".into());

        for i in 0..3 {
            hub.post_message(&"bob".into(), json!(i)).await.unwrap();
        }
        for i in 0..3 {
            assert_eq!(inbox.recv().await, Some(json!(i)));
        }
        assert_eq!(hub.delivered(), 3);
    }

    #[tokio::test]
    async fn test_unknown_peer_is_transport_failure() {
        let hub = InMemoryMessagingHub::new();
        let err = hub.post_message(&"nobody".into(), json!(1)).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_peer() {
        let hub = InMemoryMessagingHub::new();
        let _inbox = hub.on_message(&"bob".into());
        hub.set_unreachable(&"bob".into(), true);
        assert!(hub.post_message(&"bob".into(), json!(1)).await.is_err());
        hub.set_unreachable(&"bob".into(), false);
        assert!(hub.post_message(&"bob".into(), json!(1)).await.is_ok());
    }
}
