//! # Messaging Bridge Service
//!
//! Turns the opaque transport into correlated request/response calls and
//! routes inbound requests to the component that owns their message kind.

use crate::domain::{
    BridgeError, EnvelopeBody, MessageDedupCache, MessageKind, PendingCalls, ProtocolEnvelope,
    ProtocolMessage, ProtocolReply, ProtocolResponse,
};
use crate::ports::{Direction, InboundHandler, MessageObserver, MessagingService, NoopMessageObserver};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_types::{ApiError, ErrorCode, PeerIdentity};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

pub struct MessagingBridge {
    me: PeerIdentity,
    transport: Arc<dyn MessagingService>,
    handlers: RwLock<HashMap<MessageKind, Arc<dyn InboundHandler>>>,
    pending: PendingCalls,
    dedup: Mutex<MessageDedupCache>,
    observer: Arc<dyn MessageObserver>,
}

impl MessagingBridge {
    pub fn new(me: PeerIdentity, transport: Arc<dyn MessagingService>, dedup_window_secs: u64) -> Self {
        Self {
            me,
            transport,
            handlers: RwLock::new(HashMap::new()),
            pending: PendingCalls::new(),
            dedup: Mutex::new(MessageDedupCache::with_window(dedup_window_secs)),
            observer: Arc::new(NoopMessageObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.me
    }

    pub fn register_handler(&self, kind: MessageKind, handler: Arc<dyn InboundHandler>) {
        self.handlers.write().insert(kind, handler);
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Send `message` to `to` and wait for the correlated response.
    ///
    /// No timeout is applied here.
    pub async fn request(
        &self,
        to: &PeerIdentity,
        message: ProtocolMessage,
    ) -> Result<ProtocolReply, BridgeError> {
        let kind = message.kind();
        let correlation_id = Uuid::new_v4();
        let envelope = ProtocolEnvelope::request(self.me.clone(), to.clone(), correlation_id, message);
        let raw = serde_json::to_value(&envelope).map_err(|e| BridgeError::Codec(e.to_string()))?;

        let rx = self.pending.register(correlation_id);
        self.observer.on_message(kind, Direction::Outbound);
        debug!(peer = %to, kind = %kind, correlation_id = %correlation_id, "[sc-05] Sending request");

        if let Err(e) = self.transport.post_message(to, raw).await {
            self.pending.cancel(&correlation_id);
            warn!(peer = %to, kind = %kind, error = %e, "[sc-05] Delivery failed");
            return Err(e);
        }

        match rx.await {
            Ok(ProtocolResponse::Ok(reply)) => Ok(reply),
            Ok(ProtocolResponse::Rejected(err)) => {
                debug!(peer = %to, kind = %kind, code = %err.code, "[sc-05] Request rejected by peer");
                Err(BridgeError::Rejected(err))
            }
            Err(_) => Err(BridgeError::Closed),
        }
    }

    /// Start pumping this node's mailbox.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let mut inbox = self.transport.on_message(&self.me);
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(raw) = inbox.recv().await {
                bridge.handle_inbound(raw).await;
            }
            debug!(peer = %bridge.me, "[sc-05] Mailbox closed");
        })
    }

    /// Process one raw inbound message. Never fails; bad input is logged
    /// and dropped.
    pub async fn handle_inbound(self: &Arc<Self>, raw: Value) {
        let envelope: ProtocolEnvelope = match serde_json::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(peer = %self.me, error = %e, "[sc-05] Dropping unrecognized message");
                return;
            }
        };

        if envelope.to != self.me {
            warn!(to = %envelope.to, from = %envelope.from, "[sc-05] Dropping misaddressed message");
            return;
        }

        let accepted = self
            .dedup
            .lock()
            .check_and_insert(envelope.message_id, envelope.timestamp);
        if let Err(e) = accepted {
            debug!(from = %envelope.from, error = %e, "[sc-05] Dropping redelivered message");
            return;
        }

        match envelope.body.clone() {
            EnvelopeBody::Response(response) => {
                if !self.pending.complete(envelope.correlation_id, response) {
                    debug!(
                        correlation_id = %envelope.correlation_id,
                        "[sc-05] Response for unknown correlation id"
                    );
                }
            }
            EnvelopeBody::Request(message) => {
                let kind = message.kind();
                let handler = self.handlers.read().get(&kind).cloned();
                let Some(handler) = handler else {
                    warn!(kind = %kind, from = %envelope.from, "[sc-05] No handler registered, dropping");
                    return;
                };
                self.observer.on_message(kind, Direction::Inbound);

                // A handler may itself wait on a downstream peer, so it
                // must not run on the pump. It runs on a task of its own so
                // the requester is answered even if it panics.
                let bridge = Arc::clone(self);
                tokio::spawn(async move {
                    let from = envelope.from.clone();
                    let handled =
                        tokio::spawn(async move { handler.handle(&from, message).await }).await;
                    let response = match handled {
                        Ok(Ok(reply)) => ProtocolResponse::Ok(reply),
                        Ok(Err(err)) => ProtocolResponse::Rejected(err),
                        Err(e) => {
                            error!(kind = %kind, from = %envelope.from, error = %e, "[sc-05] Handler failed");
                            ProtocolResponse::Rejected(ApiError::new(
                                ErrorCode::Internal,
                                format!("{kind} handler failed"),
                            ))
                        }
                    };
                    bridge.respond(&envelope, response).await;
                });
            }
        }
    }

    async fn respond(&self, request: &ProtocolEnvelope, response: ProtocolResponse) {
        let envelope = ProtocolEnvelope::response(request, response);
        let raw = match serde_json::to_value(&envelope) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "[sc-05] Failed to encode response");
                return;
            }
        };
        if let Err(e) = self.transport.post_message(&request.from, raw).await {
            warn!(peer = %request.from, error = %e, "[sc-05] Failed to deliver response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryMessagingHub;
    use async_trait::async_trait;
    use serde_json::json;
    use shared_types::AppInstanceId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InboundHandler for Echo {
        async fn handle(
            &self,
            _from: &PeerIdentity,
            message: ProtocolMessage,
        ) -> Result<ProtocolReply, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match message {
                ProtocolMessage::RejectInstall { app_instance_id } if app_instance_id.is_empty() => {
                    Err(ApiError::new(ErrorCode::NoSuchProposal, "empty id"))
                }
                _ => Ok(ProtocolReply::Ack),
            }
        }
    }

    struct Panicking;

    #[async_trait]
    impl InboundHandler for Panicking {
        async fn handle(
            &self,
            _from: &PeerIdentity,
            _message: ProtocolMessage,
        ) -> Result<ProtocolReply, ApiError> {
            panic!("handler bug");
        }
    }

    fn reject(id: &str) -> ProtocolMessage {
        ProtocolMessage::RejectInstall {
            app_instance_id: AppInstanceId::new(id),
        }
    }

    fn pair() -> (Arc<InMemoryMessagingHub>, Arc<MessagingBridge>, Arc<MessagingBridge>, Arc<Echo>) {
        let hub = Arc::new(InMemoryMessagingHub::new());
        let alice = Arc::new(MessagingBridge::new("alice".into(), hub.clone(), 120));
        let bob = Arc::new(MessagingBridge::new("bob".into(), hub.clone(), 120));
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        bob.register_handler(MessageKind::RejectInstall, echo.clone());
        alice.start();
        bob.start();
        (hub, alice, bob, echo)
    }

    #[tokio::test]
    async fn test_request_resolves_with_reply() {
        let (_hub, alice, _bob, echo) = pair();
        let reply = timeout(Duration::from_millis(500), alice.request(&"bob".into(), reject("a")))
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(reply, ProtocolReply::Ack);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
        assert_eq!(alice.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejection_surfaces_peer_error() {
        let (_hub, alice, _bob, _) = pair();
        let err = timeout(Duration::from_millis(500), alice.request(&"bob".into(), reject("  ")))
            .await
            .expect("timeout")
            .unwrap_err();
        match err {
            BridgeError::Rejected(e) => assert_eq!(e.code, ErrorCode::NoSuchProposal),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panicking_handler_answers_internal() {
        let (_hub, alice, bob, _) = pair();
        bob.register_handler(MessageKind::RejectInstall, Arc::new(Panicking));

        let err = timeout(Duration::from_millis(500), alice.request(&"bob".into(), reject("a")))
            .await
            .expect("timeout")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(alice.pending_calls(), 0);

        // The pump keeps serving once the handler is fixed.
        bob.register_handler(
            MessageKind::RejectInstall,
            Arc::new(Echo {
                calls: AtomicUsize::new(0),
            }),
        );
        let reply = timeout(Duration::from_millis(500), alice.request(&"bob".into(), reject("a")))
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(reply, ProtocolReply::Ack);
    }

    #[tokio::test]
    async fn test_transport_failure_rejects_call() {
        let (hub, alice, _bob, echo) = pair();
        hub.set_unreachable(&"bob".into(), true);
        let err = alice.request(&"bob".into(), reject("a")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TransportFailure);
        assert_eq!(alice.pending_calls(), 0);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_garbage_and_unhandled_kinds_dropped() {
        let (hub, alice, bob, echo) = pair();

        hub.post_message(&"bob".into(), json!({ "type": "TELEPORT" }))
            .await
            .unwrap();
        let unhandled = ProtocolEnvelope::request(
            "alice".into(),
            "bob".into(),
            Uuid::new_v4(),
            ProtocolMessage::ProposeVirtual {
                proposal: serde_json::from_value(json!({
                    "appInstanceId": "v",
                    "app": { "definition": "0x0000000000000000000000000000000000000000",
                             "stateEncoding": "uint256", "actionEncoding": null },
                    "initialState": 0,
                    "initiator": "alice",
                    "responder": "carol",
                    "initiatorDeposit": "0x0",
                    "responderDeposit": "0x0",
                    "timeout": 0,
                    "intermediaries": ["bob"]
                }))
                .unwrap(),
            },
        );
        bob.handle_inbound(serde_json::to_value(&unhandled).unwrap()).await;

        // The node still answers normal traffic.
        let reply = timeout(Duration::from_millis(500), alice.request(&"bob".into(), reject("a")))
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(reply, ProtocolReply::Ack);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_handled_once() {
        let (_hub, _alice, bob, echo) = pair();
        let envelope =
            ProtocolEnvelope::request("alice".into(), "bob".into(), Uuid::new_v4(), reject("a"));
        let raw = serde_json::to_value(&envelope).unwrap();

        bob.handle_inbound(raw.clone()).await;
        bob.handle_inbound(raw).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }
}
