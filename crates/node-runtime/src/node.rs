//! # Node
//!
//! Caller-facing facade of one state channel node. Owns the wired
//! subsystems and the task pumping the node's mailbox.
//!
//! A node is created over a store, a chain and a transport. Its identity
//! comes from the signing seed in the store, so recreating a node over the
//! same store restores both the identity and the channel snapshots.

use std::sync::Arc;

use anyhow::{Context, Result};
use sc_03_app_lifecycle::{AppDefinition, CommitmentSigner, Ed25519Signer};
use shared_bus::{
    EventFilter, EventStream, EventTopic, Listener, ListenerId, NodeEvent, Subscription,
};
use shared_types::{
    Address, ApiError, ErrorCode, MethodName, MethodParams, MethodRequest, MethodResponse,
    MethodResult, PeerIdentity,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapters::load_or_create_seed;
use crate::container::{ChannelSubsystems, Collaborators, NodeConfig};

pub struct Node {
    identity: PeerIdentity,
    config: NodeConfig,
    subsystems: ChannelSubsystems,
    inbound: JoinHandle<()>,
}

impl Node {
    /// Build a node and start receiving protocol messages.
    ///
    /// ## Startup Sequence
    ///
    /// 1. Validate configuration
    /// 2. Load or create the signing seed
    /// 3. Build and wire the subsystems
    /// 4. Restore channel snapshots
    /// 5. Start the mailbox pump
    pub async fn create(config: NodeConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate().context("invalid node configuration")?;

        let seed = load_or_create_seed(collaborators.store.as_ref(), &config.mnemonic_key())?;
        let signer = Arc::new(Ed25519Signer::from_seed(&seed));
        let identity = signer.identity();

        let subsystems = ChannelSubsystems::new(&config, signer, &collaborators);
        let restored = subsystems
            .store
            .load_snapshots()
            .context("restoring channel snapshots")?;
        let inbound = subsystems.bridge.start();

        info!(peer = %identity, restored, "[sc-node] Node started");
        Ok(Self {
            identity,
            config,
            subsystems,
            inbound,
        })
    }

    /// Public identifier peers address this node by.
    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn subsystems(&self) -> &ChannelSubsystems {
        &self.subsystems
    }

    /// Make an app definition available to this node's channels.
    pub fn register_app(&self, definition: Address, app: Arc<dyn AppDefinition>) {
        self.subsystems.registry.register(definition, app);
    }

    // =========================================================================
    // METHODS
    // =========================================================================

    /// Answer `request` as `method`, bounded by the configured timeout.
    ///
    /// The call runs on its own task. A timed-out call reports
    /// `TRANSPORT_FAILURE` to the caller while the task carries the protocol
    /// exchange on to its local commit, so both replicas still agree once
    /// the counterparty answers.
    pub async fn call(&self, method: MethodName, request: MethodRequest) -> MethodResponse {
        let request_id = request.request_id;
        let dispatcher = Arc::clone(&self.subsystems.dispatcher);
        let mut task = tokio::spawn(async move { dispatcher.call(method, request).await });

        let joined = match self.config.request_timeout {
            None => task.await,
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(method = %method, request_id = %request_id, timeout_ms = limit.as_millis() as u64, "[sc-node] Call timed out, exchange continues in background");
                    return MethodResponse::err(
                        request_id,
                        method,
                        ApiError::new(
                            ErrorCode::TransportFailure,
                            format!("{method} timed out after {limit:?}"),
                        ),
                    );
                }
            },
        };
        joined.unwrap_or_else(|e| {
            error!(method = %method, request_id = %request_id, error = %e, "[sc-node] Call task failed");
            MethodResponse::err(
                request_id,
                method,
                ApiError::new(ErrorCode::Internal, format!("{method} did not complete: {e}")),
            )
        })
    }

    /// [`call`](Self::call) with the method taken from the request.
    pub async fn execute(&self, request: MethodRequest) -> MethodResponse {
        let method = request.method();
        self.call(method, request).await
    }

    /// Build a request from `params`, run it and unwrap the outcome.
    pub async fn request(&self, params: MethodParams) -> Result<MethodResult, ApiError> {
        self.execute(MethodRequest::new(params)).await.into_result()
    }

    /// Fire-and-forget call; the response arrives as a `MethodCompleted`
    /// event on the method's topic. No timeout is applied.
    pub fn emit_request(&self, request: MethodRequest) -> JoinHandle<()> {
        self.subsystems.dispatcher.emit_request(request)
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    pub fn on(&self, topic: EventTopic, listener: Listener) -> ListenerId {
        self.subsystems.dispatcher.on(topic, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.subsystems.dispatcher.off(id)
    }

    pub async fn emit(&self, event: NodeEvent) -> usize {
        self.subsystems.dispatcher.emit(event).await
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.subsystems.dispatcher.subscribe(filter)
    }

    /// Events matching `filter` as an async stream.
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        self.subsystems.event_bus.event_stream(filter)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.inbound.abort();
    }
}
