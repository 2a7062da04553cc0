//! # Channel Context
//!
//! Everything one node's protocol components share: identity, channel
//! store, collateral bookkeeping, collaborators, bridge and event bus.
//! Built once per node by the runtime and handed to the lifecycle manager
//! and the virtual router.

use crate::domain::{Commitment, LifecycleError};
use crate::ports::CommitmentSigner;
use crate::registry::AppRegistry;
use sc_01_channel_store::ChannelStore;
use sc_02_free_balance::{BlockchainClient, FreeBalanceReconciler};
use sc_05_peer_messaging::{MessagingBridge, ProtocolReply, TransitionDigest};
use shared_bus::{EventPublisher, InMemoryEventBus, NodeEvent};
use shared_types::{Address, CommitmentSignature, PeerIdentity, StateHash};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct ChannelContext {
    pub me: PeerIdentity,
    pub store: Arc<ChannelStore>,
    pub reconciler: Arc<FreeBalanceReconciler>,
    pub chain: Arc<dyn BlockchainClient>,
    pub bridge: Arc<MessagingBridge>,
    pub registry: Arc<AppRegistry>,
    pub signer: Arc<dyn CommitmentSigner>,
    pub events: Arc<InMemoryEventBus>,
}

impl ChannelContext {
    /// Digest of `commitment` and this node's signature over it.
    pub fn sign(
        &self,
        commitment: &Commitment,
    ) -> Result<(StateHash, CommitmentSignature), LifecycleError> {
        let digest = commitment.digest()?;
        Ok((digest, self.signer.sign(&digest)))
    }

    /// Check that `signer` signed `commitment`. Returns the digest.
    pub fn verify(
        &self,
        signer: &PeerIdentity,
        commitment: &Commitment,
        signature: &CommitmentSignature,
    ) -> Result<StateHash, LifecycleError> {
        let digest = commitment.digest()?;
        if !self.signer.verify(signer, &digest, signature) {
            return Err(LifecycleError::InvalidSignature(signer.clone()));
        }
        Ok(digest)
    }

    /// Reply carrying this node's countersignature.
    pub fn countersign(&self, digest: StateHash) -> ProtocolReply {
        ProtocolReply::Committed(TransitionDigest {
            digest,
            signature: self.signer.sign(&digest),
        })
    }

    /// The counterparty must have committed exactly `expected` and signed it.
    pub fn check_countersignature(
        &self,
        counterparty: &PeerIdentity,
        expected: &StateHash,
        reply: &ProtocolReply,
    ) -> Result<(), String> {
        match reply {
            ProtocolReply::Committed(TransitionDigest { digest, signature }) => {
                if digest != expected {
                    return Err(format!(
                        "{counterparty} committed digest {digest:?}, expected {expected:?}"
                    ));
                }
                if !self.signer.verify(counterparty, digest, signature) {
                    return Err(format!("{counterparty} countersignature does not verify"));
                }
                Ok(())
            }
            ProtocolReply::Ack => Err(format!("{counterparty} did not countersign")),
        }
    }

    pub async fn publish(&self, event: NodeEvent) {
        self.events.publish(event).await;
    }

    /// Fault a channel whose replicas diverged and announce it.
    pub async fn fault(&self, multisig: &Address, reason: impl Into<String>) -> LifecycleError {
        let reason = reason.into();
        error!(multisig = ?multisig, reason = %reason, "[sc-03] Replicas diverged, faulting channel");
        if let Err(e) = self.store.mark_faulted(multisig, &reason) {
            error!(multisig = ?multisig, error = %e, "[sc-03] Could not persist fault");
        }
        self.publish(NodeEvent::ProtocolFault {
            multisig_address: *multisig,
            reason: reason.clone(),
        })
        .await;
        LifecycleError::Consistency(reason)
    }

    /// Local commit after the counterparty already committed. Any failure
    /// here leaves the replicas diverged and faults the channel.
    pub async fn settle_commit<T>(
        &self,
        multisig: &Address,
        result: Result<T, LifecycleError>,
    ) -> Result<T, LifecycleError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self
                .fault(multisig, format!("local commit failed after counterparty committed: {e}"))
                .await),
        }
    }
}
