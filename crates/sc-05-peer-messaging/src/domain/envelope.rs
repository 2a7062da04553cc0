//! # Wire Envelope
//!
//! Every protocol exchange between two nodes travels as a JSON
//! [`ProtocolEnvelope`]. Requests carry a tagged [`ProtocolMessage`];
//! responses carry the same `correlation_id` and either a reply or the
//! responder's structured error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{
    Address, Amount, ApiError, AppInstanceId, AppInstanceProposal, Balances, CommitmentSignature,
    PeerIdentity, StateHash,
};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Transport-level wrapper of a protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolEnvelope {
    /// Unique per delivery attempt; used for duplicate suppression.
    pub message_id: Uuid,
    /// Shared by a request and its response.
    pub correlation_id: Uuid,
    pub from: PeerIdentity,
    pub to: PeerIdentity,
    /// Unix seconds at the sender.
    pub timestamp: u64,
    pub body: EnvelopeBody,
}

impl ProtocolEnvelope {
    pub fn request(
        from: PeerIdentity,
        to: PeerIdentity,
        correlation_id: Uuid,
        message: ProtocolMessage,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            correlation_id,
            from,
            to,
            timestamp: now_secs(),
            body: EnvelopeBody::Request(message),
        }
    }

    /// Response to `request`, addressed back to its sender.
    pub fn response(request: &ProtocolEnvelope, response: ProtocolResponse) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            correlation_id: request.correlation_id,
            from: request.to.clone(),
            to: request.from.clone(),
            timestamp: now_secs(),
            body: EnvelopeBody::Response(response),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvelopeBody {
    Request(ProtocolMessage),
    Response(ProtocolResponse),
}

/// Responder's answer to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtocolResponse {
    Ok(ProtocolReply),
    Rejected(ApiError),
}

/// Successful reply payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolReply {
    /// The request was accepted; nothing to countersign.
    Ack,
    /// The responder committed a transition and signed its own commitment.
    Committed(TransitionDigest),
}

/// The responder's view of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDigest {
    pub digest: StateHash,
    pub signature: CommitmentSignature,
}

/// A signed app state transition, as sent by the updating party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub app_instance_id: AppInstanceId,
    pub new_state: Value,
    /// Set when the new state was derived from an action.
    pub action: Option<Value>,
    pub local_nonce: u64,
    pub state_hash: StateHash,
    pub signature: CommitmentSignature,
}

/// Closed set of peer-to-peer protocol messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolMessage {
    #[serde(rename_all = "camelCase")]
    Setup {
        multisig_address: Address,
        owners: [PeerIdentity; 2],
    },
    #[serde(rename_all = "camelCase")]
    Deposit {
        multisig_address: Address,
        amount: Amount,
        signature: CommitmentSignature,
    },
    #[serde(rename_all = "camelCase")]
    ProposeInstall { proposal: AppInstanceProposal },
    #[serde(rename_all = "camelCase")]
    RejectInstall { app_instance_id: AppInstanceId },
    #[serde(rename_all = "camelCase")]
    Install {
        multisig_address: Address,
        app_instance_id: AppInstanceId,
        dependency_nonce: u64,
        signature: CommitmentSignature,
    },
    #[serde(rename_all = "camelCase")]
    UpdateState {
        multisig_address: Address,
        update: StateUpdate,
    },
    #[serde(rename_all = "camelCase")]
    Uninstall {
        multisig_address: Address,
        app_instance_id: AppInstanceId,
        final_balances: Balances,
        dependency_nonce: u64,
        signature: CommitmentSignature,
    },
    #[serde(rename_all = "camelCase")]
    ProposeVirtual { proposal: AppInstanceProposal },
    /// Install the hop between sender and receiver, then continue toward
    /// `toward`.
    #[serde(rename_all = "camelCase")]
    InstallVirtual {
        app_instance_id: AppInstanceId,
        toward: PeerIdentity,
        multisig_address: Address,
        dependency_nonce: u64,
        signature: CommitmentSignature,
    },
    /// End-to-end update, forwarded unchanged by intermediaries.
    #[serde(rename_all = "camelCase")]
    RelayUpdate {
        toward: PeerIdentity,
        update: StateUpdate,
    },
    /// Release the hop between sender and receiver. `None` final balances
    /// refund the committed amounts.
    #[serde(rename_all = "camelCase")]
    UninstallVirtual {
        app_instance_id: AppInstanceId,
        toward: PeerIdentity,
        multisig_address: Address,
        dependency_nonce: u64,
        final_balances: Option<Balances>,
        signature: CommitmentSignature,
    },
}

impl ProtocolMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Setup { .. } => MessageKind::Setup,
            Self::Deposit { .. } => MessageKind::Deposit,
            Self::ProposeInstall { .. } => MessageKind::ProposeInstall,
            Self::RejectInstall { .. } => MessageKind::RejectInstall,
            Self::Install { .. } => MessageKind::Install,
            Self::UpdateState { .. } => MessageKind::UpdateState,
            Self::Uninstall { .. } => MessageKind::Uninstall,
            Self::ProposeVirtual { .. } => MessageKind::ProposeVirtual,
            Self::InstallVirtual { .. } => MessageKind::InstallVirtual,
            Self::RelayUpdate { .. } => MessageKind::RelayUpdate,
            Self::UninstallVirtual { .. } => MessageKind::UninstallVirtual,
        }
    }
}

/// Dispatch key for inbound handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Setup,
    Deposit,
    ProposeInstall,
    RejectInstall,
    Install,
    UpdateState,
    Uninstall,
    ProposeVirtual,
    InstallVirtual,
    RelayUpdate,
    UninstallVirtual,
}

impl MessageKind {
    pub const DIRECT: [MessageKind; 7] = [
        MessageKind::Setup,
        MessageKind::Deposit,
        MessageKind::ProposeInstall,
        MessageKind::RejectInstall,
        MessageKind::Install,
        MessageKind::UpdateState,
        MessageKind::Uninstall,
    ];

    pub const VIRTUAL: [MessageKind; 4] = [
        MessageKind::ProposeVirtual,
        MessageKind::InstallVirtual,
        MessageKind::RelayUpdate,
        MessageKind::UninstallVirtual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Deposit => "deposit",
            Self::ProposeInstall => "propose_install",
            Self::RejectInstall => "reject_install",
            Self::Install => "install",
            Self::UpdateState => "update_state",
            Self::Uninstall => "uninstall",
            Self::ProposeVirtual => "propose_virtual",
            Self::InstallVirtual => "install_virtual",
            Self::RelayUpdate => "relay_update",
            Self::UninstallVirtual => "uninstall_virtual",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
