//! # Node Events
//!
//! Typed notifications a node publishes to its own listeners. Payloads carry
//! the originating request's parameters plus any result data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{
    Address, Amount, AppInstanceId, AppInstanceInfo, AppInstanceProposal, Balances, MethodName,
    MethodResponse, PeerIdentity, StateHash,
};

/// A channel was set up with a counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCreatedEvent {
    pub multisig_address: Address,
    pub owners: [PeerIdentity; 2],
    pub counterparty: PeerIdentity,
}

/// Collateral was added to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositEvent {
    pub multisig_address: Address,
    pub depositor: PeerIdentity,
    pub amount: Amount,
    pub free_balance: Balances,
}

/// A pending proposal was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectInstallEvent {
    pub app_instance_id: AppInstanceId,
    pub rejected_by: PeerIdentity,
}

/// An app instance moved to a new state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdatedEvent {
    pub app_instance_id: AppInstanceId,
    pub new_state: Value,
    /// Present when the update came from a take-action request.
    pub action: Option<Value>,
    pub local_nonce: u64,
    pub state_hash: StateHash,
}

/// An app instance was removed and its collateral released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallEvent {
    pub app_instance_id: AppInstanceId,
    pub final_balances: Balances,
    pub free_balance: Balances,
}

/// All events that can be published on a node's bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeEvent {
    CreateChannel(ChannelCreatedEvent),
    Deposit(DepositEvent),
    ProposeInstall(AppInstanceProposal),
    ProposeInstallVirtual(AppInstanceProposal),
    RejectInstall(RejectInstallEvent),
    Install(AppInstanceInfo),
    InstallVirtual(AppInstanceInfo),
    UpdateState(StateUpdatedEvent),
    Uninstall(UninstallEvent),
    UninstallVirtual(UninstallEvent),

    /// A channel was marked faulted after its replicas diverged.
    ProtocolFault {
        multisig_address: Address,
        reason: String,
    },

    /// Response of a request submitted with `emit_request`.
    MethodCompleted(MethodResponse),
}

impl NodeEvent {
    /// Get the topic for this event.
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::CreateChannel(_) => EventTopic::CreateChannel,
            Self::Deposit(_) => EventTopic::Deposit,
            Self::ProposeInstall(_) => EventTopic::ProposeInstall,
            Self::ProposeInstallVirtual(_) => EventTopic::ProposeInstallVirtual,
            Self::RejectInstall(_) => EventTopic::RejectInstall,
            Self::Install(_) => EventTopic::Install,
            Self::InstallVirtual(_) => EventTopic::InstallVirtual,
            Self::UpdateState(_) => EventTopic::UpdateState,
            Self::Uninstall(_) => EventTopic::Uninstall,
            Self::UninstallVirtual(_) => EventTopic::UninstallVirtual,
            Self::ProtocolFault { .. } => EventTopic::ProtocolFault,
            Self::MethodCompleted(response) => EventTopic::Method(response.method),
        }
    }
}

/// Event topics for filtering and listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    CreateChannel,
    Deposit,
    ProposeInstall,
    ProposeInstallVirtual,
    RejectInstall,
    Install,
    InstallVirtual,
    UpdateState,
    Uninstall,
    UninstallVirtual,
    ProtocolFault,
    /// Completion of an emitted request of the given method.
    Method(MethodName),
    /// All events.
    All,
}

impl EventTopic {
    /// True when an event on `topic` should reach a listener on `self`.
    pub fn covers(&self, topic: &EventTopic) -> bool {
        *self == EventTopic::All || self == topic
    }
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &NodeEvent) -> bool {
        let topic = event.topic();
        self.topics.is_empty() || self.topics.iter().any(|t| t.covers(&topic))
    }
}
