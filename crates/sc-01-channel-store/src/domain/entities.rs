//! # Domain Entities
//!
//! A node's replica of a state channel and the app instances funded from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{hex::Hex, serde_as};
use shared_types::{
    Address, Amount, AppIdentity, AppInstanceId, AppInstanceInfo, Balances, ChannelStatus,
    FreeBalanceInfo, PeerIdentity, StateChannelInfo, StateHash,
};
use std::collections::HashMap;

use super::errors::StoreError;

/// Undedicated collateral, one balance per participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeBalance {
    balances: Balances,
}

impl FreeBalance {
    /// Zero balances for both participants.
    pub fn new(participants: &[PeerIdentity; 2]) -> Self {
        let balances = participants
            .iter()
            .map(|p| (p.clone(), Amount::zero()))
            .collect();
        Self { balances }
    }

    /// Balance of `peer`, zero if unknown.
    pub fn of(&self, peer: &PeerIdentity) -> Amount {
        self.balances.get(peer).copied().unwrap_or_default()
    }

    /// Mutable slot of a participant. `None` for strangers.
    pub fn slot_mut(&mut self, peer: &PeerIdentity) -> Option<&mut Amount> {
        self.balances.get_mut(peer)
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    /// Sum of both balances, `None` on overflow.
    pub fn total(&self) -> Option<Amount> {
        shared_types::sum_balances(&self.balances)
    }
}

/// An installed app instance as held in a channel.
///
/// For a virtual app, each hop channel holds its own copy whose `balances`
/// are keyed by that hop's two participants while `initiator`/`responder`
/// name the end parties.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInstance {
    pub id: AppInstanceId,
    pub app: AppIdentity,
    pub initiator: PeerIdentity,
    pub responder: PeerIdentity,
    pub initiator_deposit: Amount,
    pub responder_deposit: Amount,
    pub timeout: u64,
    pub intermediaries: Vec<PeerIdentity>,

    /// Current application state.
    pub state: Value,
    /// Committed collateral per channel participant.
    pub balances: Balances,
    /// Starts at 1 on install, +1 per committed update.
    pub local_nonce: u64,
    #[serde_as(as = "Hex")]
    pub encoded_state: Vec<u8>,
    pub state_hash: StateHash,
}

impl AppInstance {
    pub fn is_virtual(&self) -> bool {
        !self.intermediaries.is_empty()
    }

    /// The end party opposite `me`, if `me` is an end.
    pub fn counterparty_of(&self, me: &PeerIdentity) -> Option<&PeerIdentity> {
        if *me == self.initiator {
            Some(&self.responder)
        } else if *me == self.responder {
            Some(&self.initiator)
        } else {
            None
        }
    }

    pub fn info(&self) -> AppInstanceInfo {
        AppInstanceInfo {
            id: self.id.clone(),
            app: self.app.clone(),
            initiator: self.initiator.clone(),
            responder: self.responder.clone(),
            initiator_deposit: self.initiator_deposit,
            responder_deposit: self.responder_deposit,
            timeout: self.timeout,
            intermediaries: self.intermediaries.clone(),
        }
    }
}

/// One node's replica of a channel, keyed by its multisig address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChannel {
    pub multisig_address: Address,
    /// Sorted; `participants[0]` is party A.
    pub participants: [PeerIdentity; 2],
    pub free_balance: FreeBalance,
    pub app_instances: HashMap<AppInstanceId, AppInstance>,
    /// +1 per install or uninstall, never per update.
    pub dependency_nonce: u64,
    /// Collateral confirmed on chain for the multisig.
    pub total_deposited: Amount,
    /// Cumulative deposits per participant; only its owner moves an entry.
    #[serde(default)]
    pub deposits: Balances,
    pub status: ChannelStatus,
}

impl StateChannel {
    pub fn new(multisig_address: Address, a: PeerIdentity, b: PeerIdentity) -> Self {
        let mut participants = [a, b];
        participants.sort();
        Self {
            multisig_address,
            free_balance: FreeBalance::new(&participants),
            participants,
            app_instances: HashMap::new(),
            dependency_nonce: 0,
            total_deposited: Amount::zero(),
            deposits: Balances::new(),
            status: ChannelStatus::Open,
        }
    }

    pub fn has_participant(&self, peer: &PeerIdentity) -> bool {
        self.participants.contains(peer)
    }

    /// The other participant.
    pub fn counterparty(&self, me: &PeerIdentity) -> Option<&PeerIdentity> {
        match &self.participants {
            [a, b] if a == me => Some(b),
            [a, b] if b == me => Some(a),
            _ => None,
        }
    }

    /// Everything `peer` deposited so far.
    pub fn deposited_by(&self, peer: &PeerIdentity) -> Amount {
        self.deposits.get(peer).copied().unwrap_or_default()
    }

    /// Fails when the channel was faulted.
    pub fn ensure_open(&self) -> Result<(), StoreError> {
        match &self.status {
            ChannelStatus::Open => Ok(()),
            ChannelStatus::Faulted { reason } => Err(StoreError::ChannelFaulted {
                multisig: self.multisig_address,
                reason: reason.clone(),
            }),
        }
    }

    pub fn app(&self, id: &AppInstanceId) -> Option<&AppInstance> {
        self.app_instances.get(id)
    }

    pub fn app_mut(&mut self, id: &AppInstanceId) -> Option<&mut AppInstance> {
        self.app_instances.get_mut(id)
    }

    /// Sum of every installed app's committed balances.
    pub fn committed_total(&self) -> Option<Amount> {
        self.app_instances
            .values()
            .flat_map(|app| app.balances.values())
            .try_fold(Amount::zero(), |acc, v| acc.checked_add(*v))
    }

    pub fn free_balance_info(&self) -> FreeBalanceInfo {
        FreeBalanceInfo {
            multisig_address: self.multisig_address,
            balances: self.free_balance.balances().clone(),
        }
    }

    pub fn info(&self, me: &PeerIdentity) -> StateChannelInfo {
        let mut app_instance_ids: Vec<AppInstanceId> =
            self.app_instances.keys().cloned().collect();
        app_instance_ids.sort();
        let counterparty = self
            .counterparty(me)
            .cloned()
            .unwrap_or_else(|| self.participants[1].clone());
        StateChannelInfo {
            multisig_address: self.multisig_address,
            participants: self.participants.clone(),
            me: me.clone(),
            counterparty,
            free_balance: self.free_balance.balances().clone(),
            dependency_nonce: self.dependency_nonce,
            app_instance_ids,
            total_deposited: self.total_deposited,
            status: self.status.clone(),
        }
    }
}
