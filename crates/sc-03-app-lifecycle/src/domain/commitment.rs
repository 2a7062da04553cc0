//! # Commitments
//!
//! The digest both parties sign for every structural or state transition.
//! Fields are serialized with `bincode` (deterministic: balances are a
//! `BTreeMap`) and hashed with Keccak-256.
//!
//! A deposit signs the depositor's own running total, which no other
//! transition moves, so deposits from both sides commit in any order.

use super::errors::LifecycleError;
use serde::Serialize;
use shared_types::{keccak256, Address, Amount, AppInstanceId, Balances, PeerIdentity, StateHash};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Commitment {
    Deposit {
        multisig: Address,
        participant: PeerIdentity,
        deposited: Amount,
    },
    Install {
        multisig: Address,
        dependency_nonce: u64,
        app_instance_id: AppInstanceId,
        balances: Balances,
        state_hash: StateHash,
    },
    /// App state updates are end-to-end and not tied to one hop's multisig.
    Update {
        app_instance_id: AppInstanceId,
        local_nonce: u64,
        state_hash: StateHash,
    },
    Uninstall {
        multisig: Address,
        dependency_nonce: u64,
        app_instance_id: AppInstanceId,
        final_balances: Balances,
    },
}

impl Commitment {
    pub fn digest(&self) -> Result<StateHash, LifecycleError> {
        let bytes = bincode::serialize(self).map_err(|e| LifecycleError::Encoding(e.to_string()))?;
        Ok(keccak256(&bytes))
    }
}
