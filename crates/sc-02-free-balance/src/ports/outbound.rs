//! # Outbound Ports
//!
//! Blockchain collaborator. Consulted at channel setup and deposit time
//! only, never mid-protocol. Calls block from the node's perspective.

use crate::domain::ChainError;
use shared_types::{Address, Amount, PeerIdentity};

/// Read balances, deploy and fund multisig wallets.
pub trait BlockchainClient: Send + Sync {
    /// On-chain balance held by `address`.
    fn balance_of(&self, address: &Address) -> Result<Amount, ChainError>;

    /// Deploy a multisig owned by `owners` and return its address.
    fn deploy_multisig(&self, owners: &[PeerIdentity; 2]) -> Result<Address, ChainError>;

    /// Owners of a deployed multisig, sorted.
    fn multisig_owners(&self, multisig: &Address) -> Result<[PeerIdentity; 2], ChainError>;

    /// Transfer `amount` from `from` into the multisig.
    fn fund(&self, multisig: &Address, from: &PeerIdentity, amount: Amount)
        -> Result<(), ChainError>;
}
