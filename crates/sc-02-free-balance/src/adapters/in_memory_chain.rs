//! In-Memory Chain Adapter
//!
//! Implements `BlockchainClient` for a simulated chain shared by every node
//! in a process.

use crate::domain::ChainError;
use crate::ports::outbound::BlockchainClient;
use parking_lot::RwLock;
use shared_types::{keccak256, Address, Amount, PeerIdentity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Simulated chain holding multisig balances.
#[derive(Default)]
pub struct InMemoryChain {
    balances: RwLock<HashMap<Address, Amount>>,
    owners: RwLock<HashMap<Address, [PeerIdentity; 2]>>,
    deployments: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an RPC outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Credit an address directly, bypassing `fund`.
    pub fn credit(&self, address: &Address, amount: Amount) {
        *self.balances.write().entry(*address).or_default() += amount;
    }

    fn check_available(&self) -> Result<(), ChainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

/// Derive a multisig address from its owners and a deployment counter.
fn multisig_address(owners: &[PeerIdentity; 2], salt: u64) -> Address {
    let mut preimage = Vec::new();
    for owner in owners {
        preimage.extend_from_slice(owner.as_str().as_bytes());
        preimage.push(0);
    }
    preimage.extend_from_slice(&salt.to_be_bytes());
    let digest = keccak256(&preimage);
    Address::from_slice(&digest.as_bytes()[12..])
}

impl BlockchainClient for InMemoryChain {
    fn balance_of(&self, address: &Address) -> Result<Amount, ChainError> {
        self.check_available()?;
        Ok(self.balances.read().get(address).copied().unwrap_or_default())
    }

    fn deploy_multisig(&self, owners: &[PeerIdentity; 2]) -> Result<Address, ChainError> {
        self.check_available()?;
        let mut sorted = owners.clone();
        sorted.sort();
        let salt = self.deployments.fetch_add(1, Ordering::SeqCst);
        let address = multisig_address(&sorted, salt);
        info!(multisig = ?address, "[sc-02] Multisig deployed");
        self.owners.write().insert(address, sorted);
        Ok(address)
    }

    fn multisig_owners(&self, multisig: &Address) -> Result<[PeerIdentity; 2], ChainError> {
        self.check_available()?;
        self.owners
            .read()
            .get(multisig)
            .cloned()
            .ok_or(ChainError::UnknownMultisig(*multisig))
    }

    fn fund(
        &self,
        multisig: &Address,
        from: &PeerIdentity,
        amount: Amount,
    ) -> Result<(), ChainError> {
        self.check_available()?;
        if !self.owners.read().contains_key(multisig) {
            return Err(ChainError::UnknownMultisig(*multisig));
        }
        info!(multisig = ?multisig, from = %from, amount = %amount, "[sc-02] Multisig funded");
        *self.balances.write().entry(*multisig).or_default() += amount;
        Ok(())
    }
}
