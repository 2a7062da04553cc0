//! # Free-Balance Reconciler
//!
//! Moves collateral between a channel's free balance and its installed apps.
//! Every operation works on the caller's working copy and re-asserts the
//! conservation invariant before returning, so a failed call leaves the
//! stored replica untouched.

use crate::domain::invariants::{
    invariant_conservation, invariant_participants_only, invariant_sufficient_funds, total_of,
};
use crate::domain::BalanceError;
use crate::ports::outbound::BlockchainClient;
use sc_01_channel_store::StateChannel;
use shared_types::{Amount, Balances, PeerIdentity};
use std::sync::Arc;
use tracing::debug;

/// Collateral bookkeeping for channel replicas.
pub struct FreeBalanceReconciler {
    chain: Arc<dyn BlockchainClient>,
}

impl FreeBalanceReconciler {
    pub fn new(chain: Arc<dyn BlockchainClient>) -> Self {
        Self { chain }
    }

    /// Record a deposit by `participant`.
    ///
    /// The chain must already hold at least the new total for the multisig.
    pub fn apply_deposit(
        &self,
        channel: &mut StateChannel,
        participant: &PeerIdentity,
        amount: Amount,
    ) -> Result<(), BalanceError> {
        if !channel.has_participant(participant) {
            return Err(BalanceError::NotAParticipant(participant.clone()));
        }
        let expected = channel
            .total_deposited
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        let on_chain = self.chain.balance_of(&channel.multisig_address)?;
        if on_chain < expected {
            return Err(BalanceError::DepositNotConfirmed {
                multisig: channel.multisig_address,
                expected,
                on_chain,
            });
        }

        let slot = channel
            .free_balance
            .slot_mut(participant)
            .ok_or_else(|| BalanceError::NotAParticipant(participant.clone()))?;
        *slot = slot.checked_add(amount).ok_or(BalanceError::Overflow)?;
        channel.total_deposited = expected;
        let deposited = channel
            .deposited_by(participant)
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        channel.deposits.insert(participant.clone(), deposited);

        debug!(
            multisig = ?channel.multisig_address,
            participant = %participant,
            amount = %amount,
            "[sc-02] Deposit applied"
        );
        invariant_conservation(channel)
    }

    /// Read-only check that both shares can be funded.
    pub fn check_funding(
        &self,
        channel: &StateChannel,
        balances: &Balances,
    ) -> Result<(), BalanceError> {
        invariant_participants_only(channel, balances)?;
        invariant_sufficient_funds(channel, balances)
    }

    /// Deduct an app's committed balances from the free balance.
    ///
    /// The app must already be in `channel.app_instances`.
    pub fn commit_app_funding(
        &self,
        channel: &mut StateChannel,
        balances: &Balances,
    ) -> Result<(), BalanceError> {
        self.check_funding(channel, balances)?;
        for (peer, amount) in balances {
            let slot = channel
                .free_balance
                .slot_mut(peer)
                .ok_or_else(|| BalanceError::NotAParticipant(peer.clone()))?;
            *slot = slot
                .checked_sub(*amount)
                .ok_or_else(|| BalanceError::InsufficientFreeBalance {
                    peer: peer.clone(),
                    required: *amount,
                    available: *slot,
                })?;
        }
        debug!(
            multisig = ?channel.multisig_address,
            committed = %total_of(balances)?,
            "[sc-02] App funding committed"
        );
        invariant_conservation(channel)
    }

    /// Return an app's final balances to the free balance.
    ///
    /// The app must already be removed from `channel.app_instances`.
    pub fn release_app_funding(
        &self,
        channel: &mut StateChannel,
        final_balances: &Balances,
    ) -> Result<(), BalanceError> {
        invariant_participants_only(channel, final_balances)?;
        for (peer, amount) in final_balances {
            let slot = channel
                .free_balance
                .slot_mut(peer)
                .ok_or_else(|| BalanceError::NotAParticipant(peer.clone()))?;
            *slot = slot.checked_add(*amount).ok_or(BalanceError::Overflow)?;
        }
        debug!(
            multisig = ?channel.multisig_address,
            released = %total_of(final_balances)?,
            "[sc-02] App funding released"
        );
        invariant_conservation(channel)
    }
}
