//! # Domain Invariants
//!
//! Collateral rules every channel replica must satisfy.

use super::errors::BalanceError;
use sc_01_channel_store::StateChannel;
use shared_types::{Amount, Balances};

/// Invariant: conservation.
///
/// `free[A] + free[B] + Σ installed app balances == total deposited`.
/// A violation means the two replicas diverged and is never corrected here.
pub fn invariant_conservation(channel: &StateChannel) -> Result<(), BalanceError> {
    let free = channel.free_balance.total().ok_or(BalanceError::Overflow)?;
    let committed = channel.committed_total().ok_or(BalanceError::Overflow)?;
    let held = free.checked_add(committed).ok_or(BalanceError::Overflow)?;
    if held != channel.total_deposited {
        return Err(BalanceError::ConservationViolated {
            multisig: channel.multisig_address,
            free,
            committed,
            deposited: channel.total_deposited,
        });
    }
    Ok(())
}

/// Invariant: balances only name channel participants.
pub fn invariant_participants_only(
    channel: &StateChannel,
    balances: &Balances,
) -> Result<(), BalanceError> {
    for peer in balances.keys() {
        if !channel.has_participant(peer) {
            return Err(BalanceError::NotAParticipant(peer.clone()));
        }
    }
    Ok(())
}

/// Invariant: each participant's free balance covers its share.
pub fn invariant_sufficient_funds(
    channel: &StateChannel,
    balances: &Balances,
) -> Result<(), BalanceError> {
    for (peer, required) in balances {
        let available = channel.free_balance.of(peer);
        if available < *required {
            return Err(BalanceError::InsufficientFreeBalance {
                peer: peer.clone(),
                required: *required,
                available,
            });
        }
    }
    Ok(())
}

/// Sum of balances or overflow error.
pub fn total_of(balances: &Balances) -> Result<Amount, BalanceError> {
    shared_types::sum_balances(balances).ok_or(BalanceError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Address;

    fn channel() -> StateChannel {
        StateChannel::new(Address::zero(), "a".into(), "b".into())
    }

    #[test]
    fn test_empty_channel_conserves() {
        assert!(invariant_conservation(&channel()).is_ok());
    }

    #[test]
    fn test_detects_unbacked_balance() {
        let mut c = channel();
        if let Some(slot) = c.free_balance.slot_mut(&"a".into()) {
            *slot = Amount::from(5);
        }
        assert!(matches!(
            invariant_conservation(&c),
            Err(BalanceError::ConservationViolated { .. })
        ));
    }

    #[test]
    fn test_participants_only() {
        let mut balances = Balances::new();
        balances.insert("a".into(), Amount::one());
        assert!(invariant_participants_only(&channel(), &balances).is_ok());
        balances.insert("mallory".into(), Amount::one());
        assert!(matches!(
            invariant_participants_only(&channel(), &balances),
            Err(BalanceError::NotAParticipant(_))
        ));
    }

    #[test]
    fn test_sufficient_funds() {
        let mut balances = Balances::new();
        balances.insert("a".into(), Amount::one());
        assert!(matches!(
            invariant_sufficient_funds(&channel(), &balances),
            Err(BalanceError::InsufficientFreeBalance { .. })
        ));
    }
}
