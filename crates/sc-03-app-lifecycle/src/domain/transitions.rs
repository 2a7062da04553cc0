//! # Channel Transitions
//!
//! Structural changes applied to a channel working copy. Each function is
//! all-or-nothing from the caller's point of view: it runs inside
//! `ChannelStore::mutate` (or on a throwaway clone while preparing), so an
//! error discards every partial change.

use super::errors::LifecycleError;
use sc_01_channel_store::{AppInstance, StateChannel};
use sc_02_free_balance::FreeBalanceReconciler;
use serde_json::Value;
use shared_types::{sum_balances, AppInstanceId, AppInstanceProposal, Balances, StateHash};

/// A freshly installed app built from its proposal. `balances` are keyed by
/// the participants of the channel it will live in.
pub fn build_app_instance(
    proposal: &AppInstanceProposal,
    balances: Balances,
    encoded_state: Vec<u8>,
    state_hash: StateHash,
) -> AppInstance {
    AppInstance {
        id: proposal.app_instance_id.clone(),
        app: proposal.app.clone(),
        initiator: proposal.initiator.clone(),
        responder: proposal.responder.clone(),
        initiator_deposit: proposal.initiator_deposit,
        responder_deposit: proposal.responder_deposit,
        timeout: proposal.timeout,
        intermediaries: proposal.intermediaries.clone(),
        state: proposal.initial_state.clone(),
        balances,
        local_nonce: 1,
        encoded_state,
        state_hash,
    }
}

/// Insert `app`, reserve its collateral and bump the dependency nonce.
/// Returns the new dependency nonce.
pub fn install_into(
    channel: &mut StateChannel,
    app: AppInstance,
    reconciler: &FreeBalanceReconciler,
) -> Result<u64, LifecycleError> {
    channel.ensure_open()?;
    if channel.app_instances.contains_key(&app.id) {
        return Err(LifecycleError::InvalidParams(format!(
            "app instance {} already installed",
            app.id
        )));
    }
    let balances = app.balances.clone();
    channel.app_instances.insert(app.id.clone(), app);
    reconciler.commit_app_funding(channel, &balances)?;
    channel.dependency_nonce += 1;
    Ok(channel.dependency_nonce)
}

/// Remove an app, release `final_balances` and bump the dependency nonce.
pub fn uninstall_from(
    channel: &mut StateChannel,
    id: &AppInstanceId,
    final_balances: &Balances,
    reconciler: &FreeBalanceReconciler,
) -> Result<AppInstance, LifecycleError> {
    channel.ensure_open()?;
    let app = channel
        .app_instances
        .remove(id)
        .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
    reconciler.release_app_funding(channel, final_balances)?;
    channel.dependency_nonce += 1;
    Ok(app)
}

/// Overwrite an app's state. The nonce must be exactly one ahead.
pub fn apply_update(
    app: &mut AppInstance,
    new_state: Value,
    encoded_state: Vec<u8>,
    state_hash: StateHash,
    local_nonce: u64,
) -> Result<(), LifecycleError> {
    let expected = app.local_nonce + 1;
    if local_nonce != expected {
        return Err(LifecycleError::StaleNonce {
            expected,
            got: local_nonce,
        });
    }
    app.state = new_state;
    app.encoded_state = encoded_state;
    app.state_hash = state_hash;
    app.local_nonce = local_nonce;
    Ok(())
}

/// Final balances must name exactly the app's end parties and add up to
/// what the app holds.
pub fn validate_final_balances(
    app: &AppInstance,
    final_balances: &Balances,
) -> Result<(), LifecycleError> {
    let named_ends = final_balances.len() == 2
        && final_balances.contains_key(&app.initiator)
        && final_balances.contains_key(&app.responder);
    if !named_ends {
        return Err(LifecycleError::InvalidFinalBalances(format!(
            "final balances must name exactly {} and {}",
            app.initiator, app.responder
        )));
    }
    let committed = sum_balances(&app.balances);
    let released = sum_balances(final_balances);
    match (committed, released) {
        (Some(c), Some(r)) if c == r => Ok(()),
        _ => Err(LifecycleError::InvalidFinalBalances(format!(
            "final balances must add up to the committed total of app {}",
            app.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_02_free_balance::{BlockchainClient, InMemoryChain};
    use serde_json::json;
    use shared_types::{Amount, AppIdentity};
    use std::sync::Arc;

    fn balances(a: u64, b: u64) -> Balances {
        let mut balances = Balances::new();
        balances.insert("alice".into(), Amount::from(a));
        balances.insert("bob".into(), Amount::from(b));
        balances
    }

    fn proposal() -> AppInstanceProposal {
        AppInstanceProposal {
            app_instance_id: AppInstanceId::new("app-1"),
            app: AppIdentity {
                definition: Default::default(),
                state_encoding: "uint256".to_string(),
                action_encoding: None,
            },
            initial_state: json!(0),
            initiator: "alice".into(),
            responder: "bob".into(),
            initiator_deposit: Amount::from(2),
            responder_deposit: Amount::from(1),
            timeout: 10,
            intermediaries: vec![],
        }
    }

    fn funded() -> (FreeBalanceReconciler, StateChannel) {
        let chain = Arc::new(InMemoryChain::new());
        let multisig = chain
            .deploy_multisig(&["alice".into(), "bob".into()])
            .unwrap();
        let reconciler = FreeBalanceReconciler::new(chain.clone());
        let mut channel = StateChannel::new(multisig, "alice".into(), "bob".into());
        for peer in ["alice", "bob"] {
            chain.fund(&multisig, &peer.into(), Amount::from(5)).unwrap();
            reconciler
                .apply_deposit(&mut channel, &peer.into(), Amount::from(5))
                .unwrap();
        }
        (reconciler, channel)
    }

    #[test]
    fn test_install_then_uninstall_moves_nonce_by_two() {
        let (reconciler, mut channel) = funded();
        let app = build_app_instance(&proposal(), balances(2, 1), vec![], StateHash::zero());
        assert_eq!(app.local_nonce, 1);

        assert_eq!(install_into(&mut channel, app, &reconciler).unwrap(), 1);
        assert_eq!(channel.free_balance.of(&"alice".into()), Amount::from(3));

        uninstall_from(&mut channel, &AppInstanceId::new("app-1"), &balances(0, 3), &reconciler)
            .unwrap();
        assert_eq!(channel.dependency_nonce, 2);
        assert!(channel.app_instances.is_empty());
        assert_eq!(channel.free_balance.of(&"bob".into()), Amount::from(7));
    }

    #[test]
    fn test_install_twice_rejected() {
        let (reconciler, mut channel) = funded();
        let app = build_app_instance(&proposal(), balances(2, 1), vec![], StateHash::zero());
        install_into(&mut channel, app.clone(), &reconciler).unwrap();
        assert!(matches!(
            install_into(&mut channel, app, &reconciler),
            Err(LifecycleError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_apply_update_requires_next_nonce() {
        let mut app = build_app_instance(&proposal(), balances(2, 1), vec![], StateHash::zero());
        let err = apply_update(&mut app, json!(5), vec![5], StateHash::zero(), 3).unwrap_err();
        assert_eq!(err, LifecycleError::StaleNonce { expected: 2, got: 3 });

        apply_update(&mut app, json!(5), vec![5], StateHash::repeat_byte(5), 2).unwrap();
        assert_eq!(app.local_nonce, 2);
        assert_eq!(app.state, json!(5));
    }

    #[test]
    fn test_final_balances_validation() {
        let app = build_app_instance(&proposal(), balances(2, 1), vec![], StateHash::zero());
        assert!(validate_final_balances(&app, &balances(3, 0)).is_ok());
        assert!(validate_final_balances(&app, &balances(3, 1)).is_err());

        let mut stranger = balances(3, 0);
        stranger.insert("carol".into(), Amount::zero());
        assert!(matches!(
            validate_final_balances(&app, &stranger),
            Err(LifecycleError::InvalidFinalBalances(_))
        ));
    }
}
