//! # Direct Channel Scenarios
//!
//! Two nodes sharing one channel drive the full app lifecycle: propose,
//! install, take actions, push explicit updates and uninstall.
//!
//! ## Properties Checked
//!
//! - Free balance plus committed app balances equals the deposited total
//! - The dependency nonce moves on install and uninstall only
//! - Both replicas hold the same local nonce and state hash after each update
//! - Failed requests leave the channel untouched

#[cfg(test)]
mod tests {
    use crate::integration::harness::*;
    use node_runtime::apps::PaymentState;
    use serde_json::json;
    use shared_types::{Amount, AppInstanceId, ErrorCode};

    // =========================================================================
    // CONSERVATION AND NONCES
    // =========================================================================

    #[tokio::test]
    async fn test_collateral_conserved_through_lifecycle() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let multisig = open_channel(&a, &b, 10, 10).await;

        let id = install_tic_tac_toe(&a, &b, 3, 2).await;
        for node in [&a, &b] {
            assert_conserved(node, multisig);
            let channel = state_channel(node, multisig).await;
            assert_eq!(channel.free_balance[a.identity()], Amount::from(7));
            assert_eq!(channel.free_balance[b.identity()], Amount::from(8));
        }

        take_action(&a, &id, play(1, 1)).await.unwrap();
        for node in [&a, &b] {
            assert_conserved(node, multisig);
        }

        uninstall(&b, &id, balances(&[(&a, 5), (&b, 0)]), false)
            .await
            .unwrap();
        for node in [&a, &b] {
            assert_conserved(node, multisig);
            let channel = state_channel(node, multisig).await;
            assert_eq!(channel.total_deposited, Amount::from(20));
        }
    }

    #[tokio::test]
    async fn test_dependency_nonce_moves_on_install_and_uninstall_only() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let multisig = open_channel(&a, &b, 3, 2).await;
        assert_eq!(state_channel(&a, multisig).await.dependency_nonce, 0);

        let id = install_tic_tac_toe(&a, &b, 3, 2).await;
        assert_eq!(state_channel(&a, multisig).await.dependency_nonce, 1);

        take_action(&a, &id, play(0, 0)).await.unwrap();
        take_action(&b, &id, play(2, 2)).await.unwrap();
        assert_eq!(state_channel(&a, multisig).await.dependency_nonce, 1);

        let free = uninstall(&a, &id, balances(&[(&a, 4), (&b, 1)]), false)
            .await
            .unwrap();
        assert_eq!(free, balances(&[(&a, 4), (&b, 1)]));

        for node in [&a, &b] {
            let channel = state_channel(node, multisig).await;
            assert_eq!(channel.dependency_nonce, 2);
            assert!(channel.app_instance_ids.is_empty());
            assert_eq!(channel.free_balance, balances(&[(&a, 4), (&b, 1)]));
        }
    }

    // =========================================================================
    // REPLICA AGREEMENT
    // =========================================================================

    #[tokio::test]
    async fn test_replicas_agree_after_alternating_moves() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        open_channel(&a, &b, 10, 10).await;
        let id = install_tic_tac_toe(&a, &b, 1, 1).await;

        for (actor, x, y) in [(&a, 0, 0), (&b, 1, 1), (&a, 0, 1)] {
            take_action(actor, &id, play(x, y)).await.unwrap();
        }

        let (_, left) = a.subsystems().store.find_app(&id).unwrap();
        let (_, right) = b.subsystems().store.find_app(&id).unwrap();
        assert_eq!(left.local_nonce, 4);
        assert_eq!(left.local_nonce, right.local_nonce);
        assert_eq!(left.state_hash, right.state_hash);
        assert_eq!(left.state, right.state);
        assert_eq!(get_state(&b, &id).await.unwrap()["turnNum"], json!(3));
    }

    #[tokio::test]
    async fn test_payment_updates_advance_local_nonce() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        open_channel(&a, &b, 10, 10).await;
        let id = install_payment(&a, &b, 5, 5).await;

        for step in 1..=5u64 {
            let state = PaymentState::new(5 - step, 5 + step).to_value();
            let updated = update_state(&a, &id, state.clone()).await.unwrap();
            assert_eq!(updated, state);
        }

        for node in [&a, &b] {
            let (_, app) = node.subsystems().store.find_app(&id).unwrap();
            assert_eq!(app.local_nonce, 6);
            assert_eq!(app.state, PaymentState::new(0, 10).to_value());
        }
    }

    #[tokio::test]
    async fn test_details_match_install_result() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        open_channel(&a, &b, 10, 10).await;

        let id = propose(&a, &b, node_runtime::apps::tic_tac_toe_identity(), tic_tac_toe_initial(), 2, 3)
            .await
            .unwrap();
        let installed = install(&b, &id).await.unwrap();

        assert_eq!(details(&b, &id).await.unwrap(), installed);
        assert_eq!(details(&a, &id).await.unwrap(), installed);
        assert_eq!(installed.initiator, *a.identity());
        assert_eq!(installed.initiator_deposit, Amount::from(2));
        assert_eq!(installed.responder_deposit, Amount::from(3));
    }

    // =========================================================================
    // REJECTED REQUESTS
    // =========================================================================

    #[tokio::test]
    async fn test_take_action_without_app_changes_nothing() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let multisig = open_channel(&a, &b, 10, 10).await;
        let id = install_tic_tac_toe(&a, &b, 1, 1).await;
        let before = a.subsystems().store.get(&multisig).unwrap();

        for missing in [AppInstanceId::new(""), AppInstanceId::new("no-such-app")] {
            let err = take_action(&a, &missing, play(0, 0)).await.unwrap_err();
            assert_eq!(err.code, ErrorCode::NoAppInstanceForTakeAction);
        }

        assert_eq!(a.subsystems().store.get(&multisig).unwrap(), before);
        assert_eq!(get_state(&a, &id).await.unwrap(), tic_tac_toe_initial());
    }

    #[tokio::test]
    async fn test_illegal_move_rejected_without_mutation() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        open_channel(&a, &b, 10, 10).await;
        let id = install_tic_tac_toe(&a, &b, 1, 1).await;
        take_action(&a, &id, play(0, 0)).await.unwrap();

        let err = take_action(&b, &id, play(0, 0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAction);

        for node in [&a, &b] {
            let (_, app) = node.subsystems().store.find_app(&id).unwrap();
            assert_eq!(app.local_nonce, 2);
        }
    }

    #[tokio::test]
    async fn test_payment_app_refuses_actions() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        open_channel(&a, &b, 10, 10).await;
        let id = install_payment(&a, &b, 2, 2).await;

        let err = take_action(&a, &id, json!({})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAction);
    }

    #[tokio::test]
    async fn test_uninstall_with_wrong_total_rejected() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let multisig = open_channel(&a, &b, 10, 10).await;
        let id = install_tic_tac_toe(&a, &b, 3, 2).await;

        let err = uninstall(&a, &id, balances(&[(&a, 9), (&b, 9)]), false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFinalBalances);
        assert_eq!(state_channel(&b, multisig).await.app_instance_ids, vec![id]);
    }

    #[tokio::test]
    async fn test_install_beyond_free_balance_rejected() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let multisig = open_channel(&a, &b, 2, 2).await;

        let outcome = match propose(&a, &b, node_runtime::apps::tic_tac_toe_identity(), tic_tac_toe_initial(), 5, 1).await {
            Ok(id) => install(&b, &id).await.map(|_| ()),
            Err(err) => Err(err),
        };
        assert_eq!(outcome.unwrap_err().code, ErrorCode::InsufficientFreeBalance);
        for node in [&a, &b] {
            let channel = state_channel(node, multisig).await;
            assert!(channel.app_instance_ids.is_empty());
            assert_eq!(channel.dependency_nonce, 0);
        }
    }
}
