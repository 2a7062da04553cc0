//! # Concurrency Scenarios
//!
//! Both ends of a channel starting transitions at the same time. Crossing
//! structural transitions must resolve the same way on both replicas: one
//! commits everywhere, the other is refused everywhere, and the channel
//! stays open. Deposits by different participants commute.

#[cfg(test)]
mod tests {
    use crate::integration::harness::*;
    use node_runtime::apps::tic_tac_toe_identity;
    use node_runtime::Node;
    use shared_types::{Address, Amount, ErrorCode};

    const ROUNDS: usize = 8;

    async fn assert_replicas_match(a: &Node, b: &Node, multisig: Address) {
        let left = state_channel(a, multisig).await;
        let right = state_channel(b, multisig).await;
        assert!(left.status.is_open(), "{:?}", left.status);
        assert!(right.status.is_open(), "{:?}", right.status);
        assert_eq!(left.dependency_nonce, right.dependency_nonce);
        assert_eq!(left.app_instance_ids, right.app_instance_ids);
        assert_eq!(left.free_balance, right.free_balance);
        assert_eq!(left.total_deposited, right.total_deposited);
        assert_conserved(a, multisig);
        assert_conserved(b, multisig);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_crossing_installs_resolve_identically() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let multisig = open_channel(&a, &b, 100, 100).await;

        let mut installed = 0;
        for _ in 0..ROUNDS {
            let from_a = propose(&a, &b, tic_tac_toe_identity(), tic_tac_toe_initial(), 1, 1)
                .await
                .unwrap();
            let from_b = propose(&b, &a, tic_tac_toe_identity(), tic_tac_toe_initial(), 1, 1)
                .await
                .unwrap();

            let (left, right) = tokio::join!(install(&a, &from_b), install(&b, &from_a));
            let outcomes = [left, right];
            let wins = outcomes.iter().filter(|r| r.is_ok()).count();
            assert!(wins >= 1, "both crossing installs refused: {outcomes:?}");
            for refused in outcomes.iter().filter_map(|r| r.as_ref().err()) {
                assert_eq!(refused.code, ErrorCode::StaleNonce);
            }
            installed += wins;

            assert_replicas_match(&a, &b, multisig).await;
        }

        let channel = state_channel(&a, multisig).await;
        assert_eq!(channel.app_instance_ids.len(), installed);
        assert_eq!(channel.dependency_nonce, installed as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_crossing_deposits_both_commit() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let multisig = create_channel(&a, &b).await.unwrap();

        for round in 1..=ROUNDS as u64 {
            let (left, right) = tokio::join!(deposit(&a, multisig, 10), deposit(&b, multisig, 20));
            left.unwrap();
            right.unwrap();

            assert_replicas_match(&a, &b, multisig).await;
            let channel = state_channel(&b, multisig).await;
            assert_eq!(channel.total_deposited, Amount::from(30 * round));
            assert_eq!(channel.free_balance, balances(&[(&a, 10 * round), (&b, 20 * round)]));
        }
    }
}
