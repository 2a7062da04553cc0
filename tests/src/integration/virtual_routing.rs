//! # Virtual App Scenarios
//!
//! Three nodes in a line, A - B - C, with channels A-B and B-C only. A and C
//! share a tic-tac-toe game routed through B, who backs each hop with its
//! own collateral.

#[cfg(test)]
mod tests {
    use crate::integration::harness::*;
    use node_runtime::Node;
    use serde_json::json;
    use shared_types::{Address, Amount, ErrorCode};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct Line {
        _net: Network,
        a: Node,
        b: Node,
        c: Node,
        ab: Address,
        bc: Address,
    }

    /// A-B funded 10/10, B-C funded with `intermediary` from B and 10 from C.
    async fn line(intermediary: u64) -> Line {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let c = net.node().await;
        let ab = open_channel(&a, &b, 10, 10).await;
        let bc = open_channel(&b, &c, intermediary, 10).await;
        Line {
            _net: net,
            a,
            b,
            c,
            ab,
            bc,
        }
    }

    // =========================================================================
    // INSTALL AND UPDATE
    // =========================================================================

    #[tokio::test]
    async fn test_virtual_tic_tac_toe_through_intermediary() {
        let line = line(10).await;
        let (a, b, c) = (&line.a, &line.b, &line.c);

        let id = propose_virtual(a, c, &[b], 2, 2).await.unwrap();
        let installed = install_virtual(c, &id, &[b]).await.unwrap();
        assert_eq!(installed.intermediaries, vec![b.identity().clone()]);

        let moved = take_action(a, &id, play(0, 0)).await.unwrap();
        let seen = get_state(c, &id).await.unwrap();
        assert_eq!(seen, moved);
        assert_eq!(seen["board"][0][0], json!(1));
        assert_eq!(seen["turnNum"], json!(1));

        for (node, multisig) in [(a, line.ab), (b, line.ab), (b, line.bc), (c, line.bc)] {
            let channel = state_channel(node, multisig).await;
            assert_eq!(channel.app_instance_ids, vec![id.clone()]);
            assert_eq!(channel.dependency_nonce, 1);
            assert_conserved(node, multisig);
        }
    }

    #[tokio::test]
    async fn test_virtual_moves_from_both_ends() {
        let line = line(10).await;
        let (a, b, c) = (&line.a, &line.b, &line.c);
        let id = propose_virtual(a, c, &[b], 1, 1).await.unwrap();
        install_virtual(c, &id, &[b]).await.unwrap();

        take_action(a, &id, play(0, 0)).await.unwrap();
        take_action(c, &id, play(1, 1)).await.unwrap();

        let (_, left) = a.subsystems().store.find_app(&id).unwrap();
        let (_, right) = c.subsystems().store.find_app(&id).unwrap();
        assert_eq!(left.local_nonce, 3);
        assert_eq!(left.local_nonce, right.local_nonce);
        assert_eq!(left.state_hash, right.state_hash);
        assert_eq!(right.state["board"][1][1], json!(2));
    }

    #[tokio::test]
    async fn test_intermediary_without_collateral_installs_nothing() {
        let line = line(0).await;
        let (a, b, c) = (&line.a, &line.b, &line.c);

        let outcome = match propose_virtual(a, c, &[b], 4, 1).await {
            Ok(id) => install_virtual(c, &id, &[b]).await.map(|_| ()),
            Err(err) => Err(err),
        };
        assert_eq!(outcome.unwrap_err().code, ErrorCode::InsufficientFreeBalance);

        for (node, multisig) in [(a, line.ab), (b, line.ab), (b, line.bc), (c, line.bc)] {
            let channel = state_channel(node, multisig).await;
            assert!(channel.app_instance_ids.is_empty());
            assert_eq!(channel.dependency_nonce, 0);
        }
    }

    #[tokio::test]
    async fn test_install_on_other_route_rejected() {
        let line = line(10).await;
        let (a, b, c) = (&line.a, &line.b, &line.c);
        let id = propose_virtual(a, c, &[b], 1, 1).await.unwrap();

        let err = install_virtual(c, &id, &[]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRoute);
    }

    #[tokio::test]
    async fn test_virtual_app_rejects_direct_install() {
        let line = line(10).await;
        let (a, b, c) = (&line.a, &line.b, &line.c);
        let id = propose_virtual(a, c, &[b], 1, 1).await.unwrap();

        let err = install(c, &id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }

    // =========================================================================
    // UNINSTALL
    // =========================================================================

    #[tokio::test]
    async fn test_uninstall_virtual_settles_every_hop() {
        let line = line(10).await;
        let (a, b, c) = (&line.a, &line.b, &line.c);
        let id = propose_virtual(a, c, &[b], 2, 2).await.unwrap();
        install_virtual(c, &id, &[b]).await.unwrap();

        uninstall(a, &id, balances(&[(a, 4), (c, 0)]), true)
            .await
            .unwrap();

        let ab = state_channel(a, line.ab).await;
        assert_eq!(ab.free_balance, balances(&[(a, 12), (b, 8)]));
        let bc = state_channel(c, line.bc).await;
        assert_eq!(bc.free_balance, balances(&[(b, 12), (c, 8)]));

        for (node, multisig) in [(a, line.ab), (b, line.ab), (b, line.bc), (c, line.bc)] {
            let channel = state_channel(node, multisig).await;
            assert!(channel.app_instance_ids.is_empty());
            assert_eq!(channel.dependency_nonce, 2);
            assert_eq!(channel.total_deposited, Amount::from(20));
            assert_conserved(node, multisig);
        }
    }
}
