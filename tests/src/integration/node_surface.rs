//! # Node Surface Scenarios
//!
//! Behavior at the edges of a node: chain confirmation of deposits,
//! unreachable peers, restarts over the same store, event listeners and
//! junk arriving on the transport.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::integration::harness::*;
    use node_runtime::Node;
    use parking_lot::Mutex;
    use sc_01_channel_store::InMemoryStoreService;
    use sc_02_free_balance::{BlockchainClient, ChainError, InMemoryChain};
    use sc_05_peer_messaging::MessagingService;
    use serde_json::json;
    use shared_bus::{EventFilter, EventTopic, ListenerError, NodeEvent};
    use shared_types::{Address, Amount, ErrorCode, PeerIdentity};

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// Chain client whose transfers never land.
    struct LossyChain {
        inner: Arc<InMemoryChain>,
    }

    impl BlockchainClient for LossyChain {
        fn balance_of(&self, address: &Address) -> Result<Amount, ChainError> {
            self.inner.balance_of(address)
        }

        fn deploy_multisig(&self, owners: &[PeerIdentity; 2]) -> Result<Address, ChainError> {
            self.inner.deploy_multisig(owners)
        }

        fn multisig_owners(&self, multisig: &Address) -> Result<[PeerIdentity; 2], ChainError> {
            self.inner.multisig_owners(multisig)
        }

        fn fund(&self, _multisig: &Address, _from: &PeerIdentity, _amount: Amount) -> Result<(), ChainError> {
            Ok(())
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> shared_bus::Listener {
        let log = log.clone();
        Arc::new(move |_: &NodeEvent| -> Result<(), ListenerError> {
            log.lock().push(label);
            Ok(())
        })
    }

    // =========================================================================
    // DEPOSITS
    // =========================================================================

    #[tokio::test]
    async fn test_unconfirmed_deposit_rejected() {
        let net = Network::new();
        let lossy = net
            .node_with(net.collaborators_on(Arc::new(LossyChain {
                inner: net.chain.clone(),
            })))
            .await;
        let peer = net.node().await;
        let multisig = create_channel(&lossy, &peer).await.unwrap();

        let err = deposit(&lossy, multisig, 5).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DepositNotConfirmed);

        for node in [&lossy, &peer] {
            let channel = state_channel(node, multisig).await;
            assert_eq!(channel.total_deposited, Amount::zero());
            assert_eq!(channel.free_balance[lossy.identity()], Amount::zero());
        }
    }

    #[tokio::test]
    async fn test_deposits_credit_both_replicas() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let multisig = create_channel(&a, &b).await.unwrap();

        let deposited = deposit(&a, multisig, 7).await.unwrap();
        assert_eq!(deposited.free_balance, balances(&[(&a, 7), (&b, 0)]));
        deposit(&b, multisig, 3).await.unwrap();

        for node in [&a, &b] {
            let channel = state_channel(node, multisig).await;
            assert_eq!(channel.free_balance, balances(&[(&a, 7), (&b, 3)]));
            assert_eq!(channel.total_deposited, Amount::from(10));
        }
    }

    #[tokio::test]
    async fn test_duplicate_channel_refused() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        create_channel(&a, &b).await.unwrap();

        let err = create_channel(&b, &a).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ChannelAlreadyExists);
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    #[tokio::test]
    async fn test_unreachable_peer_commits_nothing() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        open_channel(&a, &b, 10, 10).await;
        let id = install_tic_tac_toe(&a, &b, 1, 1).await;

        net.hub.set_unreachable(b.identity(), true);
        let err = take_action(&a, &id, play(0, 0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransportFailure);
        let (_, app) = a.subsystems().store.find_app(&id).unwrap();
        assert_eq!(app.local_nonce, 1);
        assert_eq!(app.state, tic_tac_toe_initial());

        net.hub.set_unreachable(b.identity(), false);
        take_action(&a, &id, play(0, 0)).await.unwrap();
        let (_, app) = b.subsystems().store.find_app(&id).unwrap();
        assert_eq!(app.local_nonce, 2);
    }

    #[tokio::test]
    async fn test_unrecognized_message_dropped() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;

        net.hub
            .post_message(b.identity(), json!({ "hello": "world" }))
            .await
            .unwrap();
        net.hub
            .post_message(b.identity(), json!(["not", "an", "envelope"]))
            .await
            .unwrap();

        // The mailbox pump survives and the next exchange goes through.
        open_channel(&a, &b, 1, 1).await;
    }

    // =========================================================================
    // RESTART
    // =========================================================================

    #[tokio::test]
    async fn test_restarted_node_resumes_game() {
        let net = Network::new();
        let store = Arc::new(InMemoryStoreService::new());
        let b = net.node().await;

        let a = net.node_with(net.collaborators(store.clone())).await;
        let identity = a.identity().clone();
        open_channel(&a, &b, 10, 10).await;
        let id = install_tic_tac_toe(&a, &b, 1, 1).await;
        take_action(&a, &id, play(0, 0)).await.unwrap();
        drop(a);

        let a = net.node_with(net.collaborators(store)).await;
        assert_eq!(a.identity(), &identity);
        assert_eq!(get_state(&a, &id).await.unwrap()["board"][0][0], json!(1));

        take_action(&b, &id, play(1, 1)).await.unwrap();
        let (_, app) = a.subsystems().store.find_app(&id).unwrap();
        assert_eq!(app.local_nonce, 3);
        assert_eq!(app.state["board"][1][1], json!(2));
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    #[tokio::test]
    async fn test_listeners_run_in_order_past_failures() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        open_channel(&a, &b, 10, 10).await;

        let log = Arc::new(Mutex::new(Vec::new()));
        b.on(
            EventTopic::Install,
            Arc::new(|_: &NodeEvent| -> Result<(), ListenerError> {
                Err(ListenerError("listener failed".to_string()))
            }),
        );
        b.on(EventTopic::Install, recorder(&log, "install"));
        let all = b.on(EventTopic::All, recorder(&log, "all"));

        let id = install_tic_tac_toe(&a, &b, 1, 1).await;
        assert_eq!(*log.lock(), vec!["install", "all"]);

        assert!(b.off(all));
        take_action(&a, &id, play(0, 0)).await.unwrap();
        assert_eq!(*log.lock(), vec!["install", "all"]);
    }

    #[tokio::test]
    async fn test_subscription_sees_counterparty_events() {
        let net = Network::new();
        let a = net.node().await;
        let b = net.node().await;
        let mut events = b.subscribe(EventFilter::topics(vec![EventTopic::CreateChannel]));

        let multisig = create_channel(&a, &b).await.unwrap();

        match events.try_recv().unwrap() {
            Some(NodeEvent::CreateChannel(created)) => {
                assert_eq!(created.multisig_address, multisig);
                assert_eq!(&created.counterparty, a.identity());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_emitted_events_reach_listeners() {
        let net = Network::new();
        let a: Node = net.node().await;
        let log = Arc::new(Mutex::new(Vec::new()));
        a.on(EventTopic::ProtocolFault, recorder(&log, "fault"));

        a.emit(NodeEvent::ProtocolFault {
            multisig_address: Address::zero(),
            reason: "injected".to_string(),
        })
        .await;
        assert_eq!(*log.lock(), vec!["fault"]);
    }
}
