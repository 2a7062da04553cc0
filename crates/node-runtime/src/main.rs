//! # State Channel Node Demo
//!
//! Runs three nodes in one process over an in-memory chain and transport:
//!
//! ```text
//!   A ══ channel ══ B ══ channel ══ C
//!   └──────── virtual tic-tac-toe ────┘
//! ```
//!
//! A and C have no channel of their own; B routes a virtual app between
//! them. A plays the top-left cell and C reads the same state back.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use channel_telemetry::{encode_metrics, init_telemetry};
use node_runtime::apps::tic_tac_toe_identity;
use node_runtime::{Collaborators, Node, NodeConfig};
use sc_01_channel_store::InMemoryStoreService;
use sc_02_free_balance::InMemoryChain;
use sc_05_peer_messaging::InMemoryMessagingHub;
use serde_json::json;
use shared_bus::EventFilter;
use shared_types::{
    Address, Amount, AppInstanceId, AppInstanceIdParams, CreateChannelParams, DepositParams,
    InstallVirtualParams, MethodParams, MethodResult, PeerIdentity, ProposeInstallVirtualParams,
    TakeActionParams, UninstallParams,
};
use tokio_stream::StreamExt;
use tracing::info;

async fn spawn_node(
    name: &str,
    config: &NodeConfig,
    chain: &Arc<InMemoryChain>,
    hub: &Arc<InMemoryMessagingHub>,
) -> Result<Node> {
    let node = Node::create(
        config.clone(),
        Collaborators {
            store: Arc::new(InMemoryStoreService::new()),
            chain: chain.clone(),
            transport: hub.clone(),
        },
    )
    .await
    .with_context(|| format!("creating node {name}"))?;
    info!(node = name, peer = %node.identity(), "Node ready");
    Ok(node)
}

/// Create a channel between `a` and `b` and fund it from both sides.
async fn open_channel(a: &Node, b: &Node, deposit: u64) -> Result<Address> {
    let created = a
        .request(MethodParams::CreateChannel(CreateChannelParams {
            counterparty: b.identity().clone(),
        }))
        .await?;
    let MethodResult::CreateChannel(created) = created else {
        bail!("unexpected create-channel result");
    };
    for node in [a, b] {
        node.request(MethodParams::Deposit(DepositParams {
            multisig_address: created.multisig_address,
            amount: Amount::from(deposit),
        }))
        .await?;
    }
    Ok(created.multisig_address)
}

async fn install_game(a: &Node, b: &PeerIdentity, c: &Node) -> Result<AppInstanceId> {
    let intermediaries = vec![b.clone()];
    let proposed = a
        .request(MethodParams::ProposeInstallVirtual(ProposeInstallVirtualParams {
            proposed_to_identifier: c.identity().clone(),
            app: tic_tac_toe_identity(),
            initial_state: json!({
                "players": [Address::zero(), Address::zero()],
                "turnNum": 0,
                "winner": 0,
                "board": [[0, 0, 0], [0, 0, 0], [0, 0, 0]]
            }),
            my_deposit: Amount::from(2),
            peer_deposit: Amount::from(2),
            timeout: 100,
            intermediaries: intermediaries.clone(),
        }))
        .await?;
    let MethodResult::ProposeInstall(proposed) = proposed else {
        bail!("unexpected propose result");
    };
    c.request(MethodParams::InstallVirtual(InstallVirtualParams {
        app_instance_id: proposed.app_instance_id.clone(),
        intermediaries,
    }))
    .await?;
    Ok(proposed.app_instance_id)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env()?;
    init_telemetry(&config.telemetry)?;

    info!("===========================================");
    info!("  State Channel Node Demo v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let chain = Arc::new(InMemoryChain::new());
    let hub = Arc::new(InMemoryMessagingHub::new());
    let a = spawn_node("A", &config, &chain, &hub).await?;
    let b = spawn_node("B", &config, &chain, &hub).await?;
    let c = spawn_node("C", &config, &chain, &hub).await?;

    let mut seen_by_c = c.event_stream(EventFilter::all());
    let watcher = tokio::spawn(async move {
        while let Some(event) = seen_by_c.next().await {
            info!(topic = ?event.topic(), "C observed event");
        }
    });

    open_channel(&a, &b, 10).await.context("opening A-B")?;
    open_channel(&b, &c, 10).await.context("opening B-C")?;

    let game = install_game(&a, b.identity(), &c)
        .await
        .context("installing virtual game")?;
    info!(app_instance_id = %game, "Virtual tic-tac-toe installed through B");

    a.request(MethodParams::TakeAction(TakeActionParams {
        app_instance_id: game.clone(),
        action: json!({ "actionType": 0, "playX": 0, "playY": 0 }),
    }))
    .await
    .context("playing top-left")?;

    let state = c
        .request(MethodParams::GetState(AppInstanceIdParams {
            app_instance_id: game.clone(),
        }))
        .await?;
    info!(state = ?state, "C sees the move");

    let mut final_balances = shared_types::Balances::new();
    final_balances.insert(a.identity().clone(), Amount::from(4));
    final_balances.insert(c.identity().clone(), Amount::zero());
    a.request(MethodParams::UninstallVirtual(UninstallParams {
        app_instance_id: game,
        final_balances,
    }))
    .await
    .context("uninstalling virtual game")?;
    info!("A won the pot; every hop released");

    watcher.abort();
    println!("{}", encode_metrics()?);
    Ok(())
}
