//! # Test Harness
//!
//! A network of nodes sharing one in-memory chain and messaging hub, plus
//! request helpers that unwrap the expected `MethodResult` variant.

use std::sync::Arc;

use node_runtime::apps::{payment_identity, tic_tac_toe_identity, PaymentState};
use node_runtime::{Collaborators, Node, NodeConfig};
use sc_01_channel_store::InMemoryStoreService;
use sc_02_free_balance::{BlockchainClient, InMemoryChain};
use sc_05_peer_messaging::InMemoryMessagingHub;
use serde_json::{json, Value};
use shared_types::{
    Address, Amount, ApiError, AppIdentity, AppInstanceId, AppInstanceIdParams, AppInstanceInfo,
    Balances, CreateChannelParams, DepositParams, DepositResult, InstallVirtualParams,
    MethodParams, MethodResult, MultisigParams, PeerIdentity, ProposeInstallParams,
    ProposeInstallVirtualParams, StateChannelInfo, TakeActionParams, UninstallParams,
    UpdateStateParams,
};

// =============================================================================
// NETWORK
// =============================================================================

pub struct Network {
    pub chain: Arc<InMemoryChain>,
    pub hub: Arc<InMemoryMessagingHub>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            chain: Arc::new(InMemoryChain::new()),
            hub: Arc::new(InMemoryMessagingHub::new()),
        }
    }

    pub fn collaborators(&self, store: Arc<InMemoryStoreService>) -> Collaborators {
        Collaborators {
            store,
            chain: self.chain.clone(),
            transport: self.hub.clone(),
        }
    }

    /// Collaborators over a custom chain client, still on the shared hub.
    pub fn collaborators_on(&self, chain: Arc<dyn BlockchainClient>) -> Collaborators {
        Collaborators {
            store: Arc::new(InMemoryStoreService::new()),
            chain,
            transport: self.hub.clone(),
        }
    }

    pub async fn node(&self) -> Node {
        self.node_with(self.collaborators(Arc::new(InMemoryStoreService::new())))
            .await
    }

    pub async fn node_with(&self, collaborators: Collaborators) -> Node {
        Node::create(NodeConfig::default(), collaborators)
            .await
            .expect("node starts")
    }
}

// =============================================================================
// CHANNEL SETUP
// =============================================================================

pub async fn create_channel(a: &Node, b: &Node) -> Result<Address, ApiError> {
    let result = a
        .request(MethodParams::CreateChannel(CreateChannelParams {
            counterparty: b.identity().clone(),
        }))
        .await?;
    match result {
        MethodResult::CreateChannel(created) => Ok(created.multisig_address),
        other => panic!("unexpected result {other:?}"),
    }
}

pub async fn deposit(node: &Node, multisig: Address, amount: u64) -> Result<DepositResult, ApiError> {
    let result = node
        .request(MethodParams::Deposit(DepositParams {
            multisig_address: multisig,
            amount: Amount::from(amount),
        }))
        .await?;
    match result {
        MethodResult::Deposit(deposited) => Ok(deposited),
        other => panic!("unexpected result {other:?}"),
    }
}

/// Create a channel from `a` to `b` and fund each side.
pub async fn open_channel(a: &Node, b: &Node, deposit_a: u64, deposit_b: u64) -> Address {
    let multisig = create_channel(a, b).await.expect("channel created");
    for (node, amount) in [(a, deposit_a), (b, deposit_b)] {
        if amount > 0 {
            deposit(node, multisig, amount).await.expect("deposit confirmed");
        }
    }
    multisig
}

pub async fn state_channel(node: &Node, multisig: Address) -> StateChannelInfo {
    let result = node
        .request(MethodParams::GetStateChannel(MultisigParams {
            multisig_address: multisig,
        }))
        .await
        .expect("channel exists");
    match result {
        MethodResult::StateChannel(found) => found.state_channel,
        other => panic!("unexpected result {other:?}"),
    }
}

/// Balances keyed by node identity.
pub fn balances(entries: &[(&Node, u64)]) -> Balances {
    entries
        .iter()
        .map(|(node, amount)| (node.identity().clone(), Amount::from(*amount)))
        .collect()
}

/// Free balance plus every installed app's committed balances must equal
/// the deposited total.
pub fn assert_conserved(node: &Node, multisig: Address) {
    let channel = node
        .subsystems()
        .store
        .get(&multisig)
        .expect("channel exists");
    let free = channel.free_balance.total().expect("free balance fits");
    let committed = channel.committed_total().expect("committed total fits");
    assert_eq!(
        free + committed,
        channel.total_deposited,
        "collateral not conserved at {}",
        node.identity()
    );
}

// =============================================================================
// APP INSTANCES
// =============================================================================

pub fn tic_tac_toe_initial() -> Value {
    json!({
        "players": [Address::zero(), Address::zero()],
        "turnNum": 0,
        "winner": 0,
        "board": [[0, 0, 0], [0, 0, 0], [0, 0, 0]]
    })
}

pub fn play(x: usize, y: usize) -> Value {
    json!({ "actionType": 0, "playX": x, "playY": y })
}

pub async fn propose(
    from: &Node,
    to: &Node,
    app: AppIdentity,
    initial_state: Value,
    my_deposit: u64,
    peer_deposit: u64,
) -> Result<AppInstanceId, ApiError> {
    let result = from
        .request(MethodParams::ProposeInstall(ProposeInstallParams {
            proposed_to_identifier: to.identity().clone(),
            app,
            initial_state,
            my_deposit: Amount::from(my_deposit),
            peer_deposit: Amount::from(peer_deposit),
            timeout: 10,
        }))
        .await?;
    match result {
        MethodResult::ProposeInstall(proposed) => Ok(proposed.app_instance_id),
        other => panic!("unexpected result {other:?}"),
    }
}

pub async fn install(node: &Node, id: &AppInstanceId) -> Result<AppInstanceInfo, ApiError> {
    let result = node
        .request(MethodParams::Install(AppInstanceIdParams {
            app_instance_id: id.clone(),
        }))
        .await?;
    match result {
        MethodResult::Install(installed) => Ok(installed.app_instance),
        other => panic!("unexpected result {other:?}"),
    }
}

/// Propose from `from`, install at `to`.
pub async fn install_tic_tac_toe(from: &Node, to: &Node, my: u64, peer: u64) -> AppInstanceId {
    let id = propose(from, to, tic_tac_toe_identity(), tic_tac_toe_initial(), my, peer)
        .await
        .expect("proposal accepted");
    install(to, &id).await.expect("app installed");
    id
}

pub async fn install_payment(from: &Node, to: &Node, my: u64, peer: u64) -> AppInstanceId {
    let id = propose(
        from,
        to,
        payment_identity(),
        PaymentState::new(my, peer).to_value(),
        my,
        peer,
    )
    .await
    .expect("proposal accepted");
    install(to, &id).await.expect("app installed");
    id
}

fn identities(via: &[&Node]) -> Vec<PeerIdentity> {
    via.iter().map(|node| node.identity().clone()).collect()
}

pub async fn propose_virtual(
    from: &Node,
    to: &Node,
    via: &[&Node],
    my_deposit: u64,
    peer_deposit: u64,
) -> Result<AppInstanceId, ApiError> {
    let result = from
        .request(MethodParams::ProposeInstallVirtual(ProposeInstallVirtualParams {
            proposed_to_identifier: to.identity().clone(),
            app: tic_tac_toe_identity(),
            initial_state: tic_tac_toe_initial(),
            my_deposit: Amount::from(my_deposit),
            peer_deposit: Amount::from(peer_deposit),
            timeout: 10,
            intermediaries: identities(via),
        }))
        .await?;
    match result {
        MethodResult::ProposeInstall(proposed) => Ok(proposed.app_instance_id),
        other => panic!("unexpected result {other:?}"),
    }
}

pub async fn install_virtual(
    node: &Node,
    id: &AppInstanceId,
    via: &[&Node],
) -> Result<AppInstanceInfo, ApiError> {
    let result = node
        .request(MethodParams::InstallVirtual(InstallVirtualParams {
            app_instance_id: id.clone(),
            intermediaries: identities(via),
        }))
        .await?;
    match result {
        MethodResult::Install(installed) => Ok(installed.app_instance),
        other => panic!("unexpected result {other:?}"),
    }
}

pub async fn details(node: &Node, id: &AppInstanceId) -> Result<AppInstanceInfo, ApiError> {
    let result = node
        .request(MethodParams::GetAppInstanceDetails(AppInstanceIdParams {
            app_instance_id: id.clone(),
        }))
        .await?;
    match result {
        MethodResult::AppInstanceDetails(found) => Ok(found.app_instance),
        other => panic!("unexpected result {other:?}"),
    }
}

pub async fn get_state(node: &Node, id: &AppInstanceId) -> Result<Value, ApiError> {
    let result = node
        .request(MethodParams::GetState(AppInstanceIdParams {
            app_instance_id: id.clone(),
        }))
        .await?;
    match result {
        MethodResult::State(found) => Ok(found.state),
        other => panic!("unexpected result {other:?}"),
    }
}

pub async fn take_action(node: &Node, id: &AppInstanceId, action: Value) -> Result<Value, ApiError> {
    let result = node
        .request(MethodParams::TakeAction(TakeActionParams {
            app_instance_id: id.clone(),
            action,
        }))
        .await?;
    match result {
        MethodResult::TakeAction(moved) => Ok(moved.new_state),
        other => panic!("unexpected result {other:?}"),
    }
}

pub async fn update_state(node: &Node, id: &AppInstanceId, new_state: Value) -> Result<Value, ApiError> {
    let result = node
        .request(MethodParams::UpdateState(UpdateStateParams {
            app_instance_id: id.clone(),
            new_state,
        }))
        .await?;
    match result {
        MethodResult::UpdateState(updated) => Ok(updated.new_state),
        other => panic!("unexpected result {other:?}"),
    }
}

/// Uninstall a direct app, or a virtual one when `is_virtual` is set.
/// Returns the free balance of the channel the app was funded from.
pub async fn uninstall(
    node: &Node,
    id: &AppInstanceId,
    final_balances: Balances,
    is_virtual: bool,
) -> Result<Balances, ApiError> {
    let params = UninstallParams {
        app_instance_id: id.clone(),
        final_balances,
    };
    let params = if is_virtual {
        MethodParams::UninstallVirtual(params)
    } else {
        MethodParams::Uninstall(params)
    };
    match node.request(params).await? {
        MethodResult::Uninstall(released) => Ok(released.free_balance),
        other => panic!("unexpected result {other:?}"),
    }
}
