//! # Lifecycle Service
//!
//! Initiator side of every direct-channel transition plus the read-only
//! queries. Each transition follows the same two-phase shape:
//!
//! 1. reserve the channel and derive the next state from the replica,
//!    nothing committed; conflicting transitions are refused until the
//!    reservation commits or drops
//! 2. sign the commitment and send it to the counterparty
//! 3. the counterparty validates, commits and countersigns
//! 4. verify the countersignature, then commit through the reservation;
//!    if the local copy moved in between, fault the channel
//!
//! The responder side lives in `handlers.rs`.

use crate::context::ChannelContext;
use crate::domain::{
    apply_update, build_app_instance, install_into, uninstall_from, validate_final_balances,
    AppError, Commitment, LifecycleError,
};
use crate::ports::AppLifecycleApi;
use async_trait::async_trait;
use sc_01_channel_store::{AppInstance, InFlight, StateChannel, StoreError, TransitionKind};
use sc_02_free_balance::BalanceError;
use sc_05_peer_messaging::{BridgeError, ProtocolMessage, StateUpdate};
use serde_json::Value;
use shared_bus::{ChannelCreatedEvent, DepositEvent, NodeEvent, RejectInstallEvent, StateUpdatedEvent, UninstallEvent};
use shared_types::{
    Address, AppInstanceDetailsResult, AppInstanceId, AppInstanceIdParams, AppInstanceProposal,
    AppInstancesResult, Balances, ChannelAddressesResult, CreateChannelParams,
    CreateChannelResult, DepositParams, DepositResult, ErrorCode, FreeBalanceInfo,
    GetStateResult, InstallResult, NewStateResult, PeerIdentity, ProposeInstallParams,
    ProposeInstallResult, ProposedAppInstancesResult, RejectInstallResult, StateChannelResult,
    TakeActionParams, UninstallParams, UninstallResult, UpdateStateParams, VirtualRoute,
};
use tracing::{debug, info};

/// Direct-channel lifecycle of one node.
pub struct AppLifecycleManager {
    pub(crate) ctx: ChannelContext,
}

impl AppLifecycleManager {
    pub fn new(ctx: ChannelContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ChannelContext {
        &self.ctx
    }

    pub(crate) fn me(&self) -> &PeerIdentity {
        &self.ctx.me
    }

    /// Open channel shared with `peer`.
    pub fn direct_channel(&self, peer: &PeerIdentity) -> Result<StateChannel, LifecycleError> {
        let channel = self
            .ctx
            .store
            .channel_with(peer)
            .ok_or_else(|| LifecycleError::NoChannelWith(peer.clone()))?;
        channel.ensure_open()?;
        Ok(channel)
    }

    pub(crate) fn channel(&self, multisig: &Address) -> Result<StateChannel, LifecycleError> {
        Ok(self
            .ctx
            .store
            .get(multisig)
            .ok_or(StoreError::NoStateChannel(*multisig))?)
    }

    /// Encode the proposal's initial state and build the app instance that
    /// a channel with the given `balances` would hold.
    pub fn prepare_app(
        &self,
        proposal: &AppInstanceProposal,
        balances: Balances,
    ) -> Result<AppInstance, LifecycleError> {
        let definition = self.ctx.registry.get(&proposal.app.definition)?;
        let encoded = definition.encode_state(&proposal.initial_state)?;
        let state_hash = definition.state_hash(&encoded);
        Ok(build_app_instance(proposal, balances, encoded, state_hash))
    }

    /// Deposits keyed by the two end parties.
    pub fn end_balances(proposal: &AppInstanceProposal) -> Balances {
        let mut balances = Balances::new();
        balances.insert(proposal.initiator.clone(), proposal.initiator_deposit);
        balances.insert(proposal.responder.clone(), proposal.responder_deposit);
        balances
    }

    // =========================================================================
    // STATE UPDATES
    // =========================================================================

    /// Sign and send a new app state, then commit once countersigned.
    /// Virtual apps travel end to end as a relayed update.
    async fn submit_update(
        &self,
        multisig: Address,
        app: AppInstance,
        new_state: Value,
        action: Option<Value>,
    ) -> Result<NewStateResult, LifecycleError> {
        let counterparty = app.counterparty_of(self.me()).cloned().ok_or_else(|| {
            LifecycleError::InvalidParams(format!(
                "{} is not an end party of app {}",
                self.me(),
                app.id
            ))
        })?;

        let definition = self.ctx.registry.get(&app.app.definition)?;
        let encoded = definition.encode_state(&new_state)?;
        let state_hash = definition.state_hash(&encoded);
        let local_nonce = app.local_nonce + 1;
        // `new_state` was derived from `app`; it must still be the latest.
        let (reservation, ()) = self.ctx.store.reserve(
            &multisig,
            InFlight::new(self.me().clone(), TransitionKind::Update(app.id.clone())),
            |channel| -> Result<_, LifecycleError> {
                channel.ensure_open()?;
                let current = channel
                    .app(&app.id)
                    .ok_or_else(|| LifecycleError::NoSuchAppInstance(app.id.clone()))?;
                if current.local_nonce != app.local_nonce {
                    return Err(LifecycleError::StaleNonce {
                        expected: current.local_nonce + 1,
                        got: local_nonce,
                    });
                }
                Ok(())
            },
        )?;
        let (digest, signature) = self.ctx.sign(&Commitment::Update {
            app_instance_id: app.id.clone(),
            local_nonce,
            state_hash,
        })?;
        let update = StateUpdate {
            app_instance_id: app.id.clone(),
            new_state: new_state.clone(),
            action: action.clone(),
            local_nonce,
            state_hash,
            signature,
        };

        let (next_hop, message) = if app.is_virtual() {
            let route = VirtualRoute::new(&app.initiator, &app.intermediaries, &app.responder);
            let next = route
                .next_hop(self.me(), &counterparty)
                .cloned()
                .ok_or_else(|| LifecycleError::InvalidParams("broken virtual route".to_string()))?;
            (
                next,
                ProtocolMessage::RelayUpdate {
                    toward: counterparty.clone(),
                    update,
                },
            )
        } else {
            (
                counterparty.clone(),
                ProtocolMessage::UpdateState {
                    multisig_address: multisig,
                    update,
                },
            )
        };

        let reply = self.ctx.bridge.request(&next_hop, message).await?;
        if let Err(reason) = self.ctx.check_countersignature(&counterparty, &digest, &reply) {
            return Err(self.ctx.fault(&multisig, reason).await);
        }

        let id = app.id.clone();
        let committed_state = new_state.clone();
        let committed = reservation.commit(|channel| {
            channel.ensure_open()?;
            let app = channel
                .app_mut(&id)
                .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
            apply_update(app, committed_state, encoded, state_hash, local_nonce)
        });
        self.ctx.settle_commit(&multisig, committed).await?;

        info!(
            app_instance_id = %app.id,
            local_nonce,
            "[sc-03] App state updated"
        );
        self.ctx
            .publish(NodeEvent::UpdateState(StateUpdatedEvent {
                app_instance_id: app.id,
                new_state: new_state.clone(),
                action,
                local_nonce,
                state_hash,
            }))
            .await;
        Ok(NewStateResult { new_state })
    }
}

#[async_trait]
impl AppLifecycleApi for AppLifecycleManager {
    async fn create_channel(
        &self,
        params: CreateChannelParams,
    ) -> Result<CreateChannelResult, LifecycleError> {
        let counterparty = params.counterparty;
        if counterparty == *self.me() {
            return Err(LifecycleError::InvalidParams(
                "cannot open a channel with oneself".to_string(),
            ));
        }
        if let Some(existing) = self.ctx.store.channel_with(&counterparty) {
            return Err(StoreError::ChannelExists(existing.multisig_address).into());
        }

        let mut owners = [self.me().clone(), counterparty.clone()];
        owners.sort();
        let multisig = self.ctx.chain.deploy_multisig(&owners)?;

        self.ctx
            .bridge
            .request(
                &counterparty,
                ProtocolMessage::Setup {
                    multisig_address: multisig,
                    owners: owners.clone(),
                },
            )
            .await?;

        self.ctx.store.insert_channel(StateChannel::new(
            multisig,
            owners[0].clone(),
            owners[1].clone(),
        ))?;
        info!(multisig = ?multisig, peer = %counterparty, "[sc-03] Channel created");
        self.ctx
            .publish(NodeEvent::CreateChannel(ChannelCreatedEvent {
                multisig_address: multisig,
                owners: owners.clone(),
                counterparty,
            }))
            .await;

        Ok(CreateChannelResult {
            multisig_address: multisig,
            owners,
        })
    }

    async fn deposit(&self, params: DepositParams) -> Result<DepositResult, LifecycleError> {
        let multisig = params.multisig_address;
        let amount = params.amount;
        if amount.is_zero() {
            return Err(LifecycleError::InvalidParams(
                "deposit amount must be positive".to_string(),
            ));
        }
        let me = self.me().clone();
        let (reservation, (counterparty, deposited)) = self.ctx.store.reserve(
            &multisig,
            InFlight::new(me.clone(), TransitionKind::Deposit),
            |channel| -> Result<_, LifecycleError> {
                channel.ensure_open()?;
                let counterparty = channel
                    .counterparty(&me)
                    .cloned()
                    .ok_or_else(|| LifecycleError::InvalidOwners(format!("{me} not in channel")))?;
                let deposited = channel
                    .deposited_by(&me)
                    .checked_add(amount)
                    .ok_or(BalanceError::Overflow)?;
                Ok((counterparty, deposited))
            },
        )?;

        self.ctx.chain.fund(&multisig, &me, amount)?;

        let mut working = self.channel(&multisig)?;
        self.ctx.reconciler.apply_deposit(&mut working, &me, amount)?;
        let (digest, signature) = self.ctx.sign(&Commitment::Deposit {
            multisig,
            participant: me.clone(),
            deposited,
        })?;

        let reply = self
            .ctx
            .bridge
            .request(
                &counterparty,
                ProtocolMessage::Deposit {
                    multisig_address: multisig,
                    amount,
                    signature,
                },
            )
            .await?;
        if let Err(reason) = self.ctx.check_countersignature(&counterparty, &digest, &reply) {
            return Err(self.ctx.fault(&multisig, reason).await);
        }

        // Counterparty deposits may have landed meanwhile; only ours must
        // be where we signed it.
        let committed = reservation.commit(|channel| {
            channel.ensure_open()?;
            self.ctx.reconciler.apply_deposit(channel, &me, amount)?;
            if channel.deposited_by(&me) != deposited {
                return Err(LifecycleError::Consistency(format!(
                    "deposit of {me} moved to {} while waiting for {counterparty}",
                    channel.deposited_by(&me)
                )));
            }
            Ok(channel.free_balance.balances().clone())
        });
        let free_balance = self.ctx.settle_commit(&multisig, committed).await?;

        info!(multisig = ?multisig, amount = %amount, "[sc-03] Deposit recorded");
        self.ctx
            .publish(NodeEvent::Deposit(DepositEvent {
                multisig_address: multisig,
                depositor: self.me().clone(),
                amount,
                free_balance: free_balance.clone(),
            }))
            .await;
        Ok(DepositResult {
            multisig_address: multisig,
            free_balance,
        })
    }

    async fn propose_install(
        &self,
        params: ProposeInstallParams,
    ) -> Result<ProposeInstallResult, LifecycleError> {
        let counterparty = params.proposed_to_identifier;
        let channel = self.direct_channel(&counterparty)?;
        let proposal = AppInstanceProposal {
            app_instance_id: AppInstanceId::generate(),
            app: params.app,
            initial_state: params.initial_state,
            initiator: self.me().clone(),
            responder: counterparty.clone(),
            initiator_deposit: params.my_deposit,
            responder_deposit: params.peer_deposit,
            timeout: params.timeout,
            intermediaries: Vec::new(),
        };
        self.prepare_app(&proposal, Self::end_balances(&proposal))?;
        self.ctx
            .reconciler
            .check_funding(&channel, &Self::end_balances(&proposal))?;

        self.ctx
            .bridge
            .request(
                &counterparty,
                ProtocolMessage::ProposeInstall {
                    proposal: proposal.clone(),
                },
            )
            .await?;

        let id = proposal.app_instance_id.clone();
        self.ctx.store.insert_proposal(proposal.clone());
        info!(app_instance_id = %id, peer = %counterparty, "[sc-03] Install proposed");
        self.ctx.publish(NodeEvent::ProposeInstall(proposal)).await;
        Ok(ProposeInstallResult {
            app_instance_id: id,
        })
    }

    async fn reject_install(
        &self,
        params: AppInstanceIdParams,
    ) -> Result<RejectInstallResult, LifecycleError> {
        let id = params.app_instance_id;
        let proposal = self
            .ctx
            .store
            .proposal(&id)
            .ok_or_else(|| StoreError::NoSuchProposal(id.clone()))?;
        let counterparty = proposal.counterparty_of(self.me()).cloned().ok_or_else(|| {
            LifecycleError::InvalidParams(format!("{} is not an end party of {}", self.me(), id))
        })?;
        let next_hop = if proposal.is_virtual() {
            proposal
                .route()
                .next_hop(self.me(), &counterparty)
                .cloned()
                .ok_or_else(|| LifecycleError::InvalidParams("broken virtual route".to_string()))?
        } else {
            counterparty
        };

        let sent = self
            .ctx
            .bridge
            .request(
                &next_hop,
                ProtocolMessage::RejectInstall {
                    app_instance_id: id.clone(),
                },
            )
            .await;
        match sent {
            Ok(_) => {}
            // Already gone at the peer.
            Err(BridgeError::Rejected(e)) if e.code == ErrorCode::NoSuchProposal => {}
            Err(e) => return Err(e.into()),
        }

        self.ctx.store.take_proposal(&id)?;
        info!(app_instance_id = %id, "[sc-03] Proposal rejected");
        self.ctx
            .publish(NodeEvent::RejectInstall(RejectInstallEvent {
                app_instance_id: id.clone(),
                rejected_by: self.me().clone(),
            }))
            .await;
        Ok(RejectInstallResult {
            app_instance_id: id,
        })
    }

    async fn install(&self, params: AppInstanceIdParams) -> Result<InstallResult, LifecycleError> {
        let id = params.app_instance_id;
        if id.is_empty() {
            return Err(LifecycleError::NoAppInstanceIdToInstall);
        }
        let proposal = self
            .ctx
            .store
            .proposal(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        if proposal.is_virtual() {
            return Err(LifecycleError::InvalidParams(format!(
                "{id} is a virtual app, use INSTALL_VIRTUAL"
            )));
        }
        let counterparty = proposal.counterparty_of(self.me()).cloned().ok_or_else(|| {
            LifecycleError::InvalidParams(format!("{} is not an end party of {}", self.me(), id))
        })?;
        let multisig = self.direct_channel(&counterparty)?.multisig_address;
        let app = self.prepare_app(&proposal, Self::end_balances(&proposal))?;

        let (reservation, dependency_nonce) = self.ctx.store.reserve(
            &multisig,
            InFlight::new(self.me().clone(), TransitionKind::Structural(id.clone())),
            |channel| -> Result<_, LifecycleError> {
                install_into(&mut channel.clone(), app.clone(), &self.ctx.reconciler)
            },
        )?;
        let (digest, signature) = self.ctx.sign(&Commitment::Install {
            multisig,
            dependency_nonce,
            app_instance_id: id.clone(),
            balances: app.balances.clone(),
            state_hash: app.state_hash,
        })?;

        let reply = self
            .ctx
            .bridge
            .request(
                &counterparty,
                ProtocolMessage::Install {
                    multisig_address: multisig,
                    app_instance_id: id.clone(),
                    dependency_nonce,
                    signature,
                },
            )
            .await?;
        if let Err(reason) = self.ctx.check_countersignature(&counterparty, &digest, &reply) {
            return Err(self.ctx.fault(&multisig, reason).await);
        }

        let committed = reservation.commit(|channel| {
            let nonce = install_into(channel, app.clone(), &self.ctx.reconciler)?;
            if nonce != dependency_nonce {
                return Err(LifecycleError::Consistency(format!(
                    "dependency nonce moved to {nonce}, expected {dependency_nonce}"
                )));
            }
            Ok(())
        });
        self.ctx.settle_commit(&multisig, committed).await?;
        if let Err(e) = self.ctx.store.take_proposal(&id) {
            debug!(app_instance_id = %id, error = %e, "[sc-03] Proposal already cleared");
        }

        let info = app.info();
        info!(app_instance_id = %id, multisig = ?multisig, dependency_nonce, "[sc-03] App installed");
        self.ctx.publish(NodeEvent::Install(info.clone())).await;
        Ok(InstallResult { app_instance: info })
    }

    async fn take_action(
        &self,
        params: TakeActionParams,
    ) -> Result<NewStateResult, LifecycleError> {
        let id = params.app_instance_id;
        if id.is_empty() {
            return Err(LifecycleError::NoAppInstanceForTakeAction(id));
        }
        let (multisig, app) = self
            .ctx
            .store
            .find_app(&id)
            .ok_or_else(|| LifecycleError::NoAppInstanceForTakeAction(id.clone()))?;

        if app.app.action_encoding.is_none() {
            return Err(AppError::InvalidAction(format!("app {id} has no action encoding")).into());
        }
        let definition = self.ctx.registry.get(&app.app.definition)?;
        let new_state = definition.apply_action(&app.state, &params.action)?;
        self.submit_update(multisig, app, new_state, Some(params.action))
            .await
    }

    async fn update_state(
        &self,
        params: UpdateStateParams,
    ) -> Result<NewStateResult, LifecycleError> {
        let id = params.app_instance_id;
        let (multisig, app) = self
            .ctx
            .store
            .find_app(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        self.submit_update(multisig, app, params.new_state, None).await
    }

    async fn uninstall(&self, params: UninstallParams) -> Result<UninstallResult, LifecycleError> {
        let id = params.app_instance_id;
        let final_balances = params.final_balances;
        let (multisig, app) = self
            .ctx
            .store
            .find_app(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        if app.is_virtual() {
            return Err(LifecycleError::InvalidParams(format!(
                "{id} is a virtual app, use UNINSTALL_VIRTUAL"
            )));
        }
        let counterparty = app.counterparty_of(self.me()).cloned().ok_or_else(|| {
            LifecycleError::InvalidParams(format!("{} is not an end party of {}", self.me(), id))
        })?;
        validate_final_balances(&app, &final_balances)?;

        let (reservation, dependency_nonce) = self.ctx.store.reserve(
            &multisig,
            InFlight::new(self.me().clone(), TransitionKind::Structural(id.clone())),
            |channel| -> Result<_, LifecycleError> {
                let mut working = channel.clone();
                uninstall_from(&mut working, &id, &final_balances, &self.ctx.reconciler)?;
                Ok(working.dependency_nonce)
            },
        )?;
        let (digest, signature) = self.ctx.sign(&Commitment::Uninstall {
            multisig,
            dependency_nonce,
            app_instance_id: id.clone(),
            final_balances: final_balances.clone(),
        })?;

        let reply = self
            .ctx
            .bridge
            .request(
                &counterparty,
                ProtocolMessage::Uninstall {
                    multisig_address: multisig,
                    app_instance_id: id.clone(),
                    final_balances: final_balances.clone(),
                    dependency_nonce,
                    signature,
                },
            )
            .await?;
        if let Err(reason) = self.ctx.check_countersignature(&counterparty, &digest, &reply) {
            return Err(self.ctx.fault(&multisig, reason).await);
        }

        let committed = reservation.commit(|channel| {
            uninstall_from(channel, &id, &final_balances, &self.ctx.reconciler)?;
            if channel.dependency_nonce != dependency_nonce {
                return Err(LifecycleError::Consistency(format!(
                    "dependency nonce moved to {}, expected {dependency_nonce}",
                    channel.dependency_nonce
                )));
            }
            Ok(channel.free_balance.balances().clone())
        });
        let free_balance = self.ctx.settle_commit(&multisig, committed).await?;

        info!(app_instance_id = %id, multisig = ?multisig, dependency_nonce, "[sc-03] App uninstalled");
        self.ctx
            .publish(NodeEvent::Uninstall(UninstallEvent {
                app_instance_id: id.clone(),
                final_balances,
                free_balance: free_balance.clone(),
            }))
            .await;
        Ok(UninstallResult {
            app_instance_id: id,
            free_balance,
        })
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    fn app_instance_details(
        &self,
        id: &AppInstanceId,
    ) -> Result<AppInstanceDetailsResult, LifecycleError> {
        let (_, app) = self
            .ctx
            .store
            .find_app(id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        Ok(AppInstanceDetailsResult {
            app_instance: app.info(),
        })
    }

    fn app_instances(&self) -> AppInstancesResult {
        AppInstancesResult {
            app_instances: self.ctx.store.apps().iter().map(AppInstance::info).collect(),
        }
    }

    fn proposed_app_instances(&self) -> ProposedAppInstancesResult {
        ProposedAppInstancesResult {
            app_instances: self.ctx.store.proposals(),
        }
    }

    fn app_state(&self, id: &AppInstanceId) -> Result<GetStateResult, LifecycleError> {
        let (_, app) = self
            .ctx
            .store
            .find_app(id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        Ok(GetStateResult { state: app.state })
    }

    fn free_balance(&self, multisig: &Address) -> Result<FreeBalanceInfo, LifecycleError> {
        Ok(self.channel(multisig)?.free_balance_info())
    }

    fn state_channel(&self, multisig: &Address) -> Result<StateChannelResult, LifecycleError> {
        Ok(StateChannelResult {
            state_channel: self.channel(multisig)?.info(self.me()),
        })
    }

    fn channel_addresses(&self) -> ChannelAddressesResult {
        ChannelAddressesResult {
            multisig_addresses: self.ctx.store.addresses(),
        }
    }
}
