//! # Responder Handlers
//!
//! Counterparty side of the direct-channel handshakes. Each handler
//! validates the incoming transition against the local replica, commits it
//! under the channel lock and answers with a countersignature. Nothing is
//! committed when validation fails, or when a transition of ours that the
//! incoming one crosses takes precedence.

use crate::domain::{apply_update, install_into, uninstall_from, validate_final_balances, AppError, Commitment, LifecycleError};
use crate::service::AppLifecycleManager;
use async_trait::async_trait;
use sc_01_channel_store::{InFlight, StateChannel, StoreError, TransitionKind};
use sc_05_peer_messaging::{InboundHandler, ProtocolMessage, ProtocolReply, StateUpdate};
use shared_bus::{ChannelCreatedEvent, DepositEvent, NodeEvent, RejectInstallEvent, StateUpdatedEvent, UninstallEvent};
use shared_types::{
    Address, Amount, ApiError, AppInstanceId, AppInstanceProposal, Balances, CommitmentSignature,
    PeerIdentity,
};
use tracing::{debug, error, info, warn};

impl AppLifecycleManager {
    async fn on_setup(
        &self,
        from: &PeerIdentity,
        multisig: Address,
        owners: [PeerIdentity; 2],
    ) -> Result<ProtocolReply, LifecycleError> {
        if !owners.contains(self.me()) || !owners.contains(from) || owners[0] == owners[1] {
            return Err(LifecycleError::InvalidOwners(format!(
                "owners {} and {} do not match {} and {}",
                owners[0],
                owners[1],
                from,
                self.me()
            )));
        }
        let on_chain = self.ctx.chain.multisig_owners(&multisig)?;
        let mut expected = owners.clone();
        expected.sort();
        let mut deployed = on_chain;
        deployed.sort();
        if deployed != expected {
            return Err(LifecycleError::InvalidOwners(format!(
                "multisig {multisig:?} is owned by {} and {}",
                deployed[0], deployed[1]
            )));
        }
        if let Some(existing) = self.ctx.store.channel_with(from) {
            return Err(StoreError::ChannelExists(existing.multisig_address).into());
        }

        self.ctx
            .store
            .insert_channel(StateChannel::new(multisig, owners[0].clone(), owners[1].clone()))?;
        info!(multisig = ?multisig, peer = %from, "[sc-03] Channel opened by counterparty");
        self.ctx
            .publish(NodeEvent::CreateChannel(ChannelCreatedEvent {
                multisig_address: multisig,
                owners: expected,
                counterparty: from.clone(),
            }))
            .await;
        Ok(ProtocolReply::Ack)
    }

    async fn on_deposit(
        &self,
        from: &PeerIdentity,
        multisig: Address,
        amount: Amount,
        signature: CommitmentSignature,
    ) -> Result<ProtocolReply, LifecycleError> {
        let incoming = InFlight::new(from.clone(), TransitionKind::Deposit);
        let (digest, free_balance) = self.ctx.store.accept(&multisig, &incoming, |channel| {
            channel.ensure_open()?;
            self.ctx.reconciler.apply_deposit(channel, from, amount)?;
            let digest = self.ctx.verify(
                from,
                &Commitment::Deposit {
                    multisig,
                    participant: from.clone(),
                    deposited: channel.deposited_by(from),
                },
                &signature,
            )?;
            Ok::<_, LifecycleError>((digest, channel.free_balance.balances().clone()))
        })?;

        info!(multisig = ?multisig, depositor = %from, amount = %amount, "[sc-03] Counterparty deposit recorded");
        self.ctx
            .publish(NodeEvent::Deposit(DepositEvent {
                multisig_address: multisig,
                depositor: from.clone(),
                amount,
                free_balance,
            }))
            .await;
        Ok(self.ctx.countersign(digest))
    }

    async fn on_propose(
        &self,
        from: &PeerIdentity,
        proposal: AppInstanceProposal,
    ) -> Result<ProtocolReply, LifecycleError> {
        if proposal.is_virtual() {
            return Err(LifecycleError::InvalidParams(
                "virtual proposals travel as PROPOSE_VIRTUAL".to_string(),
            ));
        }
        if proposal.responder != *self.me() || proposal.initiator != *from {
            return Err(LifecycleError::InvalidParams(format!(
                "proposal {} is not from {} to {}",
                proposal.app_instance_id,
                from,
                self.me()
            )));
        }
        let channel = self.direct_channel(from)?;
        self.prepare_app(&proposal, Self::end_balances(&proposal))?;
        self.ctx
            .reconciler
            .check_funding(&channel, &Self::end_balances(&proposal))?;

        info!(app_instance_id = %proposal.app_instance_id, peer = %from, "[sc-03] Install proposal received");
        self.ctx.store.insert_proposal(proposal.clone());
        self.ctx.publish(NodeEvent::ProposeInstall(proposal)).await;
        Ok(ProtocolReply::Ack)
    }

    async fn on_reject(
        &self,
        from: &PeerIdentity,
        id: AppInstanceId,
    ) -> Result<ProtocolReply, LifecycleError> {
        let proposal = self.ctx.store.take_proposal(&id)?;

        match proposal.counterparty_of(self.me()) {
            Some(counterparty) => {
                info!(app_instance_id = %id, "[sc-03] Proposal rejected by counterparty");
                self.ctx
                    .publish(NodeEvent::RejectInstall(RejectInstallEvent {
                        app_instance_id: id,
                        rejected_by: counterparty.clone(),
                    }))
                    .await;
            }
            None => {
                // Intermediary: pass it on to the end that has not heard yet.
                let route = proposal.route();
                let next = route
                    .far_end(from, self.me())
                    .and_then(|target| route.next_hop(self.me(), target))
                    .cloned();
                if let Some(next) = next {
                    let forwarded = self
                        .ctx
                        .bridge
                        .request(&next, ProtocolMessage::RejectInstall { app_instance_id: id.clone() })
                        .await;
                    if let Err(e) = forwarded {
                        warn!(app_instance_id = %id, next = %next, error = %e, "[sc-03] Could not forward rejection");
                    }
                }
            }
        }
        Ok(ProtocolReply::Ack)
    }

    async fn on_install(
        &self,
        from: &PeerIdentity,
        multisig: Address,
        id: AppInstanceId,
        dependency_nonce: u64,
        signature: CommitmentSignature,
    ) -> Result<ProtocolReply, LifecycleError> {
        let proposal = self
            .ctx
            .store
            .proposal(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        if proposal.is_virtual() || proposal.counterparty_of(self.me()) != Some(from) {
            return Err(LifecycleError::InvalidParams(format!(
                "{from} cannot install proposal {id}"
            )));
        }
        let app = self.prepare_app(&proposal, Self::end_balances(&proposal))?;

        let incoming = InFlight::new(from.clone(), TransitionKind::Structural(id.clone()));
        let digest = self.ctx.store.accept(&multisig, &incoming, |channel| {
            channel.ensure_open()?;
            if !channel.has_participant(from) {
                return Err(LifecycleError::InvalidOwners(format!("{from} not in channel")));
            }
            let expected = channel.dependency_nonce + 1;
            if dependency_nonce != expected {
                return Err(LifecycleError::StaleNonce {
                    expected,
                    got: dependency_nonce,
                });
            }
            let commitment = Commitment::Install {
                multisig,
                dependency_nonce,
                app_instance_id: id.clone(),
                balances: app.balances.clone(),
                state_hash: app.state_hash,
            };
            let digest = self.ctx.verify(from, &commitment, &signature)?;
            install_into(channel, app.clone(), &self.ctx.reconciler)?;
            Ok(digest)
        })?;
        if let Err(e) = self.ctx.store.take_proposal(&id) {
            debug!(app_instance_id = %id, error = %e, "[sc-03] Proposal already cleared");
        }

        info!(app_instance_id = %id, multisig = ?multisig, dependency_nonce, "[sc-03] App installed by counterparty");
        self.ctx.publish(NodeEvent::Install(app.info())).await;
        Ok(self.ctx.countersign(digest))
    }

    /// Validate and commit a counterparty's state update.
    ///
    /// `via` is the channel the update arrived on for a direct app; relayed
    /// virtual updates pass `None` and are checked against the end party's
    /// signature only.
    pub async fn accept_update(
        &self,
        from: &PeerIdentity,
        update: StateUpdate,
        via: Option<Address>,
    ) -> Result<ProtocolReply, LifecycleError> {
        let id = update.app_instance_id.clone();
        let (multisig, app) = self
            .ctx
            .store
            .find_app(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        let counterparty = app.counterparty_of(self.me()).cloned().ok_or_else(|| {
            LifecycleError::InvalidParams(format!("{} is not an end party of {}", self.me(), id))
        })?;
        if let Some(channel) = via {
            if channel != multisig || *from != counterparty {
                return Err(LifecycleError::InvalidParams(format!(
                    "update for {id} arrived on the wrong channel"
                )));
            }
        } else if !app.is_virtual() {
            return Err(LifecycleError::InvalidParams(format!(
                "{id} is a direct app and cannot be relayed"
            )));
        }

        let definition = self.ctx.registry.get(&app.app.definition)?;
        let incoming = InFlight::new(counterparty.clone(), TransitionKind::Update(id.clone()));
        let digest = self.ctx.store.accept(&multisig, &incoming, |channel| {
            channel.ensure_open()?;
            let app = channel
                .app_mut(&id)
                .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
            let expected = app.local_nonce + 1;
            if update.local_nonce != expected {
                return Err(LifecycleError::StaleNonce {
                    expected,
                    got: update.local_nonce,
                });
            }
            if let Some(action) = &update.action {
                let recomputed = definition.apply_action(&app.state, action)?;
                if recomputed != update.new_state {
                    return Err(AppError::InvalidAction(format!(
                        "action does not lead to the proposed state of {id}"
                    ))
                    .into());
                }
            }
            let encoded = definition.encode_state(&update.new_state)?;
            let state_hash = definition.state_hash(&encoded);
            if state_hash != update.state_hash {
                return Err(LifecycleError::StateHashMismatch(id.clone()));
            }
            let digest = self.ctx.verify(
                &counterparty,
                &Commitment::Update {
                    app_instance_id: id.clone(),
                    local_nonce: update.local_nonce,
                    state_hash,
                },
                &update.signature,
            )?;
            apply_update(app, update.new_state.clone(), encoded, state_hash, update.local_nonce)?;
            Ok(digest)
        })?;

        info!(app_instance_id = %id, local_nonce = update.local_nonce, "[sc-03] Counterparty state update accepted");
        self.ctx
            .publish(NodeEvent::UpdateState(StateUpdatedEvent {
                app_instance_id: id,
                new_state: update.new_state,
                action: update.action,
                local_nonce: update.local_nonce,
                state_hash: update.state_hash,
            }))
            .await;
        Ok(self.ctx.countersign(digest))
    }

    async fn on_uninstall(
        &self,
        from: &PeerIdentity,
        multisig: Address,
        id: AppInstanceId,
        final_balances: Balances,
        dependency_nonce: u64,
        signature: CommitmentSignature,
    ) -> Result<ProtocolReply, LifecycleError> {
        let incoming = InFlight::new(from.clone(), TransitionKind::Structural(id.clone()));
        let (digest, free_balance) = self.ctx.store.accept(&multisig, &incoming, |channel| {
            channel.ensure_open()?;
            let app = channel
                .app(&id)
                .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
            if app.is_virtual() || app.counterparty_of(self.me()) != Some(from) {
                return Err(LifecycleError::InvalidParams(format!(
                    "{from} cannot uninstall {id}"
                )));
            }
            validate_final_balances(app, &final_balances)?;
            let expected = channel.dependency_nonce + 1;
            if dependency_nonce != expected {
                return Err(LifecycleError::StaleNonce {
                    expected,
                    got: dependency_nonce,
                });
            }
            let digest = self.ctx.verify(
                from,
                &Commitment::Uninstall {
                    multisig,
                    dependency_nonce,
                    app_instance_id: id.clone(),
                    final_balances: final_balances.clone(),
                },
                &signature,
            )?;
            uninstall_from(channel, &id, &final_balances, &self.ctx.reconciler)?;
            Ok((digest, channel.free_balance.balances().clone()))
        })?;

        info!(app_instance_id = %id, multisig = ?multisig, dependency_nonce, "[sc-03] App uninstalled by counterparty");
        self.ctx
            .publish(NodeEvent::Uninstall(UninstallEvent {
                app_instance_id: id,
                final_balances,
                free_balance,
            }))
            .await;
        Ok(self.ctx.countersign(digest))
    }
}

#[async_trait]
impl InboundHandler for AppLifecycleManager {
    async fn handle(
        &self,
        from: &PeerIdentity,
        message: ProtocolMessage,
    ) -> Result<ProtocolReply, ApiError> {
        let kind = message.kind();
        let result = match message {
            ProtocolMessage::Setup {
                multisig_address,
                owners,
            } => self.on_setup(from, multisig_address, owners).await,
            ProtocolMessage::Deposit {
                multisig_address,
                amount,
                signature,
            } => self.on_deposit(from, multisig_address, amount, signature).await,
            ProtocolMessage::ProposeInstall { proposal } => self.on_propose(from, proposal).await,
            ProtocolMessage::RejectInstall { app_instance_id } => {
                self.on_reject(from, app_instance_id).await
            }
            ProtocolMessage::Install {
                multisig_address,
                app_instance_id,
                dependency_nonce,
                signature,
            } => {
                self.on_install(from, multisig_address, app_instance_id, dependency_nonce, signature)
                    .await
            }
            ProtocolMessage::UpdateState {
                multisig_address,
                update,
            } => self.accept_update(from, update, Some(multisig_address)).await,
            ProtocolMessage::Uninstall {
                multisig_address,
                app_instance_id,
                final_balances,
                dependency_nonce,
                signature,
            } => {
                self.on_uninstall(
                    from,
                    multisig_address,
                    app_instance_id,
                    final_balances,
                    dependency_nonce,
                    signature,
                )
                .await
            }
            other => Err(LifecycleError::InvalidParams(format!(
                "{} is not a direct-channel message",
                other.kind()
            ))),
        };

        result.map_err(|e| {
            if e.is_consistency() {
                error!(kind = %kind, peer = %from, error = %e, "[sc-03] Inbound transition broke channel consistency");
            } else {
                warn!(kind = %kind, peer = %from, error = %e, "[sc-03] Rejected inbound transition");
            }
            ApiError::from(e)
        })
    }
}
