//! # Router Service
//!
//! Installs a virtual app as a chain of per-hop app copies. Every node on
//! the route plays the same role for the hop it receives on: validate the
//! upstream hop on a working copy, pass the message downstream, and commit
//! the upstream hop only once everything downstream committed.
//!
//! ```text
//!   A                     B                     C
//!   | INSTALL_VIRTUAL ──▶ | validate A–B        |
//!   |                     | INSTALL_VIRTUAL ──▶ | validate + commit B–C
//!   |                     | ◀── countersigned   |
//!   |                     | commit B–C, A–B     |
//!   | ◀── countersigned   |                     |
//!   | commit A–B          |                     |
//! ```
//!
//! A failure anywhere downstream leaves every upstream hop untouched. A
//! failure to commit upstream after downstream committed is undone with a
//! refund release down the chain.

use crate::domain::{checked_route, hop_balances, release_balances, RouterError};
use crate::ports::VirtualRoutingApi;
use async_trait::async_trait;
use sc_01_channel_store::{AppInstance, InFlight, StateChannel, TransitionKind};
use sc_03_app_lifecycle::domain::{install_into, uninstall_from, validate_final_balances};
use sc_03_app_lifecycle::{AppLifecycleManager, ChannelContext, Commitment, LifecycleError};
use sc_05_peer_messaging::{InboundHandler, ProtocolMessage, ProtocolReply, StateUpdate};
use shared_bus::{NodeEvent, UninstallEvent};
use shared_types::{
    Address, ApiError, AppInstanceId, AppInstanceProposal, Balances, CommitmentSignature,
    InstallResult, InstallVirtualParams, PeerIdentity, ProposeInstallResult,
    ProposeInstallVirtualParams, StateHash, UninstallParams, UninstallResult, VirtualRoute,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Virtual-app routing for one node, at the ends and in the middle.
pub struct VirtualRouter {
    ctx: ChannelContext,
    lifecycle: Arc<AppLifecycleManager>,
}

impl VirtualRouter {
    pub fn new(lifecycle: Arc<AppLifecycleManager>) -> Self {
        Self {
            ctx: lifecycle.context().clone(),
            lifecycle,
        }
    }

    fn me(&self) -> &PeerIdentity {
        &self.ctx.me
    }

    fn next_toward(
        &self,
        route: &VirtualRoute,
        toward: &PeerIdentity,
    ) -> Result<PeerIdentity, RouterError> {
        route
            .next_hop(self.me(), toward)
            .cloned()
            .ok_or_else(|| RouterError::InvalidRoute(format!("no hop from {} toward {toward}", self.me())))
    }

    /// `from` must be our neighbour and `toward` an end of the route.
    fn check_leg(
        &self,
        route: &VirtualRoute,
        from: &PeerIdentity,
        toward: &PeerIdentity,
        app: &AppInstanceId,
    ) -> Result<(), RouterError> {
        if route.position(self.me()).is_none() {
            return Err(RouterError::NotOnRoute {
                peer: self.me().clone(),
                app: app.to_string(),
            });
        }
        if !route.adjacent(from, self.me()) || !route.is_end(toward) || toward == from {
            return Err(RouterError::InvalidRoute(format!(
                "message for {app} from {from} toward {toward} does not follow the route"
            )));
        }
        Ok(())
    }

    /// Hop transitions of a virtual app run on behalf of the end they
    /// started from, on every channel of the route.
    fn on_behalf_of(
        &self,
        route: &VirtualRoute,
        toward: &PeerIdentity,
        id: &AppInstanceId,
    ) -> Result<InFlight, RouterError> {
        let originator = route.opposite_end(toward).cloned().ok_or_else(|| {
            RouterError::InvalidRoute(format!("{toward} is not an end of the route of {id}"))
        })?;
        Ok(InFlight::new(originator, TransitionKind::Structural(id.clone())))
    }

    fn hop_channel(&self, peer: &PeerIdentity) -> Result<StateChannel, RouterError> {
        Ok(self.lifecycle.direct_channel(peer)?)
    }

    fn clear_proposal(&self, id: &AppInstanceId) {
        if let Err(e) = self.ctx.store.take_proposal(id) {
            debug!(app_instance_id = %id, error = %e, "[sc-04] Proposal already cleared");
        }
    }

    // =========================================================================
    // PROPOSE
    // =========================================================================

    async fn on_propose_virtual(
        &self,
        from: &PeerIdentity,
        proposal: AppInstanceProposal,
    ) -> Result<ProtocolReply, RouterError> {
        let id = proposal.app_instance_id.clone();
        let route = checked_route(&proposal)?;
        let responder = route.responder().clone();
        self.check_leg(&route, from, &responder, &id)?;

        let upstream = self.hop_channel(from)?;
        let balances = hop_balances(&route, &proposal, from, self.me())?;
        self.lifecycle.prepare_app(&proposal, balances.clone())?;
        self.ctx.reconciler.check_funding(&upstream, &balances)?;

        if *self.me() == responder {
            info!(app_instance_id = %id, initiator = %proposal.initiator, "[sc-04] Virtual install proposal received");
            self.ctx.store.insert_proposal(proposal.clone());
            self.ctx
                .publish(NodeEvent::ProposeInstallVirtual(proposal))
                .await;
            return Ok(ProtocolReply::Ack);
        }

        let next = self.next_toward(&route, &responder)?;
        let downstream = self.hop_channel(&next)?;
        let balances = hop_balances(&route, &proposal, self.me(), &next)?;
        self.ctx.reconciler.check_funding(&downstream, &balances)?;

        self.ctx
            .bridge
            .request(&next, ProtocolMessage::ProposeVirtual { proposal: proposal.clone() })
            .await?;
        info!(app_instance_id = %id, upstream = %from, downstream = %next, "[sc-04] Virtual proposal forwarded");
        self.ctx.store.insert_proposal(proposal);
        Ok(ProtocolReply::Ack)
    }

    // =========================================================================
    // INSTALL
    // =========================================================================

    /// Install the hop we share with `next` and everything beyond it.
    async fn install_hop(
        &self,
        proposal: &AppInstanceProposal,
        route: &VirtualRoute,
        next: &PeerIdentity,
        toward: &PeerIdentity,
    ) -> Result<AppInstance, RouterError> {
        let id = proposal.app_instance_id.clone();
        let multisig = self.hop_channel(next)?.multisig_address;
        let balances = hop_balances(route, proposal, self.me(), next)?;
        let app = self.lifecycle.prepare_app(proposal, balances)?;

        let (reservation, dependency_nonce) = self.ctx.store.reserve(
            &multisig,
            self.on_behalf_of(route, toward, &id)?,
            |channel| -> Result<_, RouterError> {
                Ok(install_into(&mut channel.clone(), app.clone(), &self.ctx.reconciler)?)
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
                next,
                ProtocolMessage::InstallVirtual {
                    app_instance_id: id.clone(),
                    toward: toward.clone(),
                    multisig_address: multisig,
                    dependency_nonce,
                    signature,
                },
            )
            .await?;
        if let Err(reason) = self.ctx.check_countersignature(next, &digest, &reply) {
            return Err(self.ctx.fault(&multisig, reason).await.into());
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
        info!(app_instance_id = %id, peer = %next, dependency_nonce, "[sc-04] Hop installed");
        Ok(app)
    }

    /// Checks an upstream install on `channel` and applies it.
    fn accept_install(
        &self,
        channel: &mut StateChannel,
        from: &PeerIdentity,
        app: &AppInstance,
        dependency_nonce: u64,
        signature: &CommitmentSignature,
    ) -> Result<StateHash, RouterError> {
        channel.ensure_open()?;
        if !channel.has_participant(from) {
            return Err(RouterError::InvalidRoute(format!(
                "{from} is not in channel {:?}",
                channel.multisig_address
            )));
        }
        let expected = channel.dependency_nonce + 1;
        if dependency_nonce != expected {
            return Err(LifecycleError::StaleNonce {
                expected,
                got: dependency_nonce,
            }
            .into());
        }
        let digest = self.ctx.verify(
            from,
            &Commitment::Install {
                multisig: channel.multisig_address,
                dependency_nonce,
                app_instance_id: app.id.clone(),
                balances: app.balances.clone(),
                state_hash: app.state_hash,
            },
            signature,
        )?;
        install_into(channel, app.clone(), &self.ctx.reconciler)?;
        Ok(digest)
    }

    async fn on_install_virtual(
        &self,
        from: &PeerIdentity,
        id: AppInstanceId,
        toward: PeerIdentity,
        multisig: Address,
        dependency_nonce: u64,
        signature: CommitmentSignature,
    ) -> Result<ProtocolReply, RouterError> {
        let proposal = self
            .ctx
            .store
            .proposal(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        let route = checked_route(&proposal)?;
        self.check_leg(&route, from, &toward, &id)?;

        let balances = hop_balances(&route, &proposal, from, self.me())?;
        let app = self.lifecycle.prepare_app(&proposal, balances)?;
        let incoming = self.on_behalf_of(&route, &toward, &id)?;

        if *self.me() != toward {
            // Validate and hold the upstream hop before anything downstream
            // is attempted.
            let (held, digest) = self.ctx.store.hold(&multisig, incoming, |channel| {
                self.accept_install(&mut channel.clone(), from, &app, dependency_nonce, &signature)
            })?;
            let next = self.next_toward(&route, &toward)?;
            self.install_hop(&proposal, &route, &next, &toward).await?;

            let committed = held.commit(|channel| {
                self.accept_install(channel, from, &app, dependency_nonce, &signature)
            });
            if let Err(e) = committed {
                error!(app_instance_id = %id, error = %e, "[sc-04] Upstream hop commit failed, refunding downstream");
                if let Err(refund) = self.release_hop(&id, &route, &next, &toward, None).await {
                    error!(app_instance_id = %id, error = %refund, "[sc-04] Refund release failed");
                }
                return Err(e);
            }
            self.clear_proposal(&id);
            info!(app_instance_id = %id, upstream = %from, downstream = %next, "[sc-04] Virtual app routed");
            return Ok(self.ctx.countersign(digest));
        }

        let digest = self.ctx.store.accept(&multisig, &incoming, |channel| {
            self.accept_install(channel, from, &app, dependency_nonce, &signature)
        })?;
        self.clear_proposal(&id);
        info!(app_instance_id = %id, "[sc-04] Virtual app installed by counterparty");
        self.ctx.publish(NodeEvent::InstallVirtual(app.info())).await;
        Ok(self.ctx.countersign(digest))
    }

    // =========================================================================
    // RELEASE
    // =========================================================================

    /// Release the hop we share with `next` and everything beyond it.
    /// `None` refunds each hop what it committed. Returns our free balance
    /// in that hop channel.
    async fn release_hop(
        &self,
        id: &AppInstanceId,
        route: &VirtualRoute,
        next: &PeerIdentity,
        toward: &PeerIdentity,
        final_balances: Option<&Balances>,
    ) -> Result<Balances, RouterError> {
        let channel = self.hop_channel(next)?;
        let multisig = channel.multisig_address;
        let app = channel
            .app(id)
            .cloned()
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        let release = release_balances(
            route,
            &app.balances,
            final_balances,
            self.me(),
            next,
            id.as_str(),
        )?;

        let (reservation, dependency_nonce) = self.ctx.store.reserve(
            &multisig,
            self.on_behalf_of(route, toward, id)?,
            |channel| -> Result<_, RouterError> {
                let mut working = channel.clone();
                uninstall_from(&mut working, id, &release, &self.ctx.reconciler)?;
                Ok(working.dependency_nonce)
            },
        )?;
        let (digest, signature) = self.ctx.sign(&Commitment::Uninstall {
            multisig,
            dependency_nonce,
            app_instance_id: id.clone(),
            final_balances: release.clone(),
        })?;

        let reply = self
            .ctx
            .bridge
            .request(
                next,
                ProtocolMessage::UninstallVirtual {
                    app_instance_id: id.clone(),
                    toward: toward.clone(),
                    multisig_address: multisig,
                    dependency_nonce,
                    final_balances: final_balances.cloned(),
                    signature,
                },
            )
            .await?;
        if let Err(reason) = self.ctx.check_countersignature(next, &digest, &reply) {
            return Err(self.ctx.fault(&multisig, reason).await.into());
        }

        let committed = reservation.commit(|channel| {
            uninstall_from(channel, id, &release, &self.ctx.reconciler)?;
            if channel.dependency_nonce != dependency_nonce {
                return Err(LifecycleError::Consistency(format!(
                    "dependency nonce moved to {}, expected {dependency_nonce}",
                    channel.dependency_nonce
                )));
            }
            Ok(channel.free_balance.balances().clone())
        });
        let free_balance = self.ctx.settle_commit(&multisig, committed).await?;
        info!(app_instance_id = %id, peer = %next, dependency_nonce, "[sc-04] Hop released");
        Ok(free_balance)
    }

    /// Checks an upstream release on `channel` and applies it. Returns the
    /// digest and the resulting free balance.
    fn accept_release(
        &self,
        channel: &mut StateChannel,
        from: &PeerIdentity,
        id: &AppInstanceId,
        release: &Balances,
        dependency_nonce: u64,
        signature: &CommitmentSignature,
    ) -> Result<(StateHash, Balances), RouterError> {
        channel.ensure_open()?;
        if !channel.has_participant(from) {
            return Err(RouterError::InvalidRoute(format!(
                "{from} is not in channel {:?}",
                channel.multisig_address
            )));
        }
        let expected = channel.dependency_nonce + 1;
        if dependency_nonce != expected {
            return Err(LifecycleError::StaleNonce {
                expected,
                got: dependency_nonce,
            }
            .into());
        }
        let digest = self.ctx.verify(
            from,
            &Commitment::Uninstall {
                multisig: channel.multisig_address,
                dependency_nonce,
                app_instance_id: id.clone(),
                final_balances: release.clone(),
            },
            signature,
        )?;
        uninstall_from(channel, id, release, &self.ctx.reconciler)?;
        Ok((digest, channel.free_balance.balances().clone()))
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_uninstall_virtual(
        &self,
        from: &PeerIdentity,
        id: AppInstanceId,
        toward: PeerIdentity,
        multisig: Address,
        dependency_nonce: u64,
        final_balances: Option<Balances>,
        signature: CommitmentSignature,
    ) -> Result<ProtocolReply, RouterError> {
        let app = self
            .ctx
            .store
            .app_in_channel(&multisig, &id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        let route = VirtualRoute::new(&app.initiator, &app.intermediaries, &app.responder);
        self.check_leg(&route, from, &toward, &id)?;
        if let Some(ends) = &final_balances {
            validate_final_balances(&app, ends)?;
        }
        let release = release_balances(
            &route,
            &app.balances,
            final_balances.as_ref(),
            from,
            self.me(),
            id.as_str(),
        )?;

        let incoming = self.on_behalf_of(&route, &toward, &id)?;

        if *self.me() != toward {
            let (held, (digest, _)) = self.ctx.store.hold(&multisig, incoming, |channel| {
                self.accept_release(&mut channel.clone(), from, &id, &release, dependency_nonce, &signature)
            })?;
            let next = self.next_toward(&route, &toward)?;
            self.release_hop(&id, &route, &next, &toward, final_balances.as_ref())
                .await?;
            held.commit(|channel| {
                self.accept_release(channel, from, &id, &release, dependency_nonce, &signature)
            })?;
            info!(app_instance_id = %id, upstream = %from, downstream = %next, "[sc-04] Virtual app released");
            return Ok(self.ctx.countersign(digest));
        }

        let (digest, free_balance) = self.ctx.store.accept(&multisig, &incoming, |channel| {
            self.accept_release(channel, from, &id, &release, dependency_nonce, &signature)
        })?;
        let final_balances = final_balances.unwrap_or_else(|| {
            let mut ends = Balances::new();
            ends.insert(app.initiator.clone(), app.initiator_deposit);
            ends.insert(app.responder.clone(), app.responder_deposit);
            ends
        });
        info!(app_instance_id = %id, "[sc-04] Virtual app uninstalled by counterparty");
        self.ctx
            .publish(NodeEvent::UninstallVirtual(UninstallEvent {
                app_instance_id: id,
                final_balances,
                free_balance,
            }))
            .await;
        Ok(self.ctx.countersign(digest))
    }

    // =========================================================================
    // RELAY
    // =========================================================================

    /// Deliver an update to its end party, or pass it on unchanged.
    async fn on_relay_update(
        &self,
        from: &PeerIdentity,
        toward: PeerIdentity,
        update: StateUpdate,
    ) -> Result<ProtocolReply, RouterError> {
        if toward == *self.me() {
            return Ok(self.lifecycle.accept_update(from, update, None).await?);
        }

        let id = update.app_instance_id.clone();
        let (_, app) = self
            .ctx
            .store
            .find_app(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        let route = VirtualRoute::new(&app.initiator, &app.intermediaries, &app.responder);
        self.check_leg(&route, from, &toward, &id)?;
        let next = self.next_toward(&route, &toward)?;

        let reply = self
            .ctx
            .bridge
            .request(&next, ProtocolMessage::RelayUpdate { toward, update })
            .await?;
        Ok(reply)
    }
}

#[async_trait]
impl VirtualRoutingApi for VirtualRouter {
    async fn propose_install_virtual(
        &self,
        params: ProposeInstallVirtualParams,
    ) -> Result<ProposeInstallResult, RouterError> {
        let proposal = AppInstanceProposal {
            app_instance_id: AppInstanceId::generate(),
            app: params.app,
            initial_state: params.initial_state,
            initiator: self.me().clone(),
            responder: params.proposed_to_identifier,
            initiator_deposit: params.my_deposit,
            responder_deposit: params.peer_deposit,
            timeout: params.timeout,
            intermediaries: params.intermediaries,
        };
        let id = proposal.app_instance_id.clone();
        let route = checked_route(&proposal)?;
        let next = self.next_toward(&route, &proposal.responder)?;

        let channel = self.hop_channel(&next)?;
        let balances = hop_balances(&route, &proposal, self.me(), &next)?;
        self.lifecycle.prepare_app(&proposal, balances.clone())?;
        self.ctx.reconciler.check_funding(&channel, &balances)?;

        self.ctx
            .bridge
            .request(&next, ProtocolMessage::ProposeVirtual { proposal: proposal.clone() })
            .await?;

        info!(app_instance_id = %id, responder = %proposal.responder, hops = route.members().len() - 1, "[sc-04] Virtual install proposed");
        self.ctx.store.insert_proposal(proposal.clone());
        self.ctx
            .publish(NodeEvent::ProposeInstallVirtual(proposal))
            .await;
        Ok(ProposeInstallResult {
            app_instance_id: id,
        })
    }

    async fn install_virtual(
        &self,
        params: InstallVirtualParams,
    ) -> Result<InstallResult, RouterError> {
        let id = params.app_instance_id;
        if id.is_empty() {
            return Err(LifecycleError::NoAppInstanceIdToInstall.into());
        }
        let proposal = self
            .ctx
            .store
            .proposal(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        if !proposal.is_virtual() {
            return Err(LifecycleError::InvalidParams(format!(
                "{id} is a direct app, use INSTALL"
            ))
            .into());
        }
        if params.intermediaries != proposal.intermediaries {
            return Err(RouterError::InvalidRoute(format!(
                "intermediaries do not match proposal {id}"
            )));
        }
        let route = checked_route(&proposal)?;
        let counterparty = proposal.counterparty_of(self.me()).cloned().ok_or_else(|| {
            RouterError::NotOnRoute {
                peer: self.me().clone(),
                app: id.to_string(),
            }
        })?;
        let next = self.next_toward(&route, &counterparty)?;

        let app = self.install_hop(&proposal, &route, &next, &counterparty).await?;
        self.clear_proposal(&id);

        let info = app.info();
        info!(app_instance_id = %id, counterparty = %counterparty, "[sc-04] Virtual app installed");
        self.ctx.publish(NodeEvent::InstallVirtual(info.clone())).await;
        Ok(InstallResult { app_instance: info })
    }

    async fn uninstall_virtual(
        &self,
        params: UninstallParams,
    ) -> Result<UninstallResult, RouterError> {
        let id = params.app_instance_id;
        let final_balances = params.final_balances;
        let (_, app) = self
            .ctx
            .store
            .find_app(&id)
            .ok_or_else(|| LifecycleError::NoSuchAppInstance(id.clone()))?;
        if !app.is_virtual() {
            return Err(LifecycleError::InvalidParams(format!(
                "{id} is a direct app, use UNINSTALL"
            ))
            .into());
        }
        let counterparty = app.counterparty_of(self.me()).cloned().ok_or_else(|| {
            RouterError::NotOnRoute {
                peer: self.me().clone(),
                app: id.to_string(),
            }
        })?;
        validate_final_balances(&app, &final_balances)?;
        let route = VirtualRoute::new(&app.initiator, &app.intermediaries, &app.responder);
        let next = self.next_toward(&route, &counterparty)?;

        let free_balance = self
            .release_hop(&id, &route, &next, &counterparty, Some(&final_balances))
            .await?;

        info!(app_instance_id = %id, counterparty = %counterparty, "[sc-04] Virtual app uninstalled");
        self.ctx
            .publish(NodeEvent::UninstallVirtual(UninstallEvent {
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
}

#[async_trait]
impl InboundHandler for VirtualRouter {
    async fn handle(
        &self,
        from: &PeerIdentity,
        message: ProtocolMessage,
    ) -> Result<ProtocolReply, ApiError> {
        let kind = message.kind();
        let result = match message {
            ProtocolMessage::ProposeVirtual { proposal } => {
                self.on_propose_virtual(from, proposal).await
            }
            ProtocolMessage::InstallVirtual {
                app_instance_id,
                toward,
                multisig_address,
                dependency_nonce,
                signature,
            } => {
                self.on_install_virtual(
                    from,
                    app_instance_id,
                    toward,
                    multisig_address,
                    dependency_nonce,
                    signature,
                )
                .await
            }
            ProtocolMessage::RelayUpdate { toward, update } => {
                self.on_relay_update(from, toward, update).await
            }
            ProtocolMessage::UninstallVirtual {
                app_instance_id,
                toward,
                multisig_address,
                dependency_nonce,
                final_balances,
                signature,
            } => {
                self.on_uninstall_virtual(
                    from,
                    app_instance_id,
                    toward,
                    multisig_address,
                    dependency_nonce,
                    final_balances,
                    signature,
                )
                .await
            }
            other => Err(RouterError::InvalidRoute(format!(
                "{} is not a virtual-app message",
                other.kind()
            ))),
        };

        result.map_err(|e| {
            warn!(kind = %kind, peer = %from, error = %e, "[sc-04] Rejected inbound routing message");
            ApiError::from(e)
        })
    }
}
