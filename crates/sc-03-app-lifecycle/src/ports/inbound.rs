//! # Inbound Port - AppLifecycleApi
//!
//! Driving port used by the method dispatcher for every direct-channel
//! method and every query.

use crate::domain::LifecycleError;
use async_trait::async_trait;
use shared_types::{
    Address, AppInstanceDetailsResult, AppInstanceId, AppInstanceIdParams, AppInstancesResult,
    ChannelAddressesResult, CreateChannelParams, CreateChannelResult, DepositParams,
    DepositResult, FreeBalanceInfo, GetStateResult, InstallResult, NewStateResult,
    ProposeInstallParams, ProposeInstallResult, ProposedAppInstancesResult, RejectInstallResult,
    StateChannelResult, TakeActionParams, UninstallParams, UninstallResult, UpdateStateParams,
};

#[async_trait]
pub trait AppLifecycleApi: Send + Sync {
    /// Deploy a multisig with `counterparty` and open a channel on both sides.
    async fn create_channel(
        &self,
        params: CreateChannelParams,
    ) -> Result<CreateChannelResult, LifecycleError>;

    /// Fund the multisig and record the deposit on both replicas.
    async fn deposit(&self, params: DepositParams) -> Result<DepositResult, LifecycleError>;

    async fn propose_install(
        &self,
        params: ProposeInstallParams,
    ) -> Result<ProposeInstallResult, LifecycleError>;

    /// Drop a pending proposal here and at the counterparty.
    async fn reject_install(
        &self,
        params: AppInstanceIdParams,
    ) -> Result<RejectInstallResult, LifecycleError>;

    /// Install a pending direct proposal.
    ///
    /// # Errors
    /// - `NoAppInstanceIdToInstall`: empty id
    /// - `NoSuchAppInstance`: no pending proposal with this id
    async fn install(&self, params: AppInstanceIdParams) -> Result<InstallResult, LifecycleError>;

    /// # Errors
    /// - `NoAppInstanceForTakeAction`: empty or unknown id, nothing mutated
    async fn take_action(&self, params: TakeActionParams)
        -> Result<NewStateResult, LifecycleError>;

    async fn update_state(
        &self,
        params: UpdateStateParams,
    ) -> Result<NewStateResult, LifecycleError>;

    async fn uninstall(&self, params: UninstallParams) -> Result<UninstallResult, LifecycleError>;

    fn app_instance_details(
        &self,
        id: &AppInstanceId,
    ) -> Result<AppInstanceDetailsResult, LifecycleError>;

    fn app_instances(&self) -> AppInstancesResult;

    fn proposed_app_instances(&self) -> ProposedAppInstancesResult;

    fn app_state(&self, id: &AppInstanceId) -> Result<GetStateResult, LifecycleError>;

    fn free_balance(&self, multisig: &Address) -> Result<FreeBalanceInfo, LifecycleError>;

    fn state_channel(&self, multisig: &Address) -> Result<StateChannelResult, LifecycleError>;

    fn channel_addresses(&self) -> ChannelAddressesResult;
}
