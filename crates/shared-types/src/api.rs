//! # Method API
//!
//! Caller-facing request/response types. A request is a closed set of tagged
//! parameter variants; a response carries the same request id and either a
//! result or a structured error.
//!
//! ```text
//! { "requestId": "...", "type": "TAKE_ACTION", "params": { ... } }
//!   -> { "requestId": "...", "method": "TAKE_ACTION", "result": { ... } }
//!   -> { "requestId": "...", "method": "TAKE_ACTION", "error": { ... } }
//! ```

use crate::entities::{
    Address, Amount, AppIdentity, AppInstanceId, AppInstanceInfo, AppInstanceProposal, Balances,
    FreeBalanceInfo, PeerIdentity, StateChannelInfo,
};
use crate::errors::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Every method the node answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MethodName {
    CreateChannel,
    Deposit,
    ProposeInstall,
    ProposeInstallVirtual,
    RejectInstall,
    Install,
    InstallVirtual,
    GetAppInstanceDetails,
    GetAppInstances,
    GetProposedAppInstances,
    GetState,
    TakeAction,
    UpdateState,
    Uninstall,
    UninstallVirtual,
    GetFreeBalance,
    GetStateChannel,
    GetChannelAddresses,
}

impl MethodName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateChannel => "CREATE_CHANNEL",
            Self::Deposit => "DEPOSIT",
            Self::ProposeInstall => "PROPOSE_INSTALL",
            Self::ProposeInstallVirtual => "PROPOSE_INSTALL_VIRTUAL",
            Self::RejectInstall => "REJECT_INSTALL",
            Self::Install => "INSTALL",
            Self::InstallVirtual => "INSTALL_VIRTUAL",
            Self::GetAppInstanceDetails => "GET_APP_INSTANCE_DETAILS",
            Self::GetAppInstances => "GET_APP_INSTANCES",
            Self::GetProposedAppInstances => "GET_PROPOSED_APP_INSTANCES",
            Self::GetState => "GET_STATE",
            Self::TakeAction => "TAKE_ACTION",
            Self::UpdateState => "UPDATE_STATE",
            Self::Uninstall => "UNINSTALL",
            Self::UninstallVirtual => "UNINSTALL_VIRTUAL",
            Self::GetFreeBalance => "GET_FREE_BALANCE",
            Self::GetStateChannel => "GET_STATE_CHANNEL",
            Self::GetChannelAddresses => "GET_CHANNEL_ADDRESSES",
        }
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelParams {
    pub counterparty: PeerIdentity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositParams {
    pub multisig_address: Address,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeInstallParams {
    pub proposed_to_identifier: PeerIdentity,
    pub app: AppIdentity,
    pub initial_state: Value,
    pub my_deposit: Amount,
    pub peer_deposit: Amount,
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeInstallVirtualParams {
    pub proposed_to_identifier: PeerIdentity,
    pub app: AppIdentity,
    pub initial_state: Value,
    pub my_deposit: Amount,
    pub peer_deposit: Amount,
    pub timeout: u64,
    pub intermediaries: Vec<PeerIdentity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceIdParams {
    pub app_instance_id: AppInstanceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallVirtualParams {
    pub app_instance_id: AppInstanceId,
    pub intermediaries: Vec<PeerIdentity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeActionParams {
    pub app_instance_id: AppInstanceId,
    pub action: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStateParams {
    pub app_instance_id: AppInstanceId,
    pub new_state: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallParams {
    pub app_instance_id: AppInstanceId,
    /// Keyed by the app's two end parties.
    pub final_balances: Balances,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigParams {
    pub multisig_address: Address,
}

/// Closed set of method parameters, tagged by method type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MethodParams {
    CreateChannel(CreateChannelParams),
    Deposit(DepositParams),
    ProposeInstall(ProposeInstallParams),
    ProposeInstallVirtual(ProposeInstallVirtualParams),
    RejectInstall(AppInstanceIdParams),
    Install(AppInstanceIdParams),
    InstallVirtual(InstallVirtualParams),
    GetAppInstanceDetails(AppInstanceIdParams),
    GetAppInstances,
    GetProposedAppInstances,
    GetState(AppInstanceIdParams),
    TakeAction(TakeActionParams),
    UpdateState(UpdateStateParams),
    Uninstall(UninstallParams),
    UninstallVirtual(UninstallParams),
    GetFreeBalance(MultisigParams),
    GetStateChannel(MultisigParams),
    GetChannelAddresses,
}

impl MethodParams {
    /// The method these parameters belong to.
    pub fn method(&self) -> MethodName {
        match self {
            Self::CreateChannel(_) => MethodName::CreateChannel,
            Self::Deposit(_) => MethodName::Deposit,
            Self::ProposeInstall(_) => MethodName::ProposeInstall,
            Self::ProposeInstallVirtual(_) => MethodName::ProposeInstallVirtual,
            Self::RejectInstall(_) => MethodName::RejectInstall,
            Self::Install(_) => MethodName::Install,
            Self::InstallVirtual(_) => MethodName::InstallVirtual,
            Self::GetAppInstanceDetails(_) => MethodName::GetAppInstanceDetails,
            Self::GetAppInstances => MethodName::GetAppInstances,
            Self::GetProposedAppInstances => MethodName::GetProposedAppInstances,
            Self::GetState(_) => MethodName::GetState,
            Self::TakeAction(_) => MethodName::TakeAction,
            Self::UpdateState(_) => MethodName::UpdateState,
            Self::Uninstall(_) => MethodName::Uninstall,
            Self::UninstallVirtual(_) => MethodName::UninstallVirtual,
            Self::GetFreeBalance(_) => MethodName::GetFreeBalance,
            Self::GetStateChannel(_) => MethodName::GetStateChannel,
            Self::GetChannelAddresses => MethodName::GetChannelAddresses,
        }
    }
}

/// A caller request with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRequest {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub params: MethodParams,
}

impl MethodRequest {
    /// Wrap parameters with a freshly generated request id.
    pub fn new(params: MethodParams) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            params,
        }
    }

    pub fn method(&self) -> MethodName {
        self.params.method()
    }
}

// =============================================================================
// RESULTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelResult {
    pub multisig_address: Address,
    pub owners: [PeerIdentity; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResult {
    pub multisig_address: Address,
    pub free_balance: Balances,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeInstallResult {
    pub app_instance_id: AppInstanceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectInstallResult {
    pub app_instance_id: AppInstanceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub app_instance: AppInstanceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceDetailsResult {
    pub app_instance: AppInstanceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstancesResult {
    pub app_instances: Vec<AppInstanceInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedAppInstancesResult {
    pub app_instances: Vec<AppInstanceProposal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStateResult {
    pub state: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStateResult {
    pub new_state: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallResult {
    pub app_instance_id: AppInstanceId,
    /// Free balance of the channel the app was funded from.
    pub free_balance: Balances,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChannelResult {
    pub state_channel: StateChannelInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAddressesResult {
    pub multisig_addresses: Vec<Address>,
}

/// Successful method outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MethodResult {
    CreateChannel(CreateChannelResult),
    Deposit(DepositResult),
    ProposeInstall(ProposeInstallResult),
    RejectInstall(RejectInstallResult),
    Install(InstallResult),
    AppInstanceDetails(AppInstanceDetailsResult),
    AppInstances(AppInstancesResult),
    ProposedAppInstances(ProposedAppInstancesResult),
    State(GetStateResult),
    TakeAction(NewStateResult),
    UpdateState(NewStateResult),
    Uninstall(UninstallResult),
    FreeBalance(FreeBalanceInfo),
    StateChannel(StateChannelResult),
    ChannelAddresses(ChannelAddressesResult),
}

/// Either a result or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodOutcome {
    Result(MethodResult),
    Error(ApiError),
}

/// Exactly one response per request, matched by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodResponse {
    pub request_id: Uuid,
    pub method: MethodName,
    #[serde(flatten)]
    pub outcome: MethodOutcome,
}

impl MethodResponse {
    pub fn ok(request: &MethodRequest, result: MethodResult) -> Self {
        Self {
            request_id: request.request_id,
            method: request.method(),
            outcome: MethodOutcome::Result(result),
        }
    }

    pub fn err(request_id: Uuid, method: MethodName, error: ApiError) -> Self {
        Self {
            request_id,
            method,
            outcome: MethodOutcome::Error(error),
        }
    }

    pub fn result(&self) -> Option<&MethodResult> {
        match &self.outcome {
            MethodOutcome::Result(r) => Some(r),
            MethodOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match &self.outcome {
            MethodOutcome::Result(_) => None,
            MethodOutcome::Error(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<MethodResult, ApiError> {
        match self.outcome {
            MethodOutcome::Result(r) => Ok(r),
            MethodOutcome::Error(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_params_report_method() {
        let params = MethodParams::TakeAction(TakeActionParams {
            app_instance_id: AppInstanceId::new("x"),
            action: Value::Null,
        });
        assert_eq!(params.method(), MethodName::TakeAction);
        assert_eq!(MethodParams::GetAppInstances.method(), MethodName::GetAppInstances);
    }

    #[test]
    fn test_request_wire_shape() {
        let request = MethodRequest::new(MethodParams::GetState(AppInstanceIdParams {
            app_instance_id: AppInstanceId::new("abc"),
        }));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "GET_STATE");
        assert_eq!(json["params"]["appInstanceId"], "abc");
        assert!(json["requestId"].is_string());
    }

    #[test]
    fn test_response_carries_request_id_and_error() {
        let request = MethodRequest::new(MethodParams::GetChannelAddresses);
        let response = MethodResponse::err(
            request.request_id,
            request.method(),
            ApiError::new(ErrorCode::NoStateChannel, "none"),
        );
        assert_eq!(response.request_id, request.request_id);
        assert!(response.result().is_none());
        assert_eq!(response.error().map(|e| e.code), Some(ErrorCode::NoStateChannel));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"]["code"], "NO_STATE_CHANNEL");
        assert_eq!(json["method"], "GET_CHANNEL_ADDRESSES");
    }

    #[test]
    fn test_method_name_display() {
        assert_eq!(
            MethodName::ProposeInstallVirtual.to_string(),
            "PROPOSE_INSTALL_VIRTUAL"
        );
        let json = serde_json::to_string(&MethodName::GetAppInstanceDetails).unwrap();
        assert_eq!(json, "\"GET_APP_INSTANCE_DETAILS\"");
    }
}
